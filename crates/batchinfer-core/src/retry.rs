//! Retry utilities for transient remote failures.
//!
//! Provides classification of retryable errors, exponential backoff, and
//! retrying wrappers used by the LLM providers and image generation backends.

use crate::config::RetryConfig;
use crate::error::PipelineError;
use crate::llm::{LlmProvider, LlmRequest, LlmResponse};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Determine whether a pipeline error is worth retrying.
///
/// Retryable errors: timeouts, rate limits (429), server errors (5xx).
/// Non-retryable: auth failures, bad requests, decode errors.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Llm {
            status_code,
            message,
        }
        | PipelineError::Generation {
            status_code,
            message,
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            // Connection refused, DNS failure and the like carry no status code
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// Describe a failed send so that [`is_retryable`] can classify it from the message.
pub(crate) fn send_failure(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "could not connect"
    } else {
        "failed"
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

/// Run `call` under a timeout, retrying transient failures with backoff.
///
/// `item` names the input being processed and `stage` the backend, for
/// timeout errors and logs.
pub async fn with_retry<T, F, Fut>(
    retry: &RetryConfig,
    timeout_ms: u64,
    item: &Path,
    stage: &str,
    mut call: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), call()).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                path: item.to_path_buf(),
                stage: stage.to_string(),
                timeout_ms,
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retry.attempts && is_retryable(&e) => {
                let delay = backoff_duration(attempt, retry.delay_ms);
                attempt += 1;
                tracing::debug!(
                    "Retry {attempt}/{} for {:?} after {delay:?}: {e}",
                    retry.attempts,
                    item
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Call an LLM provider, retrying transient failures with backoff.
///
/// Each attempt is bounded by the provider's own [`LlmProvider::timeout`].
pub async fn generate_with_retry(
    provider: &dyn LlmProvider,
    request: &LlmRequest,
    retry: &RetryConfig,
    item: &Path,
) -> Result<LlmResponse, PipelineError> {
    let timeout_ms = u64::try_from(provider.timeout().as_millis()).unwrap_or(u64::MAX);
    with_retry(retry, timeout_ms, item, provider.name(), || {
        provider.generate(request)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given status for the first `failures` calls.
    struct FlakyProvider {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(PipelineError::Llm {
                    message: format!("HTTP {}", self.status),
                    status_code: Some(self.status),
                });
            }
            Ok(LlmResponse {
                text: "ok".to_string(),
                model: "flaky".to_string(),
                tokens_used: None,
                latency_ms: 0,
            })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            attempts: 3,
            delay_ms: 1,
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = PipelineError::Timeout {
            path: PathBuf::from("test.jpg"),
            stage: "ollama".to_string(),
            timeout_ms: 60000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_retryable() {
        for code in [429, 500, 503] {
            let err = PipelineError::Llm {
                message: format!("HTTP {code}"),
                status_code: Some(code),
            };
            assert!(is_retryable(&err), "{code} should be retryable");
        }
    }

    #[test]
    fn test_auth_error_not_retryable() {
        let err = PipelineError::Generation {
            message: "HTTP 401: unauthorized".to_string(),
            status_code: Some(401),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_message_with_500_in_body_not_retryable_without_status() {
        let err = PipelineError::Llm {
            message: "Processed 500 tokens successfully".to_string(),
            status_code: None,
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_connection_error_retryable_without_status() {
        let err = PipelineError::Llm {
            message: "connection refused".to_string(),
            status_code: None,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential_and_capped() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_generate_with_retry_recovers() {
        let provider = FlakyProvider {
            failures: 2,
            status: 503,
            calls: AtomicU32::new(0),
        };
        let request = LlmRequest::text("x".to_string(), 4);
        let response =
            generate_with_retry(&provider, &request, &fast_retry(), Path::new("item"))
                .await
                .unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_generate_with_retry_gives_up_on_permanent_error() {
        let provider = FlakyProvider {
            failures: 5,
            status: 401,
            calls: AtomicU32::new(0),
        };
        let request = LlmRequest::text("x".to_string(), 4);
        let result =
            generate_with_retry(&provider, &request, &fast_retry(), Path::new("item")).await;
        assert!(result.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_times_out() {
        let result: Result<(), PipelineError> =
            with_retry(&fast_retry(), 10, Path::new("slow.jpg"), "webui", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        match result {
            Err(PipelineError::Timeout { stage, .. }) => assert_eq!(stage, "webui"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    /// Answers after `delay`, within its own advertised `limit`.
    struct SlowProvider {
        delay: Duration,
        limit: Duration,
    }

    #[async_trait]
    impl LlmProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
            tokio::time::sleep(self.delay).await;
            Ok(LlmResponse {
                text: "done".to_string(),
                model: "slow".to_string(),
                tokens_used: None,
                latency_ms: self.delay.as_millis() as u64,
            })
        }

        fn timeout(&self) -> Duration {
            self.limit
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_with_retry_honors_long_provider_timeout() {
        // A local model that takes 90s is fine when the provider allows 120s.
        let provider = SlowProvider {
            delay: Duration::from_secs(90),
            limit: Duration::from_secs(120),
        };
        let request = LlmRequest::text("x".to_string(), 4);
        let response = generate_with_retry(&provider, &request, &fast_retry(), Path::new("item"))
            .await
            .unwrap();
        assert_eq!(response.text, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_with_retry_times_out_at_provider_limit() {
        let provider = SlowProvider {
            delay: Duration::from_secs(90),
            limit: Duration::from_secs(10),
        };
        let retry = RetryConfig {
            attempts: 0,
            delay_ms: 1,
        };
        let request = LlmRequest::text("x".to_string(), 4);
        let err = generate_with_retry(&provider, &request, &retry, Path::new("item"))
            .await
            .unwrap_err();
        match err {
            PipelineError::Timeout {
                stage, timeout_ms, ..
            } => {
                assert_eq!(stage, "slow");
                assert_eq!(timeout_ms, 10_000);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_with_retry_stops_after_attempts() {
        let provider = FlakyProvider {
            failures: 10,
            status: 500,
            calls: AtomicU32::new(0),
        };
        let request = LlmRequest::text("x".to_string(), 4);
        let result =
            generate_with_retry(&provider, &request, &fast_retry(), Path::new("item")).await;
        assert!(result.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }
}
