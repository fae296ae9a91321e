//! JSON-over-HTTP plumbing shared by the remote providers.

use crate::error::PipelineError;
use crate::retry::send_failure;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

fn llm_error(message: String, status_code: Option<u16>) -> PipelineError {
    PipelineError::Llm {
        message,
        status_code,
    }
}

/// Send `body` and decode a successful JSON reply.
///
/// Non-2xx responses become `PipelineError::Llm` carrying the status code, so
/// retry classification can see 429 and 5xx.
pub(super) async fn send_json<B, R>(
    request: reqwest::RequestBuilder,
    provider: &str,
    body: &B,
    timeout: Duration,
) -> Result<R, PipelineError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let resp = request
        .json(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| llm_error(format!("{provider} request {}: {e}", send_failure(&e)), None))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(llm_error(
            format!("{provider} HTTP {status}: {text}"),
            Some(status.as_u16()),
        ));
    }

    resp.json()
        .await
        .map_err(|e| llm_error(format!("Invalid {provider} reply: {e}"), None))
}

/// Trim a reply, rejecting one with no text.
pub(super) fn non_empty(text: &str, model: &str) -> Result<String, PipelineError> {
    let text = text.trim();
    if text.is_empty() {
        Err(llm_error(format!("{model} produced no text"), None))
    } else {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  a cat \n", "m").unwrap(), "a cat");
        let err = non_empty(" \n", "llava").unwrap_err();
        assert!(err.to_string().contains("llava produced no text"));
    }

    #[tokio::test]
    async fn test_connect_error_is_retryable() {
        let client = reqwest::Client::new();
        let err = send_json::<_, serde_json::Value>(
            client.post("http://127.0.0.1:1/"),
            "test",
            &serde_json::json!({}),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert!(crate::retry::is_retryable(&err));
        match err {
            PipelineError::Llm { status_code, message } => {
                assert_eq!(status_code, None);
                assert!(message.starts_with("test request could not connect"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
