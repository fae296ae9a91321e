//! Best-effort progress reporting to an external status endpoint.
//!
//! Every message is logged locally. When both a server address and a database
//! key are configured, the message is also POSTed to
//! `{server}/status_update/?key=..&status=running&message=..[&num_records=N]`.
//! Failures are logged and never propagated to the run.

use std::time::Duration;

use crate::config::StatusConfig;

/// Reports human-readable progress for a long-running batch job.
pub struct StatusReporter {
    target: Option<Target>,
    status: String,
    client: reqwest::Client,
    timeout: Duration,
}

struct Target {
    url: String,
    key: String,
}

impl StatusReporter {
    /// Create a reporter. Remote reporting is enabled only when both
    /// `server` and `key` are non-empty.
    pub fn new(server: Option<&str>, key: Option<&str>, config: &StatusConfig) -> Self {
        let target = match (server, key) {
            (Some(server), Some(key)) if !server.is_empty() && !key.is_empty() => Some(Target {
                url: format!("{}/status_update/", server.trim_end_matches('/')),
                key: key.to_string(),
            }),
            _ => None,
        };

        Self {
            target,
            status: config.status.clone(),
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// A reporter that only logs locally.
    pub fn local() -> Self {
        Self::new(None, None, &StatusConfig::default())
    }

    /// Whether updates are sent to a remote endpoint.
    pub fn is_remote(&self) -> bool {
        self.target.is_some()
    }

    /// Log a progress message and, if configured, send it to the endpoint.
    ///
    /// `num_records` is only sent when greater than zero.
    pub async fn report(&self, message: &str, num_records: Option<u64>) {
        tracing::info!("{message}");

        let Some(target) = &self.target else {
            return;
        };

        let mut query: Vec<(&str, String)> = vec![
            ("key", target.key.clone()),
            ("status", self.status.clone()),
            ("message", message.to_string()),
        ];
        if let Some(n) = num_records.filter(|n| *n > 0) {
            query.push(("num_records", n.to_string()));
        }

        let result = self
            .client
            .post(&target.url)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        if let Err(e) = result {
            tracing::warn!("Failed to log status update: {e}");
        }
    }
}
