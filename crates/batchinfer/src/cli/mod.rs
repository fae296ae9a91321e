//! Command handlers. Each turns parsed flags into options for a core task.

pub mod caption;
pub mod classify_images;
pub mod classify_text;
pub mod clip;
pub mod config;
pub mod generate;
pub mod models;

use batchinfer_core::{Config, StatusReporter};
use clap::Args;

/// Status endpoint flags shared by the batch commands.
#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Key of the dataset record to update on the status server
    #[arg(short = 'k', long = "database-key", alias = "database_key")]
    pub database_key: Option<String>,

    /// Base URL of the status server
    #[arg(short = 's', long = "dmi-sm-server", alias = "dmi_sm_server")]
    pub dmi_sm_server: Option<String>,
}

impl StatusArgs {
    pub fn reporter(&self, config: &Config) -> StatusReporter {
        StatusReporter::new(
            self.dmi_sm_server.as_deref(),
            self.database_key.as_deref(),
            &config.status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        status: StatusArgs,
    }

    #[test]
    fn test_status_flags_accept_snake_case_aliases() {
        let parsed =
            Harness::parse_from(["t", "--database_key", "abc", "--dmi_sm_server", "http://x"]);
        assert_eq!(parsed.status.database_key.as_deref(), Some("abc"));
        assert_eq!(parsed.status.dmi_sm_server.as_deref(), Some("http://x"));
    }

    #[test]
    fn test_reporter_needs_both_flags() {
        let config = Config::default();
        let only_key = StatusArgs {
            database_key: Some("abc".to_string()),
            dmi_sm_server: None,
        };
        assert!(!only_key.reporter(&config).is_remote());

        let parsed = Harness::parse_from(["t", "-k", "abc", "-s", "http://x"]);
        assert!(parsed.status.reporter(&config).is_remote());
    }
}
