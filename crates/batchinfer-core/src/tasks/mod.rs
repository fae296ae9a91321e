//! Run loops for each batch command.
//!
//! Every loop has the same shape: check the output folder, open the output,
//! then process inputs one at a time, skipping items that fail and reporting
//! progress after each one. Models come in through traits so the loops can
//! be exercised with fakes.

pub mod caption;
pub mod clip_label;
pub mod generate;
pub mod image_classify;
pub mod text_classify;

use std::path::Path;

use crate::config::{Config, RetryConfig};
use crate::error::SetupError;
use crate::input::ImageLoader;
use crate::status::StatusReporter;

/// Shared settings and services for a single run.
pub struct RunContext {
    pub loader: ImageLoader,
    pub retry: RetryConfig,
    pub status: StatusReporter,
}

impl RunContext {
    pub fn new(config: &Config, status: StatusReporter) -> Self {
        Self {
            loader: ImageLoader::new(config.limits.clone()),
            retry: config.retry.clone(),
            status,
        }
    }
}

/// Fail the run unless the output folder exists.
pub fn ensure_output_dir(path: &Path) -> Result<(), SetupError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(SetupError::OutputDirMissing(path.to_path_buf()))
    }
}
