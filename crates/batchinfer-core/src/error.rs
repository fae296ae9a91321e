//! Error types for batchinfer.
//!
//! Errors are split by when they happen: configuration loading, run setup
//! (fatal, before any record is written), and per-item pipeline failures
//! (logged and skipped by the run loops).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for batchinfer operations.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A run could not start
    #[error("{0}")]
    Setup(#[from] SetupError),

    /// Per-item processing errors that escaped the run loop
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Conditions that abort a run before it produces output.
///
/// The binary prints these and exits with status 1.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Output folder {0} not found.")]
    OutputDirMissing(PathBuf),

    #[error("Input data not available at {0}.")]
    InputMissing(PathBuf),

    #[error("Image folder {0} not found.")]
    ImageFolderMissing(PathBuf),

    #[error("Label file not available at {0}.")]
    LabelFileMissing(PathBuf),

    #[error("Read error while loading labels from {path}. Make sure the file is valid JSON. ({message})")]
    InvalidLabelFile { path: PathBuf, message: String },

    #[error("Model {0} is not available or enabled.")]
    UnknownModel(String),

    #[error("Invalid model name: {name}. Available models: {available:?}")]
    ModelNotInstalled { name: String, available: Vec<String> },

    #[error("Invalid dataset type: {0}")]
    UnknownDataset(String),

    #[error("Cannot specify both --dataset and --categories.")]
    ConflictingCategories,

    #[error("Must specify either --dataset or --categories.")]
    MissingCategories,

    #[error("Must specify --model.")]
    MissingModel,

    #[error("Must specify at least one image.")]
    NoImages,

    #[error("No classifiers enabled. Use --with-features, --with-celebrities or --with-nsfw.")]
    NoClassifiers,

    #[error("Must specify either --prompt or --prompts-file.")]
    MissingPrompt,

    #[error("Invalid prompts file {path}: {message}")]
    InvalidPromptsFile { path: PathBuf, message: String },

    /// A model or remote backend could not be set up
    #[error("{0}")]
    Backend(String),
}

/// Per-item pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Local model loading or inference failed
    #[error("Model error: {message}")]
    Model { message: String },

    /// Remote LLM call failed
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },

    /// Remote image generation failed
    #[error("Generation error: {message}")]
    Generation {
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Pixel count exceeds the decompression-bomb limit
    #[error("Image too large: {path} ({width}x{height} exceeds {max_pixels} pixels)")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Convenience type alias for batchinfer results.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
