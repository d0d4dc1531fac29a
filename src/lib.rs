//! NPULOAD - Neural Processing Unit load generator
//!
//! A long-running synthetic load generator that drives several independent
//! workload engines through warmup, a mode-shaped sequence of intensity
//! phases, and cooldown, so an external monitor can be checked for correct
//! accelerator activity reporting.

use thiserror::Error;

pub mod bench;
pub mod cli;
pub mod config;
pub mod engine;
pub mod models;
pub mod report;
pub mod util;

/// Errors surfaced outside a running load test.
///
/// A running test never fails: engine errors are logged into the statistics
/// and configuration problems are coerced to defaults.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Configuration validation or parsing error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Console or stream I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Summary or configuration serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Async runtime or task join failure
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::ser::Error> for LoadError {
    fn from(err: toml::ser::Error) -> Self {
        LoadError::SerializationError(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for NPULOAD operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Error handling utilities
pub mod error {
    use super::LoadError;

    /// Convert error to user-friendly message with suggestions
    pub fn user_friendly_message(error: &LoadError) -> String {
        match error {
            LoadError::ConfigError(msg) => {
                format!("Configuration error: {}. Run with --help for valid options.", msg)
            }
            LoadError::SerializationError(_) => {
                "Failed to render results. The console summary above is still valid.".to_string()
            }
            LoadError::RuntimeError(_) => {
                "The load test worker stopped unexpectedly. Partial results may be missing."
                    .to_string()
            }
            LoadError::IoError(_) => error.to_string(),
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "npuload";
/// Number of error messages shown in verbose summaries and kept in `RunSummary`.
pub const MAX_ERROR_SAMPLES: usize = 10;
