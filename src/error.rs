// src/error.rs

//! Unified error handling for the mirror selector.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for mirror selector operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Structural violation in the mirror directory token stream
    #[error("Malformed mirror directory: {0}")]
    MalformedDirectory(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A pipeline task or channel went away before the run finished
    #[error("Pipeline error in {stage}: {message}")]
    Pipeline { stage: String, message: String },
}

impl AppError {
    /// Create a malformed directory error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDirectory(message.into())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a pipeline error for the given stage.
    pub fn pipeline(stage: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error came from the directory structure itself.
    pub fn is_malformed_directory(&self) -> bool {
        matches!(self, Self::MalformedDirectory(_))
    }
}

/// Why a single probe attempt did not produce a latency.
///
/// Never fatal: the prober turns these into the worst score.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("site has no {0} endpoint")]
    MissingEndpoint(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("server error status {0}")]
    Status(u16),

    #[error("probe cancelled")]
    Cancelled,
}
