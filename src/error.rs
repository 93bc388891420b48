//! Error types for the turnstile library.

use thiserror::Error;

/// Main error type for turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration file or document could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A policy or engine parameter is invalid; rejected at construction
    /// time, never at decision time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A call was rejected but its policy names no fallback
    #[error("Rate limit triggered for key '{0}' but no fallback is configured")]
    FallbackNotConfigured(String),

    /// A call was rejected and its policy names a fallback that was never
    /// registered
    #[error("Fallback '{0}' is not registered")]
    FallbackNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
