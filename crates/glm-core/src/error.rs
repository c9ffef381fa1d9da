//! Unified error types for GLM model I/O.
//!
//! This module provides a common error type [`GlmError`] for fatal
//! conditions. Recoverable anomalies (unrecognized attributes, dangling
//! references, un-parsed lines) never surface here; they accumulate in
//! [`crate::diagnostics::Diagnostics`] so that mostly-valid files still
//! produce a usable model.

use thiserror::Error;

/// Unified error type for GLM model operations.
///
/// Only two conditions abort a parse: file-level I/O failure and a block
/// that never finds its closing brace. Everything else is reported through
/// diagnostics.
#[derive(Error, Debug)]
pub enum GlmError {
    /// I/O errors (source file missing, destination unwritable)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A block opened but never closed before end of input
    #[error("Structural error: {0}")]
    Structural(String),

    /// Parsing errors outside the lenient recovery path
    #[error("Parse error: {0}")]
    Parse(String),

    /// Declarative schema source could not be loaded
    #[error("Schema error: {0}")]
    Schema(String),

    /// Model-level validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using GlmError.
pub type GlmResult<T> = Result<T, GlmError>;

impl From<anyhow::Error> for GlmError {
    fn from(err: anyhow::Error) -> Self {
        GlmError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for GlmError {
    fn from(err: serde_json::Error) -> Self {
        GlmError::Schema(err.to_string())
    }
}

impl From<String> for GlmError {
    fn from(s: String) -> Self {
        GlmError::Other(s)
    }
}

impl From<&str> for GlmError {
    fn from(s: &str) -> Self {
        GlmError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GlmError::Structural("block 'object house' never closed".into());
        assert!(err.to_string().contains("Structural error"));
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let glm_err: GlmError = io_err.into();
        assert!(matches!(glm_err, GlmError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> GlmResult<()> {
            Err(GlmError::Validation("test".into()))
        }

        fn outer() -> GlmResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
