/// Structured error types for convoctl-core.
///
/// Library consumers get one composable enum; the `convoctl` binary wraps it
/// in `anyhow` for reporting.

use std::io;
use thiserror::Error;

/// Main error type for convoctl-core operations
#[derive(Error, Debug)]
pub enum ConvoError {
    /// Unknown input format hint or extractor platform
    #[error("Unsupported format '{value}': expected one of {expected}")]
    UnsupportedFormat { value: String, expected: String },

    /// Required dialect markers missing, or a malformed record
    #[error("Failed to parse {dialect} input: {reason}")]
    Parse { dialect: String, reason: String },

    /// Malformed record in a JSON import (whole import is rejected)
    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Oversized input, invalid tag, bad edit index, bad artifact payload
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// Unregistered skin; callers recover via the default skin
    #[error("Unknown skin '{id}'")]
    UnknownSkin { id: String },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for convoctl-core operations
pub type Result<T> = std::result::Result<T, ConvoError>;

impl ConvoError {
    pub fn unsupported_format(value: impl Into<String>, expected: &[&str]) -> Self {
        Self::UnsupportedFormat {
            value: value.into(),
            expected: expected.join(", "),
        }
    }

    pub fn parse(dialect: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            dialect: dialect.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_record(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// True for the ingestion failures (format, markers, records).
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::InvalidRecord { .. } | Self::Json { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvoError::unsupported_format("yaml", &["auto", "markdown", "json"]);
        assert_eq!(
            err.to_string(),
            "Unsupported format 'yaml': expected one of auto, markdown, json"
        );

        let err = ConvoError::invalid_record(3, "empty content");
        assert_eq!(err.to_string(), "Invalid record at index 3: empty content");
        assert!(err.is_parse_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let convo_err: ConvoError = io_err.into();

        assert!(matches!(convo_err, ConvoError::Io { .. }));
        assert!(!convo_err.is_parse_failure());
    }
}
