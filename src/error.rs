//! Error types for the artifact-notes crate.
//!
//! [`ConvertError`] covers structural failures of a scanner report, field
//! coercion failures, and failures talking to the metadata-storage API.
//! Per-entry data quality problems (no NVD score, zero score) are not errors;
//! see [`crate::convert::ConversionReport`].

use std::io;

/// The main error type for all operations in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The source document is malformed or not a JSON object.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A mandatory field is absent from the source document.
    #[error("Missing field '{0}' in source data")]
    MissingField(String),

    /// A field exists but cannot be coerced to the expected type.
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Dotted path of the offending field (e.g. "vulnerabilities.3.version").
        path: String,
        /// What the caller asked for.
        expected: String,
        /// JSON type actually present.
        found: String,
    },

    /// A CVSS v3 vector string could not be parsed.
    #[error("Invalid CVSS vector '{vector}': {message}")]
    InvalidCvssVector {
        /// The vector as found in the report.
        vector: String,
        /// Why parsing failed.
        message: String,
    },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (reading a report file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request via middleware failed.
    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// The metadata-storage API answered with a non-success status.
    #[error("API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Configuration error (missing or invalid values).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for conversion and publishing operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create a new invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new missing field error.
    pub fn missing_field(path: impl Into<String>) -> Self {
        Self::MissingField(path.into())
    }

    /// Create a new type mismatch error.
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a new CVSS vector error.
    pub fn invalid_cvss_vector(vector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCvssVector {
            vector: vector.into(),
            message: message.into(),
        }
    }

    /// Create a new API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error stems from a null, malformed or incomplete source.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::MissingField(_))
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::HttpMiddleware(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
