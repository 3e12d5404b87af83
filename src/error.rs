//! Error types for kindconf.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration document exists but could not be parsed.
    #[error("Failed to parse configuration file {path}: {message}")]
    Parse {
        /// Document that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The merged document could not be mapped onto the configuration type.
    #[error("Failed to decode configuration: {0}")]
    Decode(String),

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    Validation(String),

    /// Writing a configuration document (synthesis or explicit persist) failed.
    #[error("Failed to write configuration file {path}: {source}")]
    Write {
        /// Target document path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// File watching failed to initialize.
    #[error("File watching error: {0}")]
    Watch(String),

    /// Document extension is not one of the supported formats.
    #[error("Unsupported document extension: {0}. Supported: yaml, yml, toml, json")]
    UnsupportedFormat(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Validation error for configuration validation.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::Validation(err.to_string())
    }
}

/// Failure to coerce a loosely-typed value into the requested type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot coerce {value} into {target}")]
pub struct CoerceError {
    /// Rendering of the offending value
    pub value: String,
    /// Name of the requested type
    pub target: &'static str,
}

impl CoerceError {
    pub(crate) fn new(value: impl fmt::Display, target: &'static str) -> Self {
        Self {
            value: value.to_string(),
            target,
        }
    }
}

/// Errors raised by log sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A network sink could not reach its endpoint.
    #[error("sink '{sink}' failed to connect to {address}: {source}")]
    Connect {
        /// Sink identifier
        sink: &'static str,
        /// Remote address
        address: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The sink could not be set up (file appender, socket options, ...).
    #[error("sink '{sink}' failed to initialize: {message}")]
    Init {
        /// Sink identifier
        sink: &'static str,
        /// Reason
        message: String,
    },

    /// The sink was already released.
    #[error("sink '{0}' is closed")]
    Closed(&'static str),

    /// IO error while writing or flushing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SinkError> for std::io::Error {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}
