//! Error types for the Strata settings store

use thiserror::Error;

/// Result type alias for Strata operations
pub type StrataResult<T> = Result<T, StrataError>;

/// Main error type for the Strata settings store
#[derive(Error, Debug, Clone)]
pub enum StrataError {
    /// Write attempted against a read-only provider or write target
    #[error("provider '{provider}' is read-only")]
    ReadOnly { provider: String },

    /// Composite write attempted with no writable member and no explicit target
    #[error("no writable provider is available")]
    NoWritableProvider,

    /// A provider name did not match any registered provider
    #[error("unknown provider '{name}'")]
    UnknownProvider { name: String },

    /// Store assembly errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors from a backing medium
    #[error("IO error: {0}")]
    Io(String),

    /// Parse or serialization failure in a file format codec
    #[error("{format} error: {message}")]
    Format { format: String, message: String },

    /// Async operation was cancelled through its cancellation token
    #[error("operation was cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl StrataError {
    /// Create a new read-only error naming the offending provider
    pub fn read_only(provider: impl Into<String>) -> Self {
        Self::ReadOnly {
            provider: provider.into(),
        }
    }

    /// Create a new unknown-provider error
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new format error for the named codec
    pub fn format(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<std::io::Error> for StrataError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(error: serde_json::Error) -> Self {
        Self::Format {
            format: "json".to_string(),
            message: error.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for StrataError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Format {
            format: "yaml".to_string(),
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for StrataError {
    fn from(error: toml::de::Error) -> Self {
        Self::Format {
            format: "toml".to_string(),
            message: error.to_string(),
        }
    }
}

impl From<toml::ser::Error> for StrataError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Format {
            format: "toml".to_string(),
            message: error.to_string(),
        }
    }
}

impl From<quick_xml::Error> for StrataError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Format {
            format: "xml".to_string(),
            message: error.to_string(),
        }
    }
}
