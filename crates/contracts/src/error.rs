//! Layered error definitions
//!
//! Categorized by source: config / destination / transport / metadata

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Destination URI could not be parsed
    #[error("invalid destination '{destination}': {message}")]
    InvalidDestination {
        destination: String,
        message: String,
    },

    /// Destination URI uses a scheme no client handles
    #[error("unknown subscription scheme '{scheme}' in '{destination}'")]
    UnknownScheme {
        destination: String,
        scheme: String,
    },

    /// Subscription mode other than ALL / ANY
    #[error("unknown subscription mode '{0}'")]
    UnknownMode(String),

    /// TLS material could not be loaded
    #[error("tls error for '{path}': {message}")]
    Tls { path: String, message: String },

    // ===== Destination Errors =====
    /// Authentication handshake with a streaming destination failed
    #[error("handshake with '{destination}' failed: {message}")]
    Handshake {
        destination: String,
        message: String,
    },

    /// The client does not support the requested write representation
    #[error("{destination}: {client} client doesn't send {representation}")]
    CapabilityMismatch {
        destination: String,
        client: &'static str,
        representation: &'static str,
    },

    /// Connection, timeout or stream failure
    #[error("transport error for '{destination}': {message}")]
    Transport {
        destination: String,
        message: String,
    },

    /// Destination answered with a non-success status
    #[error("'{destination}' responded {status}: {body}")]
    Status {
        destination: String,
        status: u16,
        body: String,
    },

    // ===== Metadata Errors =====
    /// Database unknown to the metadata service
    #[error("unknown database '{0}'")]
    UnknownDatabase(String),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid destination error
    pub fn invalid_destination(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDestination {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create handshake error
    pub fn handshake(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handshake {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by configuration rather than traffic
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
                | Self::InvalidDestination { .. }
                | Self::UnknownScheme { .. }
                | Self::UnknownMode(_)
                | Self::Tls { .. }
        )
    }
}
