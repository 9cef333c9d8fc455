//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Writer creation error; nothing of the subscription was built
    #[error("failed to create writer '{name}': {source}")]
    WriterCreation {
        name: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Destination error (from contract)
    #[error("destination error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a writer creation error
    pub fn writer_creation(name: impl Into<String>, source: contracts::ContractError) -> Self {
        Self::WriterCreation {
            name: name.into(),
            source,
        }
    }
}
