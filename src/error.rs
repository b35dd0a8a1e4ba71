//! Error taxonomy for the interoperability core

use crate::record::EntityId;
use thiserror::Error;

/// Errors that can occur in Rosetta operations
#[derive(Debug, Error)]
pub enum RosettaError {
    /// No adapter is registered under the given format name
    #[error("no adapter registered for format: {0}")]
    AdapterNotFound(String),

    /// The source adapter rejected a native record before conversion
    #[error("validation failed for format {format}: {reason}")]
    Validation { format: String, reason: String },

    /// An adapter failed while converting to or from the normalized form
    #[error("conversion failed for format {format}: {message}")]
    Conversion { format: String, message: String },

    /// The source-of-record lookup had no entity under the given id
    #[error("entity {id} not found in format {format}")]
    EntityNotFound { id: EntityId, format: String },

    /// A caller-supplied unit of work failed inside a transaction boundary
    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RosettaError {
    /// Shorthand for a conversion failure in a named format.
    pub fn conversion(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            format: format.into(),
            message: message.into(),
        }
    }
}

/// Result type for Rosetta operations
pub type RosettaResult<T> = Result<T, RosettaError>;
