//! Lookup session errors

use reqeval_eval::EvalError;
use reqeval_model::{ContextProviderError, EntityId};
use thiserror::Error;

/// Result type for lookup operations
pub type LookupResult<T> = Result<T, LookupError>;

/// Errors that can occur while serving lookup sessions
#[derive(Debug, Error)]
pub enum LookupError {
    /// The token is unknown, expired or corrupted, and recovery failed
    #[error("Lookup session not found: {token}")]
    NotFound { token: String },

    /// The context behind a session could not be loaded
    #[error("Context {context_id} could not be loaded: {source}")]
    ContextNotFound {
        context_id: EntityId,
        #[source]
        source: ContextProviderError,
    },

    /// Payload (de)serialization failed
    #[error("Lookup payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Evaluating the policy for the projection failed
    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// The backing store failed
    #[error("Session store error: {message}")]
    Store { message: String },
}

impl LookupError {
    pub fn not_found(token: impl Into<String>) -> Self {
        Self::NotFound { token: token.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
