//! Evaluation errors for the requirement engine

use reqeval_model::{AggregateError, ModelError};
use thiserror::Error;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that can occur during requirement evaluation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// No registered function answers to the operator name
    #[error("Unsupported operator '{operator}' on requirement '{requirement}'")]
    UnsupportedOperator { operator: String, requirement: String },

    /// Invalid regex pattern in a categorical operator
    #[error("Invalid regex pattern: {pattern}")]
    InvalidRegex { pattern: String },

    /// Operator parameter present but unusable
    #[error("Invalid parameter for {operator}: {message}")]
    InvalidParameter { operator: String, message: String },

    /// Policy configuration error (unknown sets, dangling references, ...)
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The context object cannot be aggregated
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl EvalError {
    /// Create an unsupported operator error
    pub fn unsupported_operator(operator: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self::UnsupportedOperator {
            operator: operator.into(),
            requirement: requirement.into(),
        }
    }

    /// Create an invalid regex error
    pub fn invalid_regex(pattern: impl Into<String>) -> Self {
        Self::InvalidRegex {
            pattern: pattern.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Configuration errors abort the evaluation; everything else is local
    /// to the requirement that raised it.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperator { .. } | Self::Model(_) | Self::Aggregate(_)
        )
    }
}
