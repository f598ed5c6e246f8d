//! Errors raised while building and validating the policy model

use crate::requirement::RequirementId;
use crate::requirement_set::SetId;
use thiserror::Error;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Configuration errors in requirements and requirement sets
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Two requirements share a primary key
    #[error("Duplicate requirement id: {id}")]
    DuplicateRequirement { id: RequirementId },

    /// Two requirement sets share a primary key
    #[error("Duplicate requirement set id: {id}")]
    DuplicateRequirementSet { id: SetId },

    /// A set references a requirement that is not in the catalog
    #[error("Requirement set {set} references unknown requirement {requirement}")]
    UnknownRequirement { set: SetId, requirement: RequirementId },

    /// A set id that is not in the catalog
    #[error("Unknown requirement set: {id}")]
    UnknownRequirementSet { id: SetId },

    /// An operator name no registered evaluation function answers to
    #[error("Unsupported operator '{operator}' on requirement '{requirement}'")]
    UnsupportedOperator { operator: String, requirement: String },

    /// Unparseable combinator name
    #[error("Invalid requirement set type: {0}")]
    InvalidSetType(String),
}

impl ModelError {
    /// Create an unsupported operator error
    pub fn unsupported_operator(operator: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self::UnsupportedOperator {
            operator: operator.into(),
            requirement: requirement.into(),
        }
    }
}
