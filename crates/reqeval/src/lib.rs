//! Requirement evaluation engine
//!
//! This crate ties the engine together:
//! - Linked facts and the requirement policy model (`model`)
//! - Operator dispatch and requirement-set graph evaluation (`eval`)
//! - Token-addressed lookup sessions for interactive clients (`lookup`)
//!
//! # Example
//!
//! ```ignore
//! use reqeval::{DomainObject, EvaluationContext, RequirementEngine, evaluate_policy, load_policy};
//!
//! let policy = load_policy("policy.json")?;
//! let engine = RequirementEngine::new();
//! let reports = evaluate_policy(
//!     &engine,
//!     &policy.catalog,
//!     &[1],
//!     &DomainObject::PatientExamination(examination),
//!     &EvaluationContext::new(),
//! )?;
//! ```

pub mod policy;

// Re-export all public APIs from internal crates
pub use reqeval_eval as eval;
pub use reqeval_lookup as lookup;
pub use reqeval_model as model;

// Convenience re-exports
pub use policy::{PolicyError, PolicyResult, evaluate_policy};
pub use reqeval_eval::{EvalError, EvaluationContext, OperatorRegistry, RequirementEngine, SetReport};
pub use reqeval_lookup::{InMemorySessionStore, LookupConfig, LookupService};
pub use reqeval_model::{DomainObject, PolicyCatalog, RequirementLinks, aggregate, load_policy};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
