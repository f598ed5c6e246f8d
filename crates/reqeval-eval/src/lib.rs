//! Requirement Evaluation Engine
//!
//! This crate decides whether requirements and nested requirement sets are
//! satisfied by the facts aggregated from a context object:
//!
//! - **Set Operators**: models_match_any, models_match_all, models_match_any_in_timeframe
//! - **Lab Value Operators**: latest numeric value against normal ranges,
//!   thresholds and factor changes; latest categorical value against strings
//!   and regexes; each optionally restricted to a day window
//! - **Combinators**: all, any, none, exactly_1, at_least_1, at_most_1
//! - **Graph Evaluation**: cycle-safe traversal of linked requirement sets
//!
//! # Example
//!
//! ```ignore
//! use reqeval_eval::{EvaluationContext, RequirementEngine};
//!
//! let engine = RequirementEngine::new();
//! let ctx = EvaluationContext::new();
//! let report = engine.evaluate_set(&catalog, root_id, &input, &ctx)?;
//! for failed in report.failed_requirements() {
//!     println!("{}: {:?}", failed.name, failed.message);
//! }
//! ```
//!
//! # Architecture
//!
//! - `RequirementEngine`: evaluates requirements and walks set graphs
//! - `OperatorRegistry`: maps operator names to implementations
//! - `EvaluationContext`: reference date and free-form parameters
//! - `SetReport`: structured, serializable evaluation result
//!
//! # Cycles
//!
//! Requirement sets may link to each other in cycles. Each traversal keeps a
//! visited set; a set reached again is reported as a satisfied stub with
//! `revisited = true`.

pub mod context;
pub mod engine;
pub mod error;
pub mod operators;
pub mod registry;
pub mod report;

// Re-export main types
pub use context::{EvaluationContext, EvaluationContextBuilder};
pub use engine::RequirementEngine;
pub use error::{EvalError, EvalResult};
pub use operators::{OperatorKind, Window, combine};
pub use registry::{OperatorFn, OperatorRegistry};
pub use report::{FailedRequirements, RequirementResult, SetReport};
