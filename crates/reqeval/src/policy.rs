//! Policy evaluation entry point

use reqeval_eval::{EvalError, EvaluationContext, RequirementEngine, SetReport};
use reqeval_model::{AggregateError, DomainObject, PolicyCatalog, SetId, aggregate};
use thiserror::Error;

/// Result type for policy evaluation
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that abort a policy evaluation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The context object cannot be turned into linked facts
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Configuration error found while walking the requirement sets
    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

/// Evaluate root requirement sets against an already materialized context
///
/// Facts are aggregated once; each root then gets its own traversal, so a set
/// shared by two roots is evaluated in full under both.
pub fn evaluate_policy(
    engine: &RequirementEngine,
    catalog: &PolicyCatalog,
    root_set_ids: &[SetId],
    context: &DomainObject,
    ctx: &EvaluationContext,
) -> PolicyResult<Vec<SetReport>> {
    let input = aggregate(context)?;
    log::debug!(
        "evaluating {} root set(s) against {}",
        root_set_ids.len(),
        context.type_name()
    );
    Ok(engine.evaluate_policy(catalog, root_set_ids, &input, ctx)?)
}
