//! Operator registry for the requirement engine
//!
//! This module maps operator names to their implementations. Standard
//! operators come from `OperatorKind`; callers may register their own.

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::operators::OperatorKind;
use reqeval_model::{Requirement, RequirementLinks};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type alias for operator implementations
///
/// Arguments are the target links, the input links, the requirement and the
/// evaluation context.
pub type OperatorFn = Arc<
    dyn Fn(&RequirementLinks, &RequirementLinks, &Requirement, &EvaluationContext) -> EvalResult<bool>
        + Send
        + Sync,
>;

/// Registry of named operators
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, OperatorFn>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

impl OperatorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all standard operators registered
    pub fn with_standard_operators() -> Self {
        let mut registry = Self::new();
        registry.register_standard_operators();
        registry
    }

    /// Register every `OperatorKind`
    pub fn register_standard_operators(&mut self) {
        for kind in OperatorKind::ALL {
            let operator: OperatorFn = Arc::new(move |target, input, requirement, ctx| {
                kind.evaluate(target, input, requirement, ctx)
            });
            self.register(kind.name(), operator);
        }
    }

    /// Register an operator, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, implementation: OperatorFn) {
        self.operators.insert(name.into(), implementation);
    }

    /// Get an operator implementation
    pub fn get(&self, name: &str) -> Option<&OperatorFn> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Run the named operator
    ///
    /// Unknown names fail with `UnsupportedOperator`.
    pub fn dispatch(
        &self,
        name: &str,
        target: &RequirementLinks,
        input: &RequirementLinks,
        requirement: &Requirement,
        ctx: &EvaluationContext,
    ) -> EvalResult<bool> {
        let operator = self
            .get(name)
            .ok_or_else(|| EvalError::unsupported_operator(name, &requirement.name))?;
        let result = operator(target, input, requirement, ctx)?;
        log::debug!("operator {name} on '{}' -> {result}", requirement.name);
        Ok(result)
    }
}
