//! Requirement evaluation engine
//!
//! This module provides the main `RequirementEngine`, which evaluates single
//! requirements through the operator registry and walks requirement-set
//! graphs.

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::operators::combine;
use crate::registry::OperatorRegistry;
use crate::report::{RequirementResult, SetReport};
use reqeval_model::{PolicyCatalog, Requirement, RequirementLinks, RequirementOperator, SetId};
use std::collections::HashSet;

/// The requirement evaluation engine
///
/// Holds no per-evaluation state, so one engine can serve concurrent
/// evaluations.
#[derive(Debug, Clone)]
pub struct RequirementEngine {
    /// Operator registry
    registry: OperatorRegistry,
}

impl Default for RequirementEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RequirementEngine {
    /// Create a new engine with standard operators
    pub fn new() -> Self {
        Self {
            registry: OperatorRegistry::with_standard_operators(),
        }
    }

    /// Create an engine with a custom registry
    pub fn with_registry(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Get a mutable reference to the registry
    pub fn registry_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.registry
    }

    /// Check a catalog against this engine's operators
    pub fn validate_catalog(&self, catalog: &PolicyCatalog) -> EvalResult<()> {
        catalog.validate(|name| self.registry.contains(name))?;
        Ok(())
    }

    /// Run one operator
    ///
    /// A bound evaluation function is tried first, then the operator name.
    pub fn dispatch(
        &self,
        operator: &RequirementOperator,
        target: &RequirementLinks,
        input: &RequirementLinks,
        requirement: &Requirement,
        ctx: &EvaluationContext,
    ) -> EvalResult<bool> {
        let name = operator
            .evaluation_function
            .as_deref()
            .filter(|function| self.registry.contains(function))
            .unwrap_or(operator.name.as_str());
        self.registry.dispatch(name, target, input, requirement, ctx)
    }

    /// Evaluate a requirement against input links
    ///
    /// Every operator must hold. A requirement without operators is never
    /// satisfied.
    pub fn evaluate_requirement(
        &self,
        requirement: &Requirement,
        input: &RequirementLinks,
        ctx: &EvaluationContext,
    ) -> EvalResult<bool> {
        if requirement.operators.is_empty() {
            log::debug!("requirement '{}' has no operators", requirement.name);
            return Ok(false);
        }
        let target = requirement.target_links();
        for operator in &requirement.operators {
            if !self.dispatch(operator, &target, input, requirement, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate a requirement set and everything reachable from it
    ///
    /// Each set is evaluated at most once per call; a set reached again
    /// yields a `revisited` stub that counts as satisfied.
    pub fn evaluate_set(
        &self,
        catalog: &PolicyCatalog,
        set_id: SetId,
        input: &RequirementLinks,
        ctx: &EvaluationContext,
    ) -> EvalResult<SetReport> {
        let mut visited = HashSet::new();
        self.evaluate_set_inner(catalog, set_id, input, ctx, &mut visited)
    }

    /// Evaluate several root sets, each with its own traversal
    pub fn evaluate_policy(
        &self,
        catalog: &PolicyCatalog,
        root_ids: &[SetId],
        input: &RequirementLinks,
        ctx: &EvaluationContext,
    ) -> EvalResult<Vec<SetReport>> {
        root_ids
            .iter()
            .map(|id| self.evaluate_set(catalog, *id, input, ctx))
            .collect()
    }

    fn evaluate_set_inner(
        &self,
        catalog: &PolicyCatalog,
        set_id: SetId,
        input: &RequirementLinks,
        ctx: &EvaluationContext,
        visited: &mut HashSet<SetId>,
    ) -> EvalResult<SetReport> {
        let set = catalog.require_set(set_id)?;
        let set_type = set.effective_type();

        if !visited.insert(set_id) {
            log::warn!(
                "requirement set {} ('{}') already visited, reporting it as satisfied",
                set.id,
                set.name
            );
            return Ok(SetReport::revisited(set.id, &set.name, set_type));
        }

        let mut requirements = Vec::with_capacity(set.requirements.len());
        for requirement in catalog.requirements_of(set)? {
            requirements.push(self.requirement_result(requirement, input, ctx)?);
        }

        let mut children = Vec::with_capacity(set.links_to_sets.len());
        for child in &set.links_to_sets {
            children.push(self.evaluate_set_inner(catalog, *child, input, ctx, visited)?);
        }

        let values: Vec<bool> = requirements
            .iter()
            .map(|r| r.satisfied)
            .chain(children.iter().map(|c| c.satisfied))
            .collect();
        let satisfied = combine(set_type, &values);
        log::debug!(
            "requirement set {} ('{}', {set_type}) -> {satisfied}",
            set.id,
            set.name
        );

        Ok(SetReport {
            id: set.id,
            name: set.name.clone(),
            set_type,
            satisfied,
            requirements,
            children,
            revisited: false,
        })
    }

    /// Evaluate one requirement, turning local failures into a message
    fn requirement_result(
        &self,
        requirement: &Requirement,
        input: &RequirementLinks,
        ctx: &EvaluationContext,
    ) -> EvalResult<RequirementResult> {
        let (satisfied, message) = match self.evaluate_requirement(requirement, input, ctx) {
            Ok(satisfied) => (satisfied, None),
            Err(err) if err.is_configuration_error() => return Err(err),
            Err(err) => {
                log::warn!("requirement '{}' failed: {err}", requirement.name);
                (false, Some(err.to_string()))
            }
        };
        log::trace!("requirement {} ('{}') -> {satisfied}", requirement.id, requirement.name);
        Ok(RequirementResult {
            id: requirement.id,
            name: requirement.name.clone(),
            satisfied,
            message,
        })
    }
}
