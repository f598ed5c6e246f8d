//! Policy catalog
//!
//! Arena of requirements and requirement sets addressed by id. Set edges are
//! stored as id lists, so cyclic graphs need no shared mutable state.

use crate::error::{ModelError, ModelResult};
use crate::requirement::{Requirement, RequirementId};
use crate::requirement_set::{RequirementSet, SetId};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use std::sync::Arc;

/// Read-only store of the configured policy
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    requirements: IndexMap<RequirementId, Arc<Requirement>>,
    sets: IndexMap<SetId, Arc<RequirementSet>>,
}

impl PolicyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement; ids must be unique
    pub fn insert_requirement(&mut self, requirement: Requirement) -> ModelResult<()> {
        if self.requirements.contains_key(&requirement.id) {
            return Err(ModelError::DuplicateRequirement { id: requirement.id });
        }
        self.requirements.insert(requirement.id, Arc::new(requirement));
        Ok(())
    }

    /// Add a requirement set; ids must be unique
    pub fn insert_set(&mut self, set: RequirementSet) -> ModelResult<()> {
        if self.sets.contains_key(&set.id) {
            return Err(ModelError::DuplicateRequirementSet { id: set.id });
        }
        self.sets.insert(set.id, Arc::new(set));
        Ok(())
    }

    /// Builder-style variant of `insert_requirement`
    pub fn with_requirement(mut self, requirement: Requirement) -> ModelResult<Self> {
        self.insert_requirement(requirement)?;
        Ok(self)
    }

    /// Builder-style variant of `insert_set`
    pub fn with_set(mut self, set: RequirementSet) -> ModelResult<Self> {
        self.insert_set(set)?;
        Ok(self)
    }

    pub fn requirement(&self, id: RequirementId) -> Option<&Arc<Requirement>> {
        self.requirements.get(&id)
    }

    pub fn set(&self, id: SetId) -> Option<&Arc<RequirementSet>> {
        self.sets.get(&id)
    }

    /// Look up a set or fail with `UnknownRequirementSet`
    pub fn require_set(&self, id: SetId) -> ModelResult<&Arc<RequirementSet>> {
        self.set(id).ok_or(ModelError::UnknownRequirementSet { id })
    }

    pub fn set_by_name(&self, name: &str) -> Option<&Arc<RequirementSet>> {
        self.sets.values().find(|s| s.name == name)
    }

    pub fn requirements(&self) -> impl Iterator<Item = &Arc<Requirement>> {
        self.requirements.values()
    }

    pub fn sets(&self) -> impl Iterator<Item = &Arc<RequirementSet>> {
        self.sets.values()
    }

    /// Requirements directly owned by a set, in declaration order
    ///
    /// Unknown requirement ids fail with `UnknownRequirement`.
    pub fn requirements_of(&self, set: &RequirementSet) -> ModelResult<Vec<&Arc<Requirement>>> {
        set.requirements
            .iter()
            .map(|id| {
                self.requirement(*id).ok_or(ModelError::UnknownRequirement {
                    set: set.id,
                    requirement: *id,
                })
            })
            .collect()
    }

    /// The set and every set reachable from it, breadth first, each once
    pub fn reachable_sets(&self, root: SetId) -> ModelResult<Vec<SetId>> {
        self.require_set(root)?;
        let mut seen: IndexSet<SetId> = IndexSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for child in &self.require_set(id)?.links_to_sets {
                if !seen.contains(child) {
                    queue.push_back(*child);
                }
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Check references and operator names
    ///
    /// `is_known_operator` answers whether the dispatcher can resolve a name.
    /// An operator passes when either its bound function or its own name is
    /// known, mirroring dispatch order.
    pub fn validate(&self, is_known_operator: impl Fn(&str) -> bool) -> ModelResult<()> {
        for requirement in self.requirements.values() {
            for operator in &requirement.operators {
                let bound = operator
                    .evaluation_function
                    .as_deref()
                    .is_some_and(&is_known_operator);
                if !bound && !is_known_operator(&operator.name) {
                    return Err(ModelError::unsupported_operator(
                        operator.resolved_name(),
                        &requirement.name,
                    ));
                }
            }
        }
        for set in self.sets.values() {
            self.requirements_of(set)?;
            for child in &set.links_to_sets {
                self.require_set(*child)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::RequirementOperator;

    fn catalog() -> PolicyCatalog {
        PolicyCatalog::new()
            .with_requirement(
                Requirement::new(1, "r1").with_operator(RequirementOperator::new("models_match_all")),
            )
            .unwrap()
            .with_set(RequirementSet::new(10, "a").with_requirements([1]).with_links([11]))
            .unwrap()
            .with_set(RequirementSet::new(11, "b").with_links([10, 12]))
            .unwrap()
            .with_set(RequirementSet::new(12, "c"))
            .unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut c = catalog();
        assert_eq!(
            c.insert_requirement(Requirement::new(1, "again")),
            Err(ModelError::DuplicateRequirement { id: 1 })
        );
        assert_eq!(
            c.insert_set(RequirementSet::new(12, "again")),
            Err(ModelError::DuplicateRequirementSet { id: 12 })
        );
    }

    #[test]
    fn test_reachable_sets_terminates_on_cycles() {
        let c = catalog();
        assert_eq!(c.reachable_sets(10).unwrap(), vec![10, 11, 12]);
        assert_eq!(c.reachable_sets(12).unwrap(), vec![12]);
        assert!(matches!(
            c.reachable_sets(99),
            Err(ModelError::UnknownRequirementSet { id: 99 })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_operator() {
        let c = catalog();
        assert!(c.validate(|name| name == "models_match_all").is_ok());
        assert_eq!(
            c.validate(|_| false),
            Err(ModelError::unsupported_operator("models_match_all", "r1"))
        );
    }

    #[test]
    fn test_validate_rejects_dangling_references() {
        let c = PolicyCatalog::new()
            .with_set(RequirementSet::new(1, "s").with_requirements([5]))
            .unwrap();
        assert_eq!(
            c.validate(|_| true),
            Err(ModelError::UnknownRequirement { set: 1, requirement: 5 })
        );

        let c = PolicyCatalog::new()
            .with_set(RequirementSet::new(1, "s").with_links([2]))
            .unwrap();
        assert_eq!(c.validate(|_| true), Err(ModelError::UnknownRequirementSet { id: 2 }));
    }
}
