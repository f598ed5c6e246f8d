//! Lookup projection
//!
//! The client-facing view of a policy evaluation for one patient
//! examination: the selectable requirement sets, which findings are
//! available and required, per-requirement defaults and choice lists, and
//! the current satisfaction status.

use crate::error::LookupResult;
use reqeval_eval::{EvalError, EvaluationContext, RequirementEngine};
use reqeval_model::{
    DomainObject, EntityId, PatientExamination, PolicyCatalog, RequirementId, RequirementSetType, SetId,
    aggregate,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Payload keys
pub mod keys {
    pub const CONTEXT_ID: &str = "patient_examination_id";
    pub const REQUIREMENT_SETS: &str = "requirement_sets";
    pub const SELECTED_SETS: &str = "selectedRequirementSetIds";
    pub const AVAILABLE_FINDINGS: &str = "availableFindings";
    pub const REQUIRED_FINDINGS: &str = "requiredFindings";
    pub const REQUIREMENT_DEFAULTS: &str = "requirementDefaults";
    pub const CLASSIFICATION_CHOICES: &str = "classificationChoices";
    pub const REQUIREMENTS_BY_SET: &str = "requirementsBySet";
    pub const REQUIREMENT_STATUS: &str = "requirementStatus";
    pub const SET_STATUS: &str = "requirementSetStatus";

    /// Keys every valid session payload carries
    pub const REQUIRED: [&str; 3] = [CONTEXT_ID, REQUIREMENTS_BY_SET, REQUIREMENT_STATUS];

    /// Keys a user edits; changing one triggers a recompute
    pub const SELECTION: [&str; 1] = [SELECTED_SETS];

    /// Keys re-derived by a recompute
    pub const DERIVED: [&str; 8] = [
        REQUIREMENT_SETS,
        AVAILABLE_FINDINGS,
        REQUIRED_FINDINGS,
        REQUIREMENT_DEFAULTS,
        CLASSIFICATION_CHOICES,
        REQUIREMENTS_BY_SET,
        REQUIREMENT_STATUS,
        SET_STATUS,
    ];
}

/// Requirement set as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSummary {
    pub id: SetId,
    pub name: String,
    #[serde(rename = "type")]
    pub set_type: RequirementSetType,
}

/// Requirement as listed under its set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSummary {
    pub id: RequirementId,
    pub name: String,
}

/// Prefilled finding of a requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDefault {
    pub finding_id: EntityId,
    pub classification_choice_ids: Vec<EntityId>,
}

/// Selectable classification choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSummary {
    pub id: EntityId,
    pub name: String,
}

/// Full lookup payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupProjection {
    pub patient_examination_id: EntityId,
    pub requirement_sets: Vec<SetSummary>,
    #[serde(rename = "selectedRequirementSetIds")]
    pub selected_set_ids: Vec<SetId>,
    #[serde(rename = "availableFindings")]
    pub available_findings: Vec<EntityId>,
    #[serde(rename = "requiredFindings")]
    pub required_findings: Vec<EntityId>,
    #[serde(rename = "requirementDefaults")]
    pub requirement_defaults: BTreeMap<RequirementId, Vec<FindingDefault>>,
    #[serde(rename = "classificationChoices")]
    pub classification_choices: BTreeMap<RequirementId, Vec<ChoiceSummary>>,
    #[serde(rename = "requirementsBySet")]
    pub requirements_by_set: BTreeMap<SetId, Vec<RequirementSummary>>,
    #[serde(rename = "requirementStatus")]
    pub requirement_status: BTreeMap<RequirementId, bool>,
    #[serde(rename = "requirementSetStatus")]
    pub set_status: BTreeMap<SetId, bool>,
}

impl LookupProjection {
    /// Payload as a JSON object
    pub fn into_map(self) -> LookupResult<Map<String, Value>> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    /// Only the keys a recompute owns
    pub fn into_derived(self) -> LookupResult<Map<String, Value>> {
        let mut map = self.into_map()?;
        map.retain(|key, _| keys::DERIVED.contains(&key.as_str()));
        Ok(map)
    }
}

/// Every set id of the catalog, in catalog order
pub fn default_selection(catalog: &PolicyCatalog) -> Vec<SetId> {
    catalog.sets().map(|set| set.id).collect()
}

/// Derive the projection of an examination for the selected root sets
///
/// The scope is every set reachable from the selection. Unknown selected
/// ids are configuration errors.
pub fn derive(
    engine: &RequirementEngine,
    catalog: &PolicyCatalog,
    examination: &Arc<PatientExamination>,
    selection: &[SetId],
    ctx: &EvaluationContext,
) -> LookupResult<LookupProjection> {
    let mut scope: Vec<SetId> = Vec::new();
    for root in selection {
        for id in catalog.reachable_sets(*root).map_err(EvalError::from)? {
            if !scope.contains(&id) {
                scope.push(id);
            }
        }
    }

    let mut requirements_by_set = BTreeMap::new();
    let mut required_findings = BTreeSet::new();
    let mut requirement_defaults = BTreeMap::new();
    let mut classification_choices = BTreeMap::new();
    for set_id in &scope {
        let set = catalog.require_set(*set_id).map_err(EvalError::from)?;
        let requirements = catalog.requirements_of(set).map_err(EvalError::from)?;
        for requirement in &requirements {
            let targets = &requirement.targets;
            let choice_ids: Vec<EntityId> = targets
                .finding_classification_choices
                .iter()
                .map(|choice| choice.id)
                .collect();
            required_findings.extend(targets.findings.iter().map(|finding| finding.id));
            requirement_defaults.entry(requirement.id).or_insert_with(|| {
                targets
                    .findings
                    .iter()
                    .map(|finding| FindingDefault {
                        finding_id: finding.id,
                        classification_choice_ids: choice_ids.clone(),
                    })
                    .collect::<Vec<_>>()
            });
            classification_choices.entry(requirement.id).or_insert_with(|| {
                targets
                    .finding_classification_choices
                    .iter()
                    .map(|choice| ChoiceSummary {
                        id: choice.id,
                        name: choice.name.clone(),
                    })
                    .collect::<Vec<_>>()
            });
        }
        requirements_by_set.insert(
            *set_id,
            requirements
                .iter()
                .map(|requirement| RequirementSummary {
                    id: requirement.id,
                    name: requirement.name.clone(),
                })
                .collect(),
        );
    }

    let input = aggregate(&DomainObject::PatientExamination(Arc::clone(examination)))
        .map_err(EvalError::from)?;
    let reports = engine.evaluate_policy(catalog, selection, &input, ctx)?;
    let mut requirement_status = BTreeMap::new();
    let mut set_status = BTreeMap::new();
    for report in &reports {
        for (id, satisfied) in report.requirement_status() {
            requirement_status.entry(id).or_insert(satisfied);
        }
        for (id, satisfied) in report.set_status() {
            set_status.entry(id).or_insert(satisfied);
        }
    }
    log::debug!(
        "derived lookup projection for examination {} over {} set(s)",
        examination.id,
        scope.len()
    );

    Ok(LookupProjection {
        patient_examination_id: examination.id,
        requirement_sets: catalog
            .sets()
            .map(|set| SetSummary {
                id: set.id,
                name: set.name.clone(),
                set_type: set.effective_type(),
            })
            .collect(),
        selected_set_ids: selection.to_vec(),
        available_findings: examination
            .examination
            .as_ref()
            .map(|exam| exam.findings.clone())
            .unwrap_or_default(),
        required_findings: required_findings.into_iter().collect(),
        requirement_defaults,
        classification_choices,
        requirements_by_set,
        requirement_status,
        set_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqeval_model::{
        Examination, Finding, FindingClassificationChoice, PatientFinding, Requirement, RequirementLinks,
        RequirementOperator, RequirementSet,
    };
    use serde_json::json;

    fn catalog() -> PolicyCatalog {
        let polyp = Arc::new(Finding::new(10, "polyp"));
        let paris = Arc::new(FindingClassificationChoice::new(3, "Paris 0-Is"));
        let targets = RequirementLinks::builder().add(polyp).add(paris).build();
        PolicyCatalog::new()
            .with_requirement(
                Requirement::new(5, "polyp documented")
                    .with_operator(RequirementOperator::new("models_match_any"))
                    .with_targets(targets),
            )
            .unwrap()
            .with_set(RequirementSet::new(1, "screening").with_requirements([5]).with_links([2]))
            .unwrap()
            .with_set(RequirementSet::new(2, "empty").with_type(RequirementSetType::Any))
            .unwrap()
    }

    fn examination(findings: &[EntityId]) -> Arc<PatientExamination> {
        let mut exam = PatientExamination::new(1);
        exam.examination = Some(Arc::new(Examination::new(7, "colonoscopy").with_findings([10, 11])));
        exam.findings = findings
            .iter()
            .map(|id| Arc::new(PatientFinding::new(100 + id, Arc::new(Finding::new(*id, "f")))))
            .collect();
        Arc::new(exam)
    }

    #[test]
    fn test_projection_payload_shape() {
        let engine = RequirementEngine::new();
        let projection = derive(&engine, &catalog(), &examination(&[10]), &[1], &EvaluationContext::new()).unwrap();
        let map = projection.into_map().unwrap();

        assert_eq!(
            Value::Object(map),
            json!({
                "patient_examination_id": 1,
                "requirement_sets": [
                    {"id": 1, "name": "screening", "type": "all"},
                    {"id": 2, "name": "empty", "type": "any"}
                ],
                "selectedRequirementSetIds": [1],
                "availableFindings": [10, 11],
                "requiredFindings": [10],
                "requirementDefaults": {"5": [{"finding_id": 10, "classification_choice_ids": [3]}]},
                "classificationChoices": {"5": [{"id": 3, "name": "Paris 0-Is"}]},
                "requirementsBySet": {"1": [{"id": 5, "name": "polyp documented"}], "2": []},
                "requirementStatus": {"5": true},
                "requirementSetStatus": {"1": false, "2": false}
            })
        );
    }

    #[test]
    fn test_derived_keys_only() {
        let engine = RequirementEngine::new();
        let derived = derive(&engine, &catalog(), &examination(&[]), &[2], &EvaluationContext::new())
            .unwrap()
            .into_derived()
            .unwrap();
        assert!(!derived.contains_key(keys::CONTEXT_ID));
        assert!(!derived.contains_key(keys::SELECTED_SETS));
        assert_eq!(derived.len(), keys::DERIVED.len());
        assert_eq!(derived[keys::REQUIRED_FINDINGS], json!([]));
    }

    #[test]
    fn test_unknown_selection_is_an_error() {
        let engine = RequirementEngine::new();
        let result = derive(&engine, &catalog(), &examination(&[]), &[99], &EvaluationContext::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_default_selection_lists_all_sets() {
        assert_eq!(default_selection(&catalog()), vec![1, 2]);
    }
}
