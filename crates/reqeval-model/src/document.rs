//! JSON policy and context documents
//!
//! Documents reference entities by id. Resolving a document turns those ids
//! into `Arc`-linked entities and fails on the first dangling reference.

use crate::catalog::PolicyCatalog;
use crate::entities::{
    Disease, DiseaseClassificationChoice, EntityId, Event, Examination, ExaminationIndication,
    ExaminationIndicationClassificationChoice, Finding, FindingClassificationChoice,
    FindingIntervention, LabValue, Medication, MedicationIndication, MedicationIntakeTime,
    MedicationSchedule, NormalRange, Patient, PatientDisease, PatientEvent, PatientExamination,
    PatientFinding, PatientLabValue, PatientMedication, PatientMedicationSchedule, PatientRecord,
};
use crate::error::ModelError;
use crate::links::{LinkCategory, Linked, RequirementLinks, RequirementLinksBuilder};
use crate::provider::{ContextProvider, ContextProviderError};
use crate::requirement::{Requirement, RequirementId, RequirementOperator, RequirementType, Unit};
use crate::requirement_set::RequirementSet;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use smallvec::SmallVec;
use std::path::Path;
use std::sync::Arc;

/// Result type for document loading
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Document loading error
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported file extension: {0}. Expected .json")]
    UnsupportedExtension(String),

    #[error("Unknown {category} id {id}")]
    UnknownEntity { category: LinkCategory, id: EntityId },

    #[error("Requirement {requirement} targets {category}, which is not a catalog category")]
    UnsupportedTarget {
        requirement: RequirementId,
        category: LinkCategory,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl DocumentError {
    pub fn unknown_entity(category: LinkCategory, id: EntityId) -> Self {
        Self::UnknownEntity { category, id }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> DocumentResult<T> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
        Some(ext) => Err(DocumentError::UnsupportedExtension(format!(".{ext}"))),
        None => Err(DocumentError::UnsupportedExtension("(none)".to_string())),
    }
}

fn lookup<T>(
    map: &IndexMap<EntityId, Arc<T>>,
    category: LinkCategory,
    id: EntityId,
) -> DocumentResult<Arc<T>> {
    map.get(&id)
        .cloned()
        .ok_or_else(|| DocumentError::unknown_entity(category, id))
}

fn lookup_all<T>(
    map: &IndexMap<EntityId, Arc<T>>,
    category: LinkCategory,
    ids: &[EntityId],
) -> DocumentResult<Vec<Arc<T>>> {
    ids.iter().map(|id| lookup(map, category, *id)).collect()
}

fn lookup_opt<T>(
    map: &IndexMap<EntityId, Arc<T>>,
    category: LinkCategory,
    id: Option<EntityId>,
) -> DocumentResult<Option<Arc<T>>> {
    id.map(|id| lookup(map, category, id)).transpose()
}

fn index<T>(items: Vec<T>, id: impl Fn(&T) -> EntityId) -> IndexMap<EntityId, Arc<T>> {
    items.into_iter().map(|item| (id(&item), Arc::new(item))).collect()
}

// ============================================================================
// Policy documents
// ============================================================================

/// Catalog entities, requirements and sets as authored in JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    pub examinations: Vec<Examination>,
    pub examination_indications: Vec<ExaminationIndication>,
    pub examination_indication_classification_choices: Vec<ExaminationIndicationClassificationChoice>,
    pub lab_values: Vec<LabValue>,
    pub diseases: Vec<Disease>,
    pub disease_classification_choices: Vec<DiseaseClassificationChoice>,
    pub events: Vec<Event>,
    pub findings: Vec<Finding>,
    pub finding_classification_choices: Vec<FindingClassificationChoice>,
    pub finding_interventions: Vec<FindingIntervention>,
    pub medications: Vec<Medication>,
    pub medication_indications: Vec<MedicationIndication>,
    pub medication_intake_times: Vec<MedicationIntakeTime>,
    pub medication_schedules: Vec<MedicationSchedule>,
    pub requirements: Vec<RequirementDocument>,
    pub requirement_sets: Vec<RequirementSet>,
}

/// Requirement with its targets given as ids per category
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementDocument {
    pub id: RequirementId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub numeric_value: Option<Decimal>,
    #[serde(default)]
    pub numeric_value_min: Option<Decimal>,
    #[serde(default)]
    pub numeric_value_max: Option<Decimal>,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub string_values: Vec<String>,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub requirement_types: Vec<String>,
    #[serde(default)]
    pub operators: Vec<RequirementOperator>,
    #[serde(default)]
    pub targets: IndexMap<LinkCategory, Vec<EntityId>>,
}

/// Catalog entities keyed by id
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    pub examinations: IndexMap<EntityId, Arc<Examination>>,
    pub examination_indications: IndexMap<EntityId, Arc<ExaminationIndication>>,
    pub examination_indication_classification_choices:
        IndexMap<EntityId, Arc<ExaminationIndicationClassificationChoice>>,
    pub lab_values: IndexMap<EntityId, Arc<LabValue>>,
    pub diseases: IndexMap<EntityId, Arc<Disease>>,
    pub disease_classification_choices: IndexMap<EntityId, Arc<DiseaseClassificationChoice>>,
    pub events: IndexMap<EntityId, Arc<Event>>,
    pub findings: IndexMap<EntityId, Arc<Finding>>,
    pub finding_classification_choices: IndexMap<EntityId, Arc<FindingClassificationChoice>>,
    pub finding_interventions: IndexMap<EntityId, Arc<FindingIntervention>>,
    pub medications: IndexMap<EntityId, Arc<Medication>>,
    pub medication_indications: IndexMap<EntityId, Arc<MedicationIndication>>,
    pub medication_intake_times: IndexMap<EntityId, Arc<MedicationIntakeTime>>,
    pub medication_schedules: IndexMap<EntityId, Arc<MedicationSchedule>>,
}

impl EntityCatalog {
    /// Resolve target ids into a links bag
    ///
    /// Only catalog categories can be targeted from a document.
    pub fn links_for(
        &self,
        requirement: RequirementId,
        targets: &IndexMap<LinkCategory, Vec<EntityId>>,
    ) -> DocumentResult<RequirementLinks> {
        let mut builder = RequirementLinks::builder();
        for (category, ids) in targets {
            for id in ids {
                self.push_target(&mut builder, requirement, *category, *id)?;
            }
        }
        Ok(builder.build())
    }

    fn push_target(
        &self,
        builder: &mut RequirementLinksBuilder,
        requirement: RequirementId,
        category: LinkCategory,
        id: EntityId,
    ) -> DocumentResult<()> {
        fn push<T: Linked>(
            builder: &mut RequirementLinksBuilder,
            map: &IndexMap<EntityId, Arc<T>>,
            category: LinkCategory,
            id: EntityId,
        ) -> DocumentResult<()> {
            builder.push(lookup(map, category, id)?);
            Ok(())
        }

        use LinkCategory as C;
        match category {
            C::Examinations => push(builder, &self.examinations, category, id),
            C::ExaminationIndications => push(builder, &self.examination_indications, category, id),
            C::ExaminationIndicationClassificationChoices => push(
                builder,
                &self.examination_indication_classification_choices,
                category,
                id,
            ),
            C::LabValues => push(builder, &self.lab_values, category, id),
            C::Diseases => push(builder, &self.diseases, category, id),
            C::DiseaseClassificationChoices => {
                push(builder, &self.disease_classification_choices, category, id)
            }
            C::Events => push(builder, &self.events, category, id),
            C::Findings => push(builder, &self.findings, category, id),
            C::FindingClassificationChoices => {
                push(builder, &self.finding_classification_choices, category, id)
            }
            C::FindingInterventions => push(builder, &self.finding_interventions, category, id),
            C::Medications => push(builder, &self.medications, category, id),
            C::MedicationIndications => push(builder, &self.medication_indications, category, id),
            C::MedicationIntakeTimes => push(builder, &self.medication_intake_times, category, id),
            C::MedicationSchedules => push(builder, &self.medication_schedules, category, id),
            C::PatientExaminations
            | C::PatientLabValues
            | C::PatientDiseases
            | C::PatientEvents
            | C::PatientFindings
            | C::PatientMedications
            | C::PatientMedicationSchedules
            | C::Patients => Err(DocumentError::UnsupportedTarget { requirement, category }),
        }
    }
}

/// A resolved policy: catalog entities plus the requirement graph
#[derive(Debug, Clone, Default)]
pub struct LoadedPolicy {
    pub entities: EntityCatalog,
    pub catalog: PolicyCatalog,
}

impl PolicyDocument {
    /// Parse a policy document from a JSON string
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a policy document from a `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> DocumentResult<Self> {
        read_json(path.as_ref())
    }

    /// Resolve id references into a `LoadedPolicy`
    ///
    /// Operator names are not checked here; see `PolicyCatalog::validate`.
    pub fn resolve(self) -> DocumentResult<LoadedPolicy> {
        let entities = EntityCatalog {
            examinations: index(self.examinations, |e| e.id),
            examination_indications: index(self.examination_indications, |e| e.id),
            examination_indication_classification_choices: index(
                self.examination_indication_classification_choices,
                |e| e.id,
            ),
            lab_values: index(self.lab_values, |e| e.id),
            diseases: index(self.diseases, |e| e.id),
            disease_classification_choices: index(self.disease_classification_choices, |e| e.id),
            events: index(self.events, |e| e.id),
            findings: index(self.findings, |e| e.id),
            finding_classification_choices: index(self.finding_classification_choices, |e| e.id),
            finding_interventions: index(self.finding_interventions, |e| e.id),
            medications: index(self.medications, |e| e.id),
            medication_indications: index(self.medication_indications, |e| e.id),
            medication_intake_times: index(self.medication_intake_times, |e| e.id),
            medication_schedules: index(self.medication_schedules, |e| e.id),
        };

        let mut catalog = PolicyCatalog::new();
        for doc in self.requirements {
            let targets = entities.links_for(doc.id, &doc.targets)?;
            let requirement = Requirement {
                id: doc.id,
                name: doc.name,
                description: doc.description,
                numeric_value: doc.numeric_value,
                numeric_value_min: doc.numeric_value_min,
                numeric_value_max: doc.numeric_value_max,
                string_value: doc.string_value,
                string_values: doc.string_values,
                unit: doc.unit,
                requirement_types: doc
                    .requirement_types
                    .into_iter()
                    .map(RequirementType::new)
                    .collect::<SmallVec<_>>(),
                operators: doc.operators.into_iter().collect(),
                targets,
            };
            catalog.insert_requirement(requirement)?;
        }
        for set in self.requirement_sets {
            catalog.insert_set(set)?;
        }

        log::debug!(
            "resolved policy with {} requirements and {} sets",
            catalog.requirements().count(),
            catalog.sets().count()
        );
        Ok(LoadedPolicy { entities, catalog })
    }
}

/// Load and resolve a policy file in one step
pub fn load_policy(path: impl AsRef<Path>) -> DocumentResult<LoadedPolicy> {
    PolicyDocument::from_file(path)?.resolve()
}

// ============================================================================
// Context documents
// ============================================================================

/// Patient-level facts as authored in JSON
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContextDocument {
    pub patients: Vec<Patient>,
    pub patient_examinations: Vec<PatientExaminationDocument>,
    pub patient_lab_values: Vec<PatientLabValueDocument>,
    pub patient_diseases: Vec<PatientDiseaseDocument>,
    pub patient_events: Vec<PatientEventDocument>,
    pub patient_medications: Vec<PatientMedicationDocument>,
    pub patient_medication_schedules: Vec<PatientMedicationScheduleDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientExaminationDocument {
    pub id: EntityId,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    #[serde(default)]
    pub examination_id: Option<EntityId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub indication_ids: Vec<EntityId>,
    #[serde(default)]
    pub indication_choice_ids: Vec<EntityId>,
    #[serde(default)]
    pub findings: Vec<PatientFindingDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientFindingDocument {
    pub id: EntityId,
    pub finding_id: EntityId,
    #[serde(default)]
    pub classification_choice_ids: Vec<EntityId>,
    #[serde(default)]
    pub intervention_ids: Vec<EntityId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientLabValueDocument {
    pub id: EntityId,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    pub lab_value_id: EntityId,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default)]
    pub value_str: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub normal_range: Option<NormalRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientDiseaseDocument {
    pub id: EntityId,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    pub disease_id: EntityId,
    #[serde(default)]
    pub classification_choice_ids: Vec<EntityId>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientEventDocument {
    pub id: EntityId,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    pub event_id: EntityId,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientMedicationDocument {
    pub id: EntityId,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    pub medication_id: EntityId,
    #[serde(default)]
    pub indication_id: Option<EntityId>,
    #[serde(default)]
    pub intake_time_ids: Vec<EntityId>,
    #[serde(default)]
    pub schedule_id: Option<EntityId>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientMedicationScheduleDocument {
    pub id: EntityId,
    #[serde(default)]
    pub patient_id: Option<EntityId>,
    /// Ids of entries in `patient_medications`
    #[serde(default)]
    pub medication_ids: Vec<EntityId>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// Resolved patient-level facts
///
/// Implements `ContextProvider`, so a loaded document can back the lookup
/// cache directly.
#[derive(Debug, Clone, Default)]
pub struct LoadedContext {
    pub patients: IndexMap<EntityId, Arc<Patient>>,
    pub examinations: IndexMap<EntityId, Arc<PatientExamination>>,
    pub records: IndexMap<EntityId, Arc<PatientRecord>>,
}

impl LoadedContext {
    pub fn examination(&self, id: EntityId) -> Option<&Arc<PatientExamination>> {
        self.examinations.get(&id)
    }

    pub fn record(&self, patient_id: EntityId) -> Option<&Arc<PatientRecord>> {
        self.records.get(&patient_id)
    }
}

impl ContextProvider for LoadedContext {
    fn patient_examination(
        &self,
        id: EntityId,
    ) -> Result<Arc<PatientExamination>, ContextProviderError> {
        self.examination(id)
            .cloned()
            .ok_or(ContextProviderError::PatientExaminationNotFound(id))
    }

    fn patient(&self, id: EntityId) -> Result<Arc<PatientRecord>, ContextProviderError> {
        self.record(id)
            .cloned()
            .ok_or(ContextProviderError::PatientNotFound(id))
    }
}

impl ContextDocument {
    /// Parse a context document from a JSON string
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a context document from a `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> DocumentResult<Self> {
        read_json(path.as_ref())
    }

    /// Resolve id references against the policy's catalog entities
    pub fn resolve(self, entities: &EntityCatalog) -> DocumentResult<LoadedContext> {
        let patients = index(self.patients, |p| p.id);
        let patient = |id: Option<EntityId>| lookup_opt(&patients, LinkCategory::Patients, id);

        let mut examinations = IndexMap::new();
        for doc in self.patient_examinations {
            let owner = patient(doc.patient_id)?;
            let mut findings = Vec::with_capacity(doc.findings.len());
            for f in doc.findings {
                let finding = lookup(&entities.findings, LinkCategory::Findings, f.finding_id)?;
                let mut pf = PatientFinding::new(f.id, finding);
                pf.patient = owner.clone();
                pf.patient_examination_id = Some(doc.id);
                pf.classification_choices = lookup_all(
                    &entities.finding_classification_choices,
                    LinkCategory::FindingClassificationChoices,
                    &f.classification_choice_ids,
                )?;
                pf.interventions = lookup_all(
                    &entities.finding_interventions,
                    LinkCategory::FindingInterventions,
                    &f.intervention_ids,
                )?;
                pf.date = f.date.or(doc.date);
                findings.push(Arc::new(pf));
            }

            let mut exam = PatientExamination::new(doc.id);
            exam.patient = owner;
            exam.examination = lookup_opt(
                &entities.examinations,
                LinkCategory::Examinations,
                doc.examination_id,
            )?;
            exam.date = doc.date;
            exam.indications = lookup_all(
                &entities.examination_indications,
                LinkCategory::ExaminationIndications,
                &doc.indication_ids,
            )?;
            exam.indication_choices = lookup_all(
                &entities.examination_indication_classification_choices,
                LinkCategory::ExaminationIndicationClassificationChoices,
                &doc.indication_choice_ids,
            )?;
            exam.findings = findings;
            examinations.insert(doc.id, Arc::new(exam));
        }

        let mut lab_values = Vec::new();
        for doc in self.patient_lab_values {
            let lab_value = lookup(&entities.lab_values, LinkCategory::LabValues, doc.lab_value_id)?;
            lab_values.push(Arc::new(PatientLabValue {
                id: doc.id,
                patient: patient(doc.patient_id)?,
                lab_value: Some(lab_value),
                value: doc.value,
                value_str: doc.value_str,
                date: doc.date,
                normal_range: doc.normal_range,
            }));
        }

        let mut diseases = Vec::new();
        for doc in self.patient_diseases {
            let mut disease = PatientDisease::new(
                doc.id,
                lookup(&entities.diseases, LinkCategory::Diseases, doc.disease_id)?,
            );
            disease.patient = patient(doc.patient_id)?;
            disease.classification_choices = lookup_all(
                &entities.disease_classification_choices,
                LinkCategory::DiseaseClassificationChoices,
                &doc.classification_choice_ids,
            )?;
            disease.start_date = doc.start_date;
            disease.end_date = doc.end_date;
            diseases.push(Arc::new(disease));
        }

        let mut events = Vec::new();
        for doc in self.patient_events {
            let mut event = PatientEvent::new(
                doc.id,
                lookup(&entities.events, LinkCategory::Events, doc.event_id)?,
                doc.date,
            );
            event.patient = patient(doc.patient_id)?;
            events.push(Arc::new(event));
        }

        let mut medications = IndexMap::new();
        for doc in self.patient_medications {
            let mut medication = PatientMedication::new(
                doc.id,
                lookup(&entities.medications, LinkCategory::Medications, doc.medication_id)?,
            );
            medication.patient = patient(doc.patient_id)?;
            medication.indication = lookup_opt(
                &entities.medication_indications,
                LinkCategory::MedicationIndications,
                doc.indication_id,
            )?;
            medication.intake_times = lookup_all(
                &entities.medication_intake_times,
                LinkCategory::MedicationIntakeTimes,
                &doc.intake_time_ids,
            )?;
            medication.schedule = lookup_opt(
                &entities.medication_schedules,
                LinkCategory::MedicationSchedules,
                doc.schedule_id,
            )?;
            medication.start_date = doc.start_date;
            medications.insert(doc.id, Arc::new(medication));
        }

        let mut schedules = Vec::new();
        for doc in self.patient_medication_schedules {
            schedules.push(Arc::new(PatientMedicationSchedule {
                id: doc.id,
                patient: patient(doc.patient_id)?,
                medications: lookup_all(
                    &medications,
                    LinkCategory::PatientMedications,
                    &doc.medication_ids,
                )?,
                start_date: doc.start_date,
            }));
        }

        let owned_by = |owner: Option<&Arc<Patient>>, id: EntityId| owner.is_some_and(|p| p.id == id);
        let records = patients
            .values()
            .map(|p| {
                let mut record = PatientRecord::new(Arc::clone(p));
                record.examinations = examinations
                    .values()
                    .filter(|e: &&Arc<PatientExamination>| owned_by(e.patient.as_ref(), p.id))
                    .cloned()
                    .collect();
                record.lab_values = lab_values
                    .iter()
                    .filter(|v| owned_by(v.patient.as_ref(), p.id))
                    .cloned()
                    .collect();
                record.diseases = diseases
                    .iter()
                    .filter(|d| owned_by(d.patient.as_ref(), p.id))
                    .cloned()
                    .collect();
                record.events = events
                    .iter()
                    .filter(|e| owned_by(e.patient.as_ref(), p.id))
                    .cloned()
                    .collect();
                record.medications = medications
                    .values()
                    .filter(|m| owned_by(m.patient.as_ref(), p.id))
                    .cloned()
                    .collect();
                record.medication_schedules = schedules
                    .iter()
                    .filter(|s| owned_by(s.patient.as_ref(), p.id))
                    .cloned()
                    .collect();
                (p.id, Arc::new(record))
            })
            .collect();

        Ok(LoadedContext {
            patients,
            examinations,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const POLICY: &str = r#"{
        "examinations": [{"id": 1, "name": "colonoscopy", "findings": [10, 11]}],
        "findings": [{"id": 10, "name": "polyp"}, {"id": 11, "name": "bleeding"}],
        "finding_classification_choices": [{"id": 3, "name": "paris_0_is"}],
        "lab_values": [{"id": 20, "name": "hb", "default_normal_range": {"min": "12", "max": "16"}}],
        "requirements": [
            {
                "id": 5,
                "name": "polyp present",
                "operators": [{"name": "models_match_all"}],
                "requirement_types": ["patient_examination"],
                "targets": {"findings": [10], "finding_classification_choices": [3]}
            },
            {
                "id": 6,
                "name": "hb low",
                "operators": [{"name": "lab_latest_numeric_decreased"}],
                "targets": {"lab_values": [20]}
            }
        ],
        "requirement_sets": [
            {"id": 1, "name": "root", "type": "any", "requirements": [5], "links_to_sets": [2]},
            {"id": 2, "name": "labs", "requirements": [6]}
        ]
    }"#;

    const CONTEXT: &str = r#"{
        "patients": [{"id": 100, "gender": "female", "birth_date": "1960-02-01"}],
        "patient_examinations": [{
            "id": 1000,
            "patient_id": 100,
            "examination_id": 1,
            "date": "2024-05-01",
            "findings": [{"id": 5000, "finding_id": 10, "classification_choice_ids": [3]}]
        }],
        "patient_lab_values": [
            {"id": 1, "patient_id": 100, "lab_value_id": 20, "value": 11.5, "date": "2024-05-01T08:00:00Z"}
        ]
    }"#;

    #[test]
    fn test_resolve_policy() {
        let loaded = PolicyDocument::from_json(POLICY).unwrap().resolve().unwrap();
        let req = loaded.catalog.requirement(5).unwrap();
        assert_eq!(req.targets.ids(LinkCategory::Findings), vec![10]);
        assert_eq!(req.targets.ids(LinkCategory::FindingClassificationChoices), vec![3]);
        assert_eq!(req.requirement_types[0].name, "patient_examination");

        let root = loaded.catalog.set(1).unwrap();
        assert_eq!(root.effective_type(), crate::RequirementSetType::Any);
        assert_eq!(loaded.catalog.set(2).unwrap().set_type, None);
        assert_eq!(loaded.catalog.reachable_sets(1).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_resolve_context() {
        let policy = PolicyDocument::from_json(POLICY).unwrap().resolve().unwrap();
        let context = ContextDocument::from_json(CONTEXT)
            .unwrap()
            .resolve(&policy.entities)
            .unwrap();

        let exam = context.patient_examination(1000).unwrap();
        assert_eq!(exam.findings.len(), 1);
        // Finding inherits the examination date
        assert_eq!(exam.findings[0].date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(exam.findings[0].patient_examination_id, Some(1000));

        let record = context.patient(100).unwrap();
        assert_eq!(record.examinations.len(), 1);
        assert_eq!(record.lab_values[0].value, Some(Decimal::new(115, 1)));
    }

    #[test]
    fn test_unknown_reference_fails() {
        let json = r#"{"requirements": [{"id": 1, "name": "r", "targets": {"findings": [99]}}]}"#;
        let err = PolicyDocument::from_json(json).unwrap().resolve().unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnknownEntity { category: LinkCategory::Findings, id: 99 }
        ));
    }

    #[test]
    fn test_patient_level_target_rejected() {
        let json = r#"{"requirements": [{"id": 1, "name": "r", "targets": {"patients": [1]}}]}"#;
        let err = PolicyDocument::from_json(json).unwrap().resolve().unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedTarget { requirement: 1, .. }));
    }

    #[test]
    fn test_duplicate_set_rejected() {
        let json = r#"{"requirement_sets": [{"id": 1, "name": "a"}, {"id": 1, "name": "b"}]}"#;
        let err = PolicyDocument::from_json(json).unwrap().resolve().unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Model(ModelError::DuplicateRequirementSet { id: 1 })
        ));
    }

    #[test]
    fn test_load_policy_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(POLICY.as_bytes())
            .unwrap();
        let loaded = load_policy(&path).unwrap();
        assert_eq!(loaded.catalog.sets().count(), 2);

        let yaml = dir.path().join("policy.yaml");
        std::fs::write(&yaml, "{}").unwrap();
        assert!(matches!(
            load_policy(&yaml),
            Err(DocumentError::UnsupportedExtension(_))
        ));
    }
}
