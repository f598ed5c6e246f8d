//! Domain entities referenced by requirement links
//!
//! Catalog entities (examinations, findings, lab values, ...) are authored
//! configuration. Patient-level entities are the facts recorded for one
//! patient and point back at the catalog through `Arc` references. Every
//! owner relation is optional so partially loaded graphs stay representable.

use crate::links::LinkCategory;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Primary key of any domain entity
pub type EntityId = i64;

/// Common behaviour of everything that can be linked into `RequirementLinks`
pub trait Entity: std::fmt::Debug + Send + Sync {
    /// Link category this entity is stored under
    const CATEGORY: LinkCategory;

    /// Primary key
    fn id(&self) -> EntityId;

    /// Date used by timeframe operators, if the entity carries one
    fn link_date(&self) -> Option<NaiveDate> {
        None
    }

    /// Catalog entity this patient-level entity is an instance of
    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        None
    }

    /// Owning patient, if the relation is loaded
    fn owner(&self) -> Option<&Arc<Patient>> {
        None
    }
}

macro_rules! catalog_entity {
    ($(#[$meta:meta])* $name:ident => $category:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub id: EntityId,
            pub name: String,
        }

        impl $name {
            pub fn new(id: EntityId, name: impl Into<String>) -> Self {
                Self { id, name: name.into() }
            }
        }

        impl Entity for $name {
            const CATEGORY: LinkCategory = LinkCategory::$category;

            fn id(&self) -> EntityId {
                self.id
            }
        }
    };
}

catalog_entity!(
    /// Classification choice attached to an examination indication
    ExaminationIndicationClassificationChoice => ExaminationIndicationClassificationChoices
);
catalog_entity!(
    /// Disease catalog entry
    Disease => Diseases
);
catalog_entity!(
    /// Clinical event catalog entry (e.g. "stroke")
    Event => Events
);
catalog_entity!(
    /// Finding catalog entry
    Finding => Findings
);
catalog_entity!(
    /// Classification choice for a finding (e.g. "Paris 0-Is")
    FindingClassificationChoice => FindingClassificationChoices
);
catalog_entity!(
    /// Intervention performed on a finding
    FindingIntervention => FindingInterventions
);
catalog_entity!(
    /// Medication catalog entry
    Medication => Medications
);
catalog_entity!(
    /// Indication a medication is prescribed for
    MedicationIndication => MedicationIndications
);

/// Examination type with the findings that can be recorded for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Examination {
    pub id: EntityId,
    pub name: String,
    /// Findings available for this examination type
    #[serde(default)]
    pub findings: Vec<EntityId>,
}

impl Examination {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            findings: Vec::new(),
        }
    }

    pub fn with_findings(mut self, findings: impl IntoIterator<Item = EntityId>) -> Self {
        self.findings = findings.into_iter().collect();
        self
    }
}

impl Entity for Examination {
    const CATEGORY: LinkCategory = LinkCategory::Examinations;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Indication for an examination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminationIndication {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub examination_id: Option<EntityId>,
}

impl ExaminationIndication {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            examination_id: None,
        }
    }
}

impl Entity for ExaminationIndication {
    const CATEGORY: LinkCategory = LinkCategory::ExaminationIndications;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Classification choice of a disease
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseClassificationChoice {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub disease_id: Option<EntityId>,
}

impl DiseaseClassificationChoice {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            disease_id: None,
        }
    }
}

impl Entity for DiseaseClassificationChoice {
    const CATEGORY: LinkCategory = LinkCategory::DiseaseClassificationChoices;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Time of day a medication is taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationIntakeTime {
    pub id: EntityId,
    pub name: String,
    pub time: NaiveTime,
}

impl Entity for MedicationIntakeTime {
    const CATEGORY: LinkCategory = LinkCategory::MedicationIntakeTimes;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Dosing schedule template for a medication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub medication_id: Option<EntityId>,
    #[serde(default)]
    pub intake_time_ids: Vec<EntityId>,
}

impl Entity for MedicationSchedule {
    const CATEGORY: LinkCategory = LinkCategory::MedicationSchedules;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Patient gender as used for normal range selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Inclusive normal range of a numeric lab value
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalRange {
    #[serde(default)]
    pub min: Option<Decimal>,
    #[serde(default)]
    pub max: Option<Decimal>,
}

impl NormalRange {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    pub fn between(min: Decimal, max: Decimal) -> Self {
        Self::new(Some(min), Some(max))
    }

    /// True when neither bound is configured
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Value strictly above the upper bound
    pub fn is_above(&self, value: Decimal) -> bool {
        self.max.is_some_and(|max| value > max)
    }

    /// Value strictly below the lower bound
    pub fn is_below(&self, value: Decimal) -> bool {
        self.min.is_some_and(|min| value < min)
    }

    /// Value within every configured bound; an unbounded range decides nothing
    pub fn contains(&self, value: Decimal) -> bool {
        !self.is_unbounded() && !self.is_above(value) && !self.is_below(value)
    }
}

/// Gender and/or age specific override of a lab value's normal range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalRangeRule {
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub min_age: Option<u32>,
    #[serde(default)]
    pub max_age: Option<u32>,
    pub range: NormalRange,
}

impl NormalRangeRule {
    fn applies_to(&self, age: Option<u32>, gender: Option<Gender>) -> bool {
        if let Some(required) = self.gender {
            if gender != Some(required) {
                return false;
            }
        }
        if self.min_age.is_none() && self.max_age.is_none() {
            return true;
        }
        let Some(age) = age else {
            return false;
        };
        self.min_age.is_none_or(|min| age >= min) && self.max_age.is_none_or(|max| age <= max)
    }
}

/// Laboratory value definition (e.g. "hemoglobin")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabValue {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub default_normal_range: NormalRange,
    /// Checked in declaration order; the first matching rule wins
    #[serde(default)]
    pub normal_range_rules: Vec<NormalRangeRule>,
}

impl LabValue {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            unit: None,
            default_normal_range: NormalRange::default(),
            normal_range_rules: Vec::new(),
        }
    }

    pub fn with_normal_range(mut self, range: NormalRange) -> Self {
        self.default_normal_range = range;
        self
    }

    pub fn with_rule(mut self, rule: NormalRangeRule) -> Self {
        self.normal_range_rules.push(rule);
        self
    }

    /// Resolve the normal range for a patient of the given age and gender
    pub fn normal_range(&self, age: Option<u32>, gender: Option<Gender>) -> NormalRange {
        self.normal_range_rules
            .iter()
            .find(|rule| rule.applies_to(age, gender))
            .map(|rule| rule.range)
            .unwrap_or(self.default_normal_range)
    }
}

impl Entity for LabValue {
    const CATEGORY: LinkCategory = LinkCategory::LabValues;

    fn id(&self) -> EntityId {
        self.id
    }
}

// ============================================================================
// Patient-level entities
// ============================================================================

/// Patient demographics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: EntityId,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl Patient {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            gender: None,
            birth_date: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    /// Age in completed years at the given date
    pub fn age_at(&self, date: NaiveDate) -> Option<u32> {
        self.birth_date.and_then(|born| date.years_since(born))
    }
}

impl Entity for Patient {
    const CATEGORY: LinkCategory = LinkCategory::Patients;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// Finding recorded during a patient examination
#[derive(Debug, Clone, Serialize)]
pub struct PatientFinding {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub patient_examination_id: Option<EntityId>,
    pub finding: Option<Arc<Finding>>,
    pub classification_choices: Vec<Arc<FindingClassificationChoice>>,
    pub interventions: Vec<Arc<FindingIntervention>>,
    pub date: Option<NaiveDate>,
}

impl PatientFinding {
    pub fn new(id: EntityId, finding: Arc<Finding>) -> Self {
        Self {
            id,
            patient: None,
            patient_examination_id: None,
            finding: Some(finding),
            classification_choices: Vec::new(),
            interventions: Vec::new(),
            date: None,
        }
    }
}

impl Entity for PatientFinding {
    const CATEGORY: LinkCategory = LinkCategory::PatientFindings;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        self.finding.as_ref().map(|f| (LinkCategory::Findings, f.id))
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient.as_ref()
    }
}

/// A concrete examination of a patient
#[derive(Debug, Clone, Serialize)]
pub struct PatientExamination {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub examination: Option<Arc<Examination>>,
    pub date: Option<NaiveDate>,
    pub indications: Vec<Arc<ExaminationIndication>>,
    pub indication_choices: Vec<Arc<ExaminationIndicationClassificationChoice>>,
    pub findings: Vec<Arc<PatientFinding>>,
}

impl PatientExamination {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            patient: None,
            examination: None,
            date: None,
            indications: Vec::new(),
            indication_choices: Vec::new(),
            findings: Vec::new(),
        }
    }
}

impl Entity for PatientExamination {
    const CATEGORY: LinkCategory = LinkCategory::PatientExaminations;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        self.examination
            .as_ref()
            .map(|e| (LinkCategory::Examinations, e.id))
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient.as_ref()
    }
}

/// A single measured lab value of a patient
#[derive(Debug, Clone, Serialize)]
pub struct PatientLabValue {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub lab_value: Option<Arc<LabValue>>,
    pub value: Option<Decimal>,
    pub value_str: Option<String>,
    pub date: DateTime<Utc>,
    /// Sample specific range; overrides the lab value's resolved range
    pub normal_range: Option<NormalRange>,
}

impl PatientLabValue {
    pub fn numeric(id: EntityId, lab_value: Arc<LabValue>, value: Decimal, date: DateTime<Utc>) -> Self {
        Self {
            id,
            patient: None,
            lab_value: Some(lab_value),
            value: Some(value),
            value_str: None,
            date,
            normal_range: None,
        }
    }

    pub fn categorical(
        id: EntityId,
        lab_value: Arc<LabValue>,
        value: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient: None,
            lab_value: Some(lab_value),
            value: None,
            value_str: Some(value.into()),
            date,
            normal_range: None,
        }
    }

    pub fn with_patient(mut self, patient: Arc<Patient>) -> Self {
        self.patient = Some(patient);
        self
    }

    pub fn lab_value_id(&self) -> Option<EntityId> {
        self.lab_value.as_ref().map(|lv| lv.id)
    }

    /// Normal range applicable to this sample
    ///
    /// `fallback_patient` is used when the sample has no patient relation.
    pub fn resolve_normal_range(&self, fallback_patient: Option<&Patient>) -> Option<NormalRange> {
        if let Some(range) = self.normal_range {
            return Some(range);
        }
        let lab_value = self.lab_value.as_ref()?;
        let patient = self.patient.as_deref().or(fallback_patient);
        let age = patient.and_then(|p| p.age_at(self.date.date_naive()));
        let gender = patient.and_then(|p| p.gender);
        Some(lab_value.normal_range(age, gender))
    }
}

impl Entity for PatientLabValue {
    const CATEGORY: LinkCategory = LinkCategory::PatientLabValues;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        Some(self.date.date_naive())
    }

    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        self.lab_value_id().map(|id| (LinkCategory::LabValues, id))
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient.as_ref()
    }
}

/// Diagnosed disease of a patient
#[derive(Debug, Clone, Serialize)]
pub struct PatientDisease {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub disease: Option<Arc<Disease>>,
    pub classification_choices: Vec<Arc<DiseaseClassificationChoice>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PatientDisease {
    pub fn new(id: EntityId, disease: Arc<Disease>) -> Self {
        Self {
            id,
            patient: None,
            disease: Some(disease),
            classification_choices: Vec::new(),
            start_date: None,
            end_date: None,
        }
    }
}

impl Entity for PatientDisease {
    const CATEGORY: LinkCategory = LinkCategory::PatientDiseases;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        self.disease.as_ref().map(|d| (LinkCategory::Diseases, d.id))
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient.as_ref()
    }
}

/// Event that happened to a patient
#[derive(Debug, Clone, Serialize)]
pub struct PatientEvent {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub event: Option<Arc<Event>>,
    pub date: Option<NaiveDate>,
}

impl PatientEvent {
    pub fn new(id: EntityId, event: Arc<Event>, date: Option<NaiveDate>) -> Self {
        Self {
            id,
            patient: None,
            event: Some(event),
            date,
        }
    }
}

impl Entity for PatientEvent {
    const CATEGORY: LinkCategory = LinkCategory::PatientEvents;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        self.event.as_ref().map(|e| (LinkCategory::Events, e.id))
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient.as_ref()
    }
}

/// Medication taken by a patient
#[derive(Debug, Clone, Serialize)]
pub struct PatientMedication {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub medication: Option<Arc<Medication>>,
    pub indication: Option<Arc<MedicationIndication>>,
    pub intake_times: Vec<Arc<MedicationIntakeTime>>,
    pub schedule: Option<Arc<MedicationSchedule>>,
    pub start_date: Option<NaiveDate>,
}

impl PatientMedication {
    pub fn new(id: EntityId, medication: Arc<Medication>) -> Self {
        Self {
            id,
            patient: None,
            medication: Some(medication),
            indication: None,
            intake_times: Vec::new(),
            schedule: None,
            start_date: None,
        }
    }
}

impl Entity for PatientMedication {
    const CATEGORY: LinkCategory = LinkCategory::PatientMedications;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn catalog_ref(&self) -> Option<(LinkCategory, EntityId)> {
        self.medication
            .as_ref()
            .map(|m| (LinkCategory::Medications, m.id))
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient.as_ref()
    }
}

/// Group of medications a patient takes on a common schedule
#[derive(Debug, Clone, Serialize)]
pub struct PatientMedicationSchedule {
    pub id: EntityId,
    pub patient: Option<Arc<Patient>>,
    pub medications: Vec<Arc<PatientMedication>>,
    pub start_date: Option<NaiveDate>,
}

impl Entity for PatientMedicationSchedule {
    const CATEGORY: LinkCategory = LinkCategory::PatientMedicationSchedules;

    fn id(&self) -> EntityId {
        self.id
    }

    fn link_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn owner(&self) -> Option<&Arc<Patient>> {
        self.patient
            .as_ref()
            .or_else(|| self.medications.iter().find_map(|m| m.patient.as_ref()))
    }
}

/// A patient together with everything recorded for them
///
/// This is the root object for patient-wide aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct PatientRecord {
    pub patient: Arc<Patient>,
    pub examinations: Vec<Arc<PatientExamination>>,
    pub lab_values: Vec<Arc<PatientLabValue>>,
    pub diseases: Vec<Arc<PatientDisease>>,
    pub events: Vec<Arc<PatientEvent>>,
    pub medications: Vec<Arc<PatientMedication>>,
    pub medication_schedules: Vec<Arc<PatientMedicationSchedule>>,
}

impl PatientRecord {
    pub fn new(patient: Arc<Patient>) -> Self {
        Self {
            patient,
            examinations: Vec::new(),
            lab_values: Vec::new(),
            diseases: Vec::new(),
            events: Vec::new(),
            medications: Vec::new(),
            medication_schedules: Vec::new(),
        }
    }
}

