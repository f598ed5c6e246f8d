//! Requirement links: the typed bag of facts a requirement is evaluated on
//!
//! The same structure serves two roles:
//! - the *target* of a requirement (what it asks for)
//! - the *input* aggregated from a context object (what is actually there)
//!
//! Every category is an ordered list without deduplication. Membership and
//! intersection always compare primary keys, never field contents.

use crate::entities::{
    Disease, DiseaseClassificationChoice, Entity, EntityId, Event, Examination,
    ExaminationIndication, ExaminationIndicationClassificationChoice, Finding,
    FindingClassificationChoice, FindingIntervention, LabValue, Medication, MedicationIndication,
    MedicationIntakeTime, MedicationSchedule, Patient, PatientDisease, PatientEvent,
    PatientExamination, PatientFinding, PatientLabValue, PatientMedication,
    PatientMedicationSchedule,
};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Entity category of a `RequirementLinks` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    Examinations,
    ExaminationIndications,
    ExaminationIndicationClassificationChoices,
    PatientExaminations,
    LabValues,
    PatientLabValues,
    Diseases,
    PatientDiseases,
    DiseaseClassificationChoices,
    Events,
    PatientEvents,
    Findings,
    PatientFindings,
    FindingClassificationChoices,
    FindingInterventions,
    Medications,
    MedicationIndications,
    MedicationIntakeTimes,
    MedicationSchedules,
    PatientMedications,
    PatientMedicationSchedules,
    Patients,
}

impl LinkCategory {
    /// All categories in field order
    pub const ALL: [LinkCategory; 22] = [
        Self::Examinations,
        Self::ExaminationIndications,
        Self::ExaminationIndicationClassificationChoices,
        Self::PatientExaminations,
        Self::LabValues,
        Self::PatientLabValues,
        Self::Diseases,
        Self::PatientDiseases,
        Self::DiseaseClassificationChoices,
        Self::Events,
        Self::PatientEvents,
        Self::Findings,
        Self::PatientFindings,
        Self::FindingClassificationChoices,
        Self::FindingInterventions,
        Self::Medications,
        Self::MedicationIndications,
        Self::MedicationIntakeTimes,
        Self::MedicationSchedules,
        Self::PatientMedications,
        Self::PatientMedicationSchedules,
        Self::Patients,
    ];

    /// Priority order used by `RequirementLinks::first_linked_patient`
    pub const OWNER_PRIORITY: [LinkCategory; 7] = [
        Self::PatientExaminations,
        Self::PatientLabValues,
        Self::PatientDiseases,
        Self::PatientEvents,
        Self::PatientFindings,
        Self::PatientMedications,
        Self::PatientMedicationSchedules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Examinations => "examinations",
            Self::ExaminationIndications => "examination_indications",
            Self::ExaminationIndicationClassificationChoices => {
                "examination_indication_classification_choices"
            }
            Self::PatientExaminations => "patient_examinations",
            Self::LabValues => "lab_values",
            Self::PatientLabValues => "patient_lab_values",
            Self::Diseases => "diseases",
            Self::PatientDiseases => "patient_diseases",
            Self::DiseaseClassificationChoices => "disease_classification_choices",
            Self::Events => "events",
            Self::PatientEvents => "patient_events",
            Self::Findings => "findings",
            Self::PatientFindings => "patient_findings",
            Self::FindingClassificationChoices => "finding_classification_choices",
            Self::FindingInterventions => "finding_interventions",
            Self::Medications => "medications",
            Self::MedicationIndications => "medication_indications",
            Self::MedicationIntakeTimes => "medication_intake_times",
            Self::MedicationSchedules => "medication_schedules",
            Self::PatientMedications => "patient_medications",
            Self::PatientMedicationSchedules => "patient_medication_schedules",
            Self::Patients => "patients",
        }
    }
}

impl fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown link category: {s}"))
    }
}

/// Identity and date of a linked item, as seen by timeframe operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedItem {
    pub id: EntityId,
    pub date: Option<NaiveDate>,
    /// Catalog entity the item is an instance of
    pub refers_to: Option<(LinkCategory, EntityId)>,
}

/// Entity types that have a field in `RequirementLinks`
pub trait Linked: Entity + Sized {
    fn push_into(item: Arc<Self>, links: &mut RequirementLinks);
}

macro_rules! requirement_links {
    ($( $field:ident : $ty:ty => $category:ident ),+ $(,)?) => {
        /// Typed bag of entity references, one ordered list per category
        #[derive(Debug, Clone, Default, Serialize)]
        pub struct RequirementLinks {
            $( pub $field: Vec<Arc<$ty>>, )+
        }

        impl RequirementLinks {
            /// Primary keys stored under a category, in insertion order
            pub fn ids(&self, category: LinkCategory) -> Vec<EntityId> {
                match category {
                    $( LinkCategory::$category => self.$field.iter().map(|e| e.id()).collect(), )+
                }
            }

            /// Number of items stored under a category
            pub fn len_of(&self, category: LinkCategory) -> usize {
                match category {
                    $( LinkCategory::$category => self.$field.len(), )+
                }
            }

            /// Items of a category with their dates and catalog references
            pub fn dated_items(&self, category: LinkCategory) -> Vec<DatedItem> {
                match category {
                    $( LinkCategory::$category => self
                        .$field
                        .iter()
                        .map(|e| DatedItem {
                            id: e.id(),
                            date: e.link_date(),
                            refers_to: e.catalog_ref(),
                        })
                        .collect(), )+
                }
            }

            fn owner_in(&self, category: LinkCategory) -> Option<Arc<Patient>> {
                match category {
                    $( LinkCategory::$category => self.$field.iter().find_map(|e| e.owner().cloned()), )+
                }
            }

            fn extend_from(&mut self, other: &RequirementLinks) {
                $( self.$field.extend(other.$field.iter().cloned()); )+
            }
        }

        $(
            impl Linked for $ty {
                fn push_into(item: Arc<Self>, links: &mut RequirementLinks) {
                    links.$field.push(item);
                }
            }
        )+
    };
}

requirement_links! {
    examinations: Examination => Examinations,
    examination_indications: ExaminationIndication => ExaminationIndications,
    examination_indication_classification_choices: ExaminationIndicationClassificationChoice => ExaminationIndicationClassificationChoices,
    patient_examinations: PatientExamination => PatientExaminations,
    lab_values: LabValue => LabValues,
    patient_lab_values: PatientLabValue => PatientLabValues,
    diseases: Disease => Diseases,
    patient_diseases: PatientDisease => PatientDiseases,
    disease_classification_choices: DiseaseClassificationChoice => DiseaseClassificationChoices,
    events: Event => Events,
    patient_events: PatientEvent => PatientEvents,
    findings: Finding => Findings,
    patient_findings: PatientFinding => PatientFindings,
    finding_classification_choices: FindingClassificationChoice => FindingClassificationChoices,
    finding_interventions: FindingIntervention => FindingInterventions,
    medications: Medication => Medications,
    medication_indications: MedicationIndication => MedicationIndications,
    medication_intake_times: MedicationIntakeTime => MedicationIntakeTimes,
    medication_schedules: MedicationSchedule => MedicationSchedules,
    patient_medications: PatientMedication => PatientMedications,
    patient_medication_schedules: PatientMedicationSchedule => PatientMedicationSchedules,
    patients: Patient => Patients,
}

impl RequirementLinks {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a bag
    pub fn builder() -> RequirementLinksBuilder {
        RequirementLinksBuilder::default()
    }

    /// True when no category holds any item
    pub fn is_empty(&self) -> bool {
        LinkCategory::ALL.iter().all(|c| self.len_of(*c) == 0)
    }

    /// Non-empty categories with their primary keys
    pub fn active(&self) -> IndexMap<LinkCategory, Vec<EntityId>> {
        LinkCategory::ALL
            .iter()
            .filter(|c| self.len_of(**c) > 0)
            .map(|c| (*c, self.ids(*c)))
            .collect()
    }

    /// Whether an entity with the given primary key is linked under a category
    pub fn contains(&self, category: LinkCategory, id: EntityId) -> bool {
        self.ids(category).contains(&id)
    }

    /// New bag holding the items of both bags, `self` first
    pub fn merge(&self, other: &RequirementLinks) -> RequirementLinks {
        let mut merged = self.clone();
        merged.extend_from(other);
        merged
    }

    /// First patient reachable through an owner relation
    ///
    /// Directly linked patients win; after that the patient-level categories
    /// are searched in `LinkCategory::OWNER_PRIORITY` order.
    pub fn first_linked_patient(&self) -> Option<Arc<Patient>> {
        self.patients.first().cloned().or_else(|| {
            LinkCategory::OWNER_PRIORITY
                .iter()
                .find_map(|category| self.owner_in(*category))
        })
    }
}

/// Builder for `RequirementLinks`
#[derive(Debug, Clone, Default)]
pub struct RequirementLinksBuilder {
    links: RequirementLinks,
}

impl RequirementLinksBuilder {
    /// Add one entity to its category
    pub fn add<T: Linked>(mut self, item: Arc<T>) -> Self {
        T::push_into(item, &mut self.links);
        self
    }

    /// Add several entities of the same type
    pub fn extend<T: Linked>(mut self, items: impl IntoIterator<Item = Arc<T>>) -> Self {
        for item in items {
            T::push_into(item, &mut self.links);
        }
        self
    }

    /// Add one entity in place
    pub fn push<T: Linked>(&mut self, item: Arc<T>) {
        T::push_into(item, &mut self.links);
    }

    /// Add an optional entity in place
    pub fn push_opt<T: Linked>(&mut self, item: Option<&Arc<T>>) {
        if let Some(item) = item {
            T::push_into(Arc::clone(item), &mut self.links);
        }
    }

    pub fn build(self) -> RequirementLinks {
        self.links
    }
}
