//! Link aggregation
//!
//! Builds the input `RequirementLinks` for an evaluation from a root domain
//! object by walking its direct and one-hop relations.

use crate::entities::{
    Disease, Event, Examination, Finding, LabValue, Medication, PatientDisease, PatientEvent,
    PatientExamination, PatientFinding, PatientLabValue, PatientMedication,
    PatientMedicationSchedule, PatientRecord,
};
use crate::links::{RequirementLinks, RequirementLinksBuilder};
use std::sync::Arc;

/// Root object an evaluation runs against
#[derive(Debug, Clone)]
pub enum DomainObject {
    PatientExamination(Arc<PatientExamination>),
    Patient(Arc<PatientRecord>),
    PatientFinding(Arc<PatientFinding>),
    PatientLabValue(Arc<PatientLabValue>),
    PatientDisease(Arc<PatientDisease>),
    PatientEvent(Arc<PatientEvent>),
    PatientMedication(Arc<PatientMedication>),
    PatientMedicationSchedule(Arc<PatientMedicationSchedule>),
    Examination(Arc<Examination>),
    Finding(Arc<Finding>),
    LabValue(Arc<LabValue>),
    Disease(Arc<Disease>),
    Event(Arc<Event>),
    Medication(Arc<Medication>),
}

impl DomainObject {
    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PatientExamination(_) => "PatientExamination",
            Self::Patient(_) => "Patient",
            Self::PatientFinding(_) => "PatientFinding",
            Self::PatientLabValue(_) => "PatientLabValue",
            Self::PatientDisease(_) => "PatientDisease",
            Self::PatientEvent(_) => "PatientEvent",
            Self::PatientMedication(_) => "PatientMedication",
            Self::PatientMedicationSchedule(_) => "PatientMedicationSchedule",
            Self::Examination(_) => "Examination",
            Self::Finding(_) => "Finding",
            Self::LabValue(_) => "LabValue",
            Self::Disease(_) => "Disease",
            Self::Event(_) => "Event",
            Self::Medication(_) => "Medication",
        }
    }
}

/// Aggregation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("Unsupported context type for requirement evaluation: {type_name}")]
    UnsupportedContextType { type_name: &'static str },
}

/// Build the input links for a root object
///
/// Only the categories meaningful for the root type are populated. Unknown
/// root types fail instead of yielding an empty bag.
pub fn aggregate(context: &DomainObject) -> Result<RequirementLinks, AggregateError> {
    let mut builder = RequirementLinks::builder();

    match context {
        DomainObject::PatientExamination(exam) => collect_examination(&mut builder, exam, true),
        DomainObject::Patient(record) => collect_patient(&mut builder, record),
        DomainObject::PatientFinding(finding) => collect_finding(&mut builder, finding, true),
        DomainObject::PatientLabValue(sample) => collect_lab_value(&mut builder, sample, true),
        DomainObject::PatientDisease(disease) => collect_disease(&mut builder, disease, true),
        DomainObject::PatientMedication(medication) => {
            collect_medication(&mut builder, medication, true)
        }
        DomainObject::PatientMedicationSchedule(schedule) => {
            collect_schedule(&mut builder, schedule, true)
        }
        other => {
            return Err(AggregateError::UnsupportedContextType {
                type_name: other.type_name(),
            });
        }
    }

    let links = builder.build();
    log::debug!(
        "aggregated {} link categories from {}",
        links.active().len(),
        context.type_name()
    );
    Ok(links)
}

fn collect_examination(
    builder: &mut RequirementLinksBuilder,
    exam: &Arc<PatientExamination>,
    with_owner: bool,
) {
    builder.push(Arc::clone(exam));
    builder.push_opt(exam.examination.as_ref());
    if with_owner {
        builder.push_opt(exam.patient.as_ref());
    }
    for indication in &exam.indications {
        builder.push(Arc::clone(indication));
    }
    for choice in &exam.indication_choices {
        builder.push(Arc::clone(choice));
    }
    for finding in &exam.findings {
        collect_finding(builder, finding, false);
    }
}

fn collect_finding(builder: &mut RequirementLinksBuilder, finding: &Arc<PatientFinding>, with_owner: bool) {
    builder.push(Arc::clone(finding));
    builder.push_opt(finding.finding.as_ref());
    for choice in &finding.classification_choices {
        builder.push(Arc::clone(choice));
    }
    for intervention in &finding.interventions {
        builder.push(Arc::clone(intervention));
    }
    if with_owner {
        builder.push_opt(finding.patient.as_ref());
    }
}

fn collect_lab_value(builder: &mut RequirementLinksBuilder, sample: &Arc<PatientLabValue>, with_owner: bool) {
    builder.push(Arc::clone(sample));
    builder.push_opt(sample.lab_value.as_ref());
    if with_owner {
        builder.push_opt(sample.patient.as_ref());
    }
}

fn collect_disease(builder: &mut RequirementLinksBuilder, disease: &Arc<PatientDisease>, with_owner: bool) {
    builder.push(Arc::clone(disease));
    builder.push_opt(disease.disease.as_ref());
    for choice in &disease.classification_choices {
        builder.push(Arc::clone(choice));
    }
    if with_owner {
        builder.push_opt(disease.patient.as_ref());
    }
}

fn collect_event(builder: &mut RequirementLinksBuilder, event: &Arc<PatientEvent>) {
    builder.push(Arc::clone(event));
    builder.push_opt(event.event.as_ref());
}

fn collect_medication(
    builder: &mut RequirementLinksBuilder,
    medication: &Arc<PatientMedication>,
    with_owner: bool,
) {
    builder.push(Arc::clone(medication));
    builder.push_opt(medication.medication.as_ref());
    builder.push_opt(medication.indication.as_ref());
    builder.push_opt(medication.schedule.as_ref());
    for intake_time in &medication.intake_times {
        builder.push(Arc::clone(intake_time));
    }
    if with_owner {
        builder.push_opt(medication.patient.as_ref());
    }
}

fn collect_schedule(
    builder: &mut RequirementLinksBuilder,
    schedule: &Arc<PatientMedicationSchedule>,
    with_owner: bool,
) {
    builder.push(Arc::clone(schedule));
    for medication in &schedule.medications {
        collect_medication(builder, medication, false);
    }
    if with_owner {
        builder.push_opt(schedule.patient.as_ref());
    }
}

fn collect_patient(builder: &mut RequirementLinksBuilder, record: &PatientRecord) {
    builder.push(Arc::clone(&record.patient));
    for exam in &record.examinations {
        collect_examination(builder, exam, false);
    }
    for sample in &record.lab_values {
        collect_lab_value(builder, sample, false);
    }
    for disease in &record.diseases {
        collect_disease(builder, disease, false);
    }
    for event in &record.events {
        collect_event(builder, event);
    }
    for medication in &record.medications {
        collect_medication(builder, medication, false);
    }
    for schedule in &record.medication_schedules {
        collect_schedule(builder, schedule, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        FindingClassificationChoice, FindingIntervention, MedicationIndication, Patient,
    };
    use crate::links::LinkCategory;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn examination() -> Arc<PatientExamination> {
        let patient = Arc::new(Patient::new(1));
        let polyp = Arc::new(Finding::new(100, "colon_polyp"));
        let mut finding = PatientFinding::new(1000, polyp);
        finding.classification_choices = vec![Arc::new(FindingClassificationChoice::new(7, "paris_0_is"))];
        finding.interventions = vec![Arc::new(FindingIntervention::new(8, "polypectomy"))];
        finding.patient = Some(Arc::clone(&patient));

        let mut exam = PatientExamination::new(500);
        exam.patient = Some(patient);
        exam.examination = Some(Arc::new(Examination::new(50, "colonoscopy")));
        exam.findings = vec![Arc::new(finding)];
        Arc::new(exam)
    }

    #[test]
    fn test_aggregate_examination() {
        let links = aggregate(&DomainObject::PatientExamination(examination())).unwrap();

        let active: Vec<_> = links.active().into_iter().collect();
        assert_eq!(
            active,
            vec![
                (LinkCategory::Examinations, vec![50]),
                (LinkCategory::PatientExaminations, vec![500]),
                (LinkCategory::Findings, vec![100]),
                (LinkCategory::PatientFindings, vec![1000]),
                (LinkCategory::FindingClassificationChoices, vec![7]),
                (LinkCategory::FindingInterventions, vec![8]),
                (LinkCategory::Patients, vec![1]),
            ]
        );
        assert!(links.medications.is_empty());
    }

    #[test]
    fn test_aggregate_patient_record() {
        let patient = Arc::new(Patient::new(3));
        let mut record = PatientRecord::new(Arc::clone(&patient));
        record.examinations.push(examination());
        record.lab_values.push(Arc::new(PatientLabValue::numeric(
            1,
            Arc::new(LabValue::new(11, "hb")),
            Decimal::new(135, 1),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        )));
        let mut medication = PatientMedication::new(4, Arc::new(Medication::new(40, "apixaban")));
        medication.indication = Some(Arc::new(MedicationIndication::new(41, "af")));
        record.medications.push(Arc::new(medication));

        let links = aggregate(&DomainObject::Patient(Arc::new(record))).unwrap();
        // Only the record's own patient, not the examination's
        assert_eq!(links.ids(LinkCategory::Patients), vec![3]);
        assert_eq!(links.ids(LinkCategory::LabValues), vec![11]);
        assert_eq!(links.ids(LinkCategory::Medications), vec![40]);
        assert_eq!(links.ids(LinkCategory::MedicationIndications), vec![41]);
        assert_eq!(links.ids(LinkCategory::Findings), vec![100]);
    }

    #[test]
    fn test_aggregate_schedule_includes_medications() {
        let schedule = PatientMedicationSchedule {
            id: 9,
            patient: None,
            medications: vec![Arc::new(PatientMedication::new(4, Arc::new(Medication::new(40, "asa"))))],
            start_date: None,
        };
        let links = aggregate(&DomainObject::PatientMedicationSchedule(Arc::new(schedule))).unwrap();
        assert_eq!(links.ids(LinkCategory::PatientMedicationSchedules), vec![9]);
        assert_eq!(links.ids(LinkCategory::PatientMedications), vec![4]);
        assert!(links.patients.is_empty());
    }

    #[test]
    fn test_unsupported_context_type() {
        let err = aggregate(&DomainObject::Finding(Arc::new(Finding::new(1, "x")))).unwrap_err();
        assert_eq!(err, AggregateError::UnsupportedContextType { type_name: "Finding" });

        let event = PatientEvent::new(1, Arc::new(Event::new(2, "stroke")), None);
        assert!(aggregate(&DomainObject::PatientEvent(Arc::new(event))).is_err());
    }
}
