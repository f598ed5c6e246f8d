//! Test data builders
//!
//! Every date is relative to a fixed reference day so timeframe tests are
//! reproducible.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use reqeval_eval::{EvaluationContext, RequirementEngine};
use reqeval_model::{
    Event, Finding, Gender, LabValue, NormalRange, NormalRangeRule, Patient, PatientEvent,
    PatientFinding, PatientLabValue, Requirement, RequirementLinks, RequirementOperator, Unit,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// Reference date for every test (2024-06-15)
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

pub fn days_ago(n: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(n)).unwrap()
}

/// Timestamp at 09:00 UTC, `n` days before the reference date
pub fn at_days_ago(n: u64) -> DateTime<Utc> {
    let date = days_ago(n);
    Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap())
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn engine() -> RequirementEngine {
    RequirementEngine::new()
}

pub fn ctx() -> EvaluationContext {
    EvaluationContext::builder().today(today()).build()
}

// ============================================================================
// Catalog fixtures
// ============================================================================

pub fn finding(id: i64) -> Arc<Finding> {
    Arc::new(Finding::new(id, format!("finding-{id}")))
}

pub fn event(id: i64) -> Arc<Event> {
    Arc::new(Event::new(id, format!("event-{id}")))
}

/// Hemoglobin, normal 12..=16 g/dl; women 12..=15
pub fn hemoglobin() -> Arc<LabValue> {
    Arc::new(
        LabValue::new(1, "hemoglobin")
            .with_normal_range(NormalRange::between(dec("12"), dec("16")))
            .with_rule(NormalRangeRule {
                gender: Some(Gender::Female),
                min_age: None,
                max_age: None,
                range: NormalRange::between(dec("12"), dec("15")),
            }),
    )
}

/// Creatinine, only an upper bound of 1.2 mg/dl
pub fn creatinine() -> Arc<LabValue> {
    Arc::new(LabValue::new(2, "creatinine").with_normal_range(NormalRange::new(None, Some(dec("1.2")))))
}

/// Blood culture, categorical and without any range
pub fn blood_culture() -> Arc<LabValue> {
    Arc::new(LabValue::new(3, "blood_culture"))
}

// ============================================================================
// Link builders
// ============================================================================

pub fn findings(ids: &[i64]) -> RequirementLinks {
    RequirementLinks::builder()
        .extend(ids.iter().map(|id| finding(*id)))
        .build()
}

pub fn lab_target(lab_values: &[&Arc<LabValue>]) -> RequirementLinks {
    RequirementLinks::builder()
        .extend(lab_values.iter().map(|lv| Arc::clone(*lv)))
        .build()
}

/// Numeric samples as `(days ago, value)`
pub fn numeric_samples(lab_value: &Arc<LabValue>, samples: &[(u64, &str)]) -> Vec<Arc<PatientLabValue>> {
    samples
        .iter()
        .enumerate()
        .map(|(i, (ago, value))| {
            Arc::new(PatientLabValue::numeric(
                lab_value.id * 100 + i as i64,
                Arc::clone(lab_value),
                dec(value),
                at_days_ago(*ago),
            ))
        })
        .collect()
}

/// Categorical samples as `(days ago, value)`
pub fn categorical_samples(lab_value: &Arc<LabValue>, samples: &[(u64, &str)]) -> Vec<Arc<PatientLabValue>> {
    samples
        .iter()
        .enumerate()
        .map(|(i, (ago, value))| {
            Arc::new(PatientLabValue::categorical(
                lab_value.id * 100 + i as i64,
                Arc::clone(lab_value),
                *value,
                at_days_ago(*ago),
            ))
        })
        .collect()
}

pub fn lab_input(samples: Vec<Arc<PatientLabValue>>) -> RequirementLinks {
    RequirementLinks::builder().extend(samples).build()
}

pub fn female() -> Arc<Patient> {
    Arc::new(
        Patient::new(77)
            .with_gender(Gender::Female)
            .with_birth_date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
    )
}

/// Patient finding of a catalog finding, dated `ago` days back
pub fn dated_finding(id: i64, of: &Arc<Finding>, ago: u64) -> Arc<PatientFinding> {
    let mut patient_finding = PatientFinding::new(id, Arc::clone(of));
    patient_finding.date = Some(days_ago(ago));
    Arc::new(patient_finding)
}

pub fn dated_event(id: i64, of: &Arc<Event>, ago: u64) -> Arc<PatientEvent> {
    Arc::new(PatientEvent::new(id, Arc::clone(of), Some(days_ago(ago))))
}

// ============================================================================
// Requirement builders
// ============================================================================

pub fn requirement(id: i64, operator: &str, targets: RequirementLinks) -> Requirement {
    Requirement::new(id, format!("req-{id}"))
        .with_operator(RequirementOperator::new(operator))
        .with_targets(targets)
}

/// Requirement with a `[min, max]` day window
pub fn windowed(id: i64, operator: &str, targets: RequirementLinks, min: i64, max: i64) -> Requirement {
    requirement(id, operator, targets)
        .with_numeric_range(Decimal::from(min), Decimal::from(max))
        .with_unit(Unit::days())
}
