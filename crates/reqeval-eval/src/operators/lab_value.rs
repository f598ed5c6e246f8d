//! Lab value operators
//!
//! Implements the `lab_latest_*` family. Every operator works on the input's
//! patient lab values restricted to the lab values declared in the target,
//! and every declared lab value has to satisfy the check. The latest value is
//! the sample with the greatest date.

use super::timeframe::Window;
use crate::error::{EvalError, EvalResult};
use reqeval_model::{LabValue, Patient, PatientLabValue, Requirement, RequirementLinks};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Numeric check applied to the latest value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericCheck {
    /// Above the upper normal bound
    Increased,
    /// Below the lower normal bound
    Decreased,
    /// Inside every configured normal bound
    Normal,
    /// Below `numeric_value`
    LowerThan,
    /// Above `numeric_value`
    GreaterThan,
}

/// Direction of a factor change between a reference and the latest value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorChange {
    Increased,
    Decreased,
}

impl FactorChange {
    fn operator_name(self) -> &'static str {
        match self {
            Self::Increased => "lab_latest_numeric_increased_factor_in_timeframe",
            Self::Decreased => "lab_latest_numeric_decreased_factor_in_timeframe",
        }
    }
}

/// String check applied to the latest categorical value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalCheck {
    Exact,
    Substring,
    Regex,
}

fn samples_of<'a>(
    input: &'a RequirementLinks,
    lab_value: &LabValue,
) -> impl Iterator<Item = &'a Arc<PatientLabValue>> {
    let id = lab_value.id;
    input
        .patient_lab_values
        .iter()
        .filter(move |sample| sample.lab_value_id() == Some(id))
}

fn latest<'a>(
    samples: impl Iterator<Item = &'a Arc<PatientLabValue>>,
    window: Option<&Window>,
) -> Option<&'a Arc<PatientLabValue>> {
    samples
        .filter(|sample| window.is_none_or(|w| w.contains(sample.date.date_naive())))
        .max_by_key(|sample| sample.date)
}

/// Latest numeric value against normal range or threshold
///
/// With a window only samples dated inside it are considered.
pub fn latest_numeric(
    target: &RequirementLinks,
    input: &RequirementLinks,
    requirement: &Requirement,
    check: NumericCheck,
    window: Option<&Window>,
) -> EvalResult<bool> {
    if target.lab_values.is_empty() {
        return Ok(false);
    }
    let threshold = requirement.numeric_value;
    if matches!(check, NumericCheck::LowerThan | NumericCheck::GreaterThan) && threshold.is_none() {
        return Ok(false);
    }
    let fallback: Option<Arc<Patient>> = input.first_linked_patient();

    for lab_value in &target.lab_values {
        let Some(sample) = latest(samples_of(input, lab_value), window) else {
            return Ok(false);
        };
        let Some(value) = sample.value else {
            return Ok(false);
        };
        let satisfied = match check {
            NumericCheck::LowerThan => threshold.is_some_and(|t| value < t),
            NumericCheck::GreaterThan => threshold.is_some_and(|t| value > t),
            range_check => {
                let Some(range) = sample.resolve_normal_range(fallback.as_deref()) else {
                    return Ok(false);
                };
                match range_check {
                    NumericCheck::Increased => range.is_above(value),
                    NumericCheck::Decreased => range.is_below(value),
                    _ => range.contains(value),
                }
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Factor change of the latest in-window value against a reference value
///
/// The factor is `numeric_value`; a non-positive factor is an invalid
/// parameter. The reference is
/// the most recent value dated on or before the window start; when nothing
/// precedes the window, the earliest value other than the latest one is
/// used.
pub fn latest_numeric_factor(
    target: &RequirementLinks,
    input: &RequirementLinks,
    requirement: &Requirement,
    change: FactorChange,
    window: &Window,
) -> EvalResult<bool> {
    if target.lab_values.is_empty() {
        return Ok(false);
    }
    let Some(factor) = requirement.numeric_value else {
        return Ok(false);
    };
    if factor <= Decimal::ZERO {
        return Err(EvalError::invalid_parameter(
            change.operator_name(),
            format!("factor must be positive, got {factor}"),
        ));
    }

    for lab_value in &target.lab_values {
        let numeric: Vec<&Arc<PatientLabValue>> = samples_of(input, lab_value)
            .filter(|sample| sample.value.is_some())
            .collect();
        let Some(current) = latest(numeric.iter().copied(), Some(window)) else {
            return Ok(false);
        };
        let current_id = current.id;
        let reference = numeric
            .iter()
            .filter(|sample| sample.id != current_id && sample.date.date_naive() <= window.start)
            .max_by_key(|sample| sample.date)
            .or_else(|| {
                numeric
                    .iter()
                    .filter(|sample| sample.id != current_id)
                    .min_by_key(|sample| sample.date)
            });

        let (Some(latest_value), Some(reference_value)) =
            (current.value, reference.and_then(|r| r.value))
        else {
            return Ok(false);
        };
        let satisfied = match change {
            FactorChange::Increased => reference_value
                .checked_mul(factor)
                .is_some_and(|bound| latest_value > bound),
            FactorChange::Decreased => reference_value
                .checked_div(factor)
                .is_some_and(|bound| latest_value < bound),
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Latest categorical value against the requirement's strings
///
/// Exact and substring checks use `string_value` and `string_values`; the
/// regex check compiles `string_value`. An invalid pattern is an error.
pub fn latest_categorical(
    target: &RequirementLinks,
    input: &RequirementLinks,
    requirement: &Requirement,
    check: CategoricalCheck,
    window: Option<&Window>,
) -> EvalResult<bool> {
    if target.lab_values.is_empty() {
        return Ok(false);
    }
    let candidates = requirement.string_candidates();
    let regex = match (check, requirement.string_value.as_deref()) {
        (CategoricalCheck::Regex, Some(pattern)) => {
            Some(Regex::new(pattern).map_err(|_| EvalError::invalid_regex(pattern))?)
        }
        (CategoricalCheck::Regex, None) => return Ok(false),
        _ if candidates.is_empty() => return Ok(false),
        _ => None,
    };

    for lab_value in &target.lab_values {
        let Some(sample) = latest(samples_of(input, lab_value), window) else {
            return Ok(false);
        };
        let Some(value) = sample.value_str.as_deref() else {
            return Ok(false);
        };
        let satisfied = match (check, &regex) {
            (CategoricalCheck::Regex, Some(regex)) => regex.is_match(value),
            (CategoricalCheck::Substring, _) => candidates.iter().any(|c| value.contains(c)),
            _ => candidates.contains(&value),
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}
