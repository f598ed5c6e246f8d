//! Requirement operator implementations
//!
//! This module contains implementations for all built-in operators organized by category:
//! - Set-membership operators (models_match_any, models_match_all, ...)
//! - Lab value operators (lab_latest_numeric_*, lab_latest_categorical_*)
//! - Timeframe windows shared by both
//! - Set combinators (all, any, none, ...)

pub mod lab_value;
pub mod logical;
pub mod set_match;
pub mod timeframe;

pub use lab_value::{CategoricalCheck, FactorChange, NumericCheck};
pub use logical::combine;
pub use timeframe::Window;

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use reqeval_model::{Requirement, RequirementLinks};
use std::fmt;
use std::str::FromStr;

/// Built-in operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    ModelsMatchAny,
    ModelsMatchAll,
    ModelsMatchAnyInTimeframe,
    LabLatestNumericIncreased,
    LabLatestNumericDecreased,
    LabLatestNumericNormal,
    LabLatestNumericLowerThanValue,
    LabLatestNumericGreaterThanValue,
    LabLatestNumericIncreasedInTimeframe,
    LabLatestNumericDecreasedInTimeframe,
    LabLatestNumericNormalInTimeframe,
    LabLatestNumericLowerThanValueInTimeframe,
    LabLatestNumericGreaterThanValueInTimeframe,
    LabLatestNumericIncreasedFactorInTimeframe,
    LabLatestNumericDecreasedFactorInTimeframe,
    LabLatestCategoricalMatch,
    LabLatestCategoricalMatchSubstring,
    LabLatestCategoricalMatchRegex,
    LabLatestCategoricalMatchInTimeframe,
    LabLatestCategoricalMatchSubstringInTimeframe,
    LabLatestCategoricalMatchRegexInTimeframe,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 21] = [
        Self::ModelsMatchAny,
        Self::ModelsMatchAll,
        Self::ModelsMatchAnyInTimeframe,
        Self::LabLatestNumericIncreased,
        Self::LabLatestNumericDecreased,
        Self::LabLatestNumericNormal,
        Self::LabLatestNumericLowerThanValue,
        Self::LabLatestNumericGreaterThanValue,
        Self::LabLatestNumericIncreasedInTimeframe,
        Self::LabLatestNumericDecreasedInTimeframe,
        Self::LabLatestNumericNormalInTimeframe,
        Self::LabLatestNumericLowerThanValueInTimeframe,
        Self::LabLatestNumericGreaterThanValueInTimeframe,
        Self::LabLatestNumericIncreasedFactorInTimeframe,
        Self::LabLatestNumericDecreasedFactorInTimeframe,
        Self::LabLatestCategoricalMatch,
        Self::LabLatestCategoricalMatchSubstring,
        Self::LabLatestCategoricalMatchRegex,
        Self::LabLatestCategoricalMatchInTimeframe,
        Self::LabLatestCategoricalMatchSubstringInTimeframe,
        Self::LabLatestCategoricalMatchRegexInTimeframe,
    ];

    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModelsMatchAny => "models_match_any",
            Self::ModelsMatchAll => "models_match_all",
            Self::ModelsMatchAnyInTimeframe => "models_match_any_in_timeframe",
            Self::LabLatestNumericIncreased => "lab_latest_numeric_increased",
            Self::LabLatestNumericDecreased => "lab_latest_numeric_decreased",
            Self::LabLatestNumericNormal => "lab_latest_numeric_normal",
            Self::LabLatestNumericLowerThanValue => "lab_latest_numeric_lower_than_value",
            Self::LabLatestNumericGreaterThanValue => "lab_latest_numeric_greater_than_value",
            Self::LabLatestNumericIncreasedInTimeframe => "lab_latest_numeric_increased_in_timeframe",
            Self::LabLatestNumericDecreasedInTimeframe => "lab_latest_numeric_decreased_in_timeframe",
            Self::LabLatestNumericNormalInTimeframe => "lab_latest_numeric_normal_in_timeframe",
            Self::LabLatestNumericLowerThanValueInTimeframe => {
                "lab_latest_numeric_lower_than_value_in_timeframe"
            }
            Self::LabLatestNumericGreaterThanValueInTimeframe => {
                "lab_latest_numeric_greater_than_value_in_timeframe"
            }
            Self::LabLatestNumericIncreasedFactorInTimeframe => {
                "lab_latest_numeric_increased_factor_in_timeframe"
            }
            Self::LabLatestNumericDecreasedFactorInTimeframe => {
                "lab_latest_numeric_decreased_factor_in_timeframe"
            }
            Self::LabLatestCategoricalMatch => "lab_latest_categorical_match",
            Self::LabLatestCategoricalMatchSubstring => "lab_latest_categorical_match_substring",
            Self::LabLatestCategoricalMatchRegex => "lab_latest_categorical_match_regex",
            Self::LabLatestCategoricalMatchInTimeframe => "lab_latest_categorical_match_in_timeframe",
            Self::LabLatestCategoricalMatchSubstringInTimeframe => {
                "lab_latest_categorical_match_substring_in_timeframe"
            }
            Self::LabLatestCategoricalMatchRegexInTimeframe => {
                "lab_latest_categorical_match_regex_in_timeframe"
            }
        }
    }

    /// Whether the operator reads a day window from the requirement
    pub fn uses_timeframe(&self) -> bool {
        self.name().ends_with("_in_timeframe")
    }

    /// Evaluate the operator
    pub fn evaluate(
        &self,
        target: &RequirementLinks,
        input: &RequirementLinks,
        requirement: &Requirement,
        ctx: &EvaluationContext,
    ) -> EvalResult<bool> {
        use OperatorKind as K;

        let window = if self.uses_timeframe() && *self != K::ModelsMatchAnyInTimeframe {
            match Window::from_requirement(requirement, ctx.today()) {
                Some(window) => Some(window),
                None => return Ok(false),
            }
        } else {
            None
        };
        let window = window.as_ref();

        match self {
            K::ModelsMatchAny => Ok(set_match::models_match_any(target, input)),
            K::ModelsMatchAll => Ok(set_match::models_match_all(target, input)),
            K::ModelsMatchAnyInTimeframe => Ok(set_match::models_match_any_in_timeframe(
                target,
                input,
                requirement,
                ctx,
            )),

            K::LabLatestNumericIncreased | K::LabLatestNumericIncreasedInTimeframe => {
                lab_value::latest_numeric(target, input, requirement, NumericCheck::Increased, window)
            }
            K::LabLatestNumericDecreased | K::LabLatestNumericDecreasedInTimeframe => {
                lab_value::latest_numeric(target, input, requirement, NumericCheck::Decreased, window)
            }
            K::LabLatestNumericNormal | K::LabLatestNumericNormalInTimeframe => {
                lab_value::latest_numeric(target, input, requirement, NumericCheck::Normal, window)
            }
            K::LabLatestNumericLowerThanValue | K::LabLatestNumericLowerThanValueInTimeframe => {
                lab_value::latest_numeric(target, input, requirement, NumericCheck::LowerThan, window)
            }
            K::LabLatestNumericGreaterThanValue | K::LabLatestNumericGreaterThanValueInTimeframe => {
                lab_value::latest_numeric(target, input, requirement, NumericCheck::GreaterThan, window)
            }

            K::LabLatestNumericIncreasedFactorInTimeframe
            | K::LabLatestNumericDecreasedFactorInTimeframe => {
                let Some(window) = window else {
                    return Ok(false);
                };
                let change = if *self == K::LabLatestNumericIncreasedFactorInTimeframe {
                    FactorChange::Increased
                } else {
                    FactorChange::Decreased
                };
                lab_value::latest_numeric_factor(target, input, requirement, change, window)
            }

            K::LabLatestCategoricalMatch | K::LabLatestCategoricalMatchInTimeframe => {
                lab_value::latest_categorical(target, input, requirement, CategoricalCheck::Exact, window)
            }
            K::LabLatestCategoricalMatchSubstring | K::LabLatestCategoricalMatchSubstringInTimeframe => {
                lab_value::latest_categorical(
                    target,
                    input,
                    requirement,
                    CategoricalCheck::Substring,
                    window,
                )
            }
            K::LabLatestCategoricalMatchRegex | K::LabLatestCategoricalMatchRegexInTimeframe => {
                lab_value::latest_categorical(target, input, requirement, CategoricalCheck::Regex, window)
            }
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown operator: {s}"))
    }
}
