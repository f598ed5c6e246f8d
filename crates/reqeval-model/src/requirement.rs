//! Requirement definitions
//!
//! A requirement is authored configuration: a named condition, the entities
//! it targets and the operators that decide how it is evaluated.

use crate::entities::EntityId;
use crate::links::RequirementLinks;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Primary key of a requirement
pub type RequirementId = EntityId;

/// Physical unit attached to a requirement's numeric parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbreviation: None,
        }
    }

    pub fn days() -> Self {
        Self {
            name: "days".to_string(),
            abbreviation: Some("d".to_string()),
        }
    }

    /// Whether this unit denotes calendar days
    pub fn is_days(&self) -> bool {
        let matches = |s: &str| matches!(s.to_ascii_lowercase().as_str(), "day" | "days" | "d");
        matches(&self.name) || self.abbreviation.as_deref().is_some_and(matches)
    }
}

/// Classifies what a requirement is about (e.g. "patient_examination")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementType {
    pub name: String,
}

impl RequirementType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Named evaluation strategy attached to a requirement
///
/// When `evaluation_function` is set it takes precedence over `name` during
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementOperator {
    pub name: String,
    #[serde(default)]
    pub evaluation_function: Option<String>,
}

impl RequirementOperator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            evaluation_function: None,
        }
    }

    /// Bind this operator to an explicit evaluation function
    pub fn bound_to(mut self, function: impl Into<String>) -> Self {
        self.evaluation_function = Some(function.into());
        self
    }

    /// Name the dispatcher resolves
    pub fn resolved_name(&self) -> &str {
        self.evaluation_function.as_deref().unwrap_or(&self.name)
    }
}

/// A single testable condition
#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub name: String,
    pub description: Option<String>,
    pub numeric_value: Option<Decimal>,
    pub numeric_value_min: Option<Decimal>,
    pub numeric_value_max: Option<Decimal>,
    pub string_value: Option<String>,
    pub string_values: Vec<String>,
    pub unit: Option<Unit>,
    pub requirement_types: SmallVec<[RequirementType; 1]>,
    pub operators: SmallVec<[RequirementOperator; 1]>,
    /// Entities this requirement is about, per category
    pub targets: RequirementLinks,
}

impl Requirement {
    pub fn new(id: RequirementId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            numeric_value: None,
            numeric_value_min: None,
            numeric_value_max: None,
            string_value: None,
            string_values: Vec::new(),
            unit: None,
            requirement_types: SmallVec::new(),
            operators: SmallVec::new(),
            targets: RequirementLinks::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_operator(mut self, operator: RequirementOperator) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn with_type(mut self, requirement_type: RequirementType) -> Self {
        self.requirement_types.push(requirement_type);
        self
    }

    pub fn with_targets(mut self, targets: RequirementLinks) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_numeric_value(mut self, value: Decimal) -> Self {
        self.numeric_value = Some(value);
        self
    }

    pub fn with_numeric_range(mut self, min: Decimal, max: Decimal) -> Self {
        self.numeric_value_min = Some(min);
        self.numeric_value_max = Some(max);
        self
    }

    pub fn with_string_value(mut self, value: impl Into<String>) -> Self {
        self.string_value = Some(value.into());
        self
    }

    pub fn with_string_values(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.string_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Target links built from the declared associations
    pub fn target_links(&self) -> RequirementLinks {
        self.targets.clone()
    }

    /// String candidates for categorical operators: `string_value` first,
    /// then `string_values`
    pub fn string_candidates(&self) -> Vec<&str> {
        self.string_value
            .as_deref()
            .into_iter()
            .chain(self.string_values.iter().map(String::as_str))
            .collect()
    }
}
