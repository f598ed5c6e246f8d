//! Requirement sets: combinator nodes of the policy graph

use crate::entities::EntityId;
use crate::error::ModelError;
use crate::requirement::RequirementId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary key of a requirement set
pub type SetId = EntityId;

/// Boolean combinator of a requirement set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementSetType {
    #[default]
    All,
    Any,
    None,
    #[serde(rename = "exactly_1")]
    Exactly1,
    #[serde(rename = "at_least_1")]
    AtLeast1,
    #[serde(rename = "at_most_1")]
    AtMost1,
}

impl RequirementSetType {
    pub const ALL: [RequirementSetType; 6] = [
        Self::All,
        Self::Any,
        Self::None,
        Self::Exactly1,
        Self::AtLeast1,
        Self::AtMost1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
            Self::None => "none",
            Self::Exactly1 => "exactly_1",
            Self::AtLeast1 => "at_least_1",
            Self::AtMost1 => "at_most_1",
        }
    }
}

impl fmt::Display for RequirementSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementSetType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ModelError::InvalidSetType(s.to_string()))
    }
}

/// Where a requirement set comes from (guideline, paper, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationSource {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Named combinator over requirements and linked sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementSet {
    pub id: SetId,
    pub name: String,
    /// Missing combinator evaluates as `all`
    #[serde(default, rename = "type")]
    pub set_type: Option<RequirementSetType>,
    #[serde(default)]
    pub requirements: Vec<RequirementId>,
    /// Edges of the set graph; cycles are allowed
    #[serde(default)]
    pub links_to_sets: Vec<SetId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub information_sources: Vec<InformationSource>,
}

impl RequirementSet {
    pub fn new(id: SetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            set_type: None,
            requirements: Vec::new(),
            links_to_sets: Vec::new(),
            tags: Vec::new(),
            information_sources: Vec::new(),
        }
    }

    pub fn with_type(mut self, set_type: RequirementSetType) -> Self {
        self.set_type = Some(set_type);
        self
    }

    pub fn with_requirements(mut self, requirements: impl IntoIterator<Item = RequirementId>) -> Self {
        self.requirements.extend(requirements);
        self
    }

    pub fn with_links(mut self, sets: impl IntoIterator<Item = SetId>) -> Self {
        self.links_to_sets.extend(sets);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Combinator with the `all` default applied
    pub fn effective_type(&self) -> RequirementSetType {
        self.set_type.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_type_parsing() {
        for t in RequirementSetType::ALL {
            assert_eq!(t.as_str().parse::<RequirementSetType>().unwrap(), t);
        }
        assert!(matches!(
            "most".parse::<RequirementSetType>(),
            Err(ModelError::InvalidSetType(_))
        ));
    }

    #[test]
    fn test_set_type_serde_names() {
        let json = serde_json::to_string(&RequirementSetType::AtLeast1).unwrap();
        assert_eq!(json, "\"at_least_1\"");
        let parsed: RequirementSetType = serde_json::from_str("\"exactly_1\"").unwrap();
        assert_eq!(parsed, RequirementSetType::Exactly1);
    }

    #[test]
    fn test_missing_type_defaults_to_all() {
        let set = RequirementSet::new(1, "s");
        assert_eq!(set.effective_type(), RequirementSetType::All);
    }
}
