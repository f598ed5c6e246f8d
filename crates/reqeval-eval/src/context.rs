//! Evaluation context for requirement evaluation

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Per-call evaluation state
///
/// Operators are pure functions of their inputs and this context. `today`
/// anchors every timeframe window.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    today: NaiveDate,
    /// Free-form parameters forwarded to operators
    pub parameters: HashMap<String, Value>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationContext {
    /// Create a context anchored at the current UTC date
    pub fn new() -> Self {
        Self {
            today: Utc::now().date_naive(),
            parameters: HashMap::new(),
        }
    }

    /// Start building a context
    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::default()
    }

    /// Reference date for timeframe operators
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Set a parameter value
    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.insert(name.into(), value);
    }

    /// Get a parameter value
    pub fn get_parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

/// Builder for `EvaluationContext`
#[derive(Debug, Clone, Default)]
pub struct EvaluationContextBuilder {
    today: Option<NaiveDate>,
    parameters: HashMap<String, Value>,
}

impl EvaluationContextBuilder {
    /// Pin the reference date
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn build(self) -> EvaluationContext {
        EvaluationContext {
            today: self.today.unwrap_or_else(|| Utc::now().date_naive()),
            parameters: self.parameters,
        }
    }
}
