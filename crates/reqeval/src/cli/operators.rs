//! Operators command implementation

use super::output::{self, OutputFormat};
use anyhow::Result;
use reqeval_eval::RequirementEngine;
use serde_json::json;
use std::path::Path;

/// Print the operator names registered by default
pub fn list(format: OutputFormat, output_file: Option<&Path>) -> Result<()> {
    let engine = RequirementEngine::new();
    let names = engine.registry().names();

    let content = match format {
        OutputFormat::Json => output::format_json(&json!(names), false)?,
        OutputFormat::JsonPretty => output::format_json(&json!(names), true)?,
        OutputFormat::Tree => names.join("\n"),
    };
    output::write_output(&content, output_file)
}
