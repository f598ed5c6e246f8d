//! Evaluate command implementation

use super::output::{self, OutputFormat};
use crate::policy::evaluate_policy;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use colored::Colorize;
use reqeval_eval::{EvaluationContext, RequirementEngine, SetReport};
use reqeval_model::{ContextDocument, DomainObject, EntityId, LoadedContext, SetId, load_policy};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for evaluate command
pub struct EvaluateConfig {
    pub policy: PathBuf,
    pub context: PathBuf,
    /// Patient examination to evaluate against
    pub examination: Option<EntityId>,
    /// Patient to evaluate against, when no examination is given
    pub patient: Option<EntityId>,
    /// Root sets; every set of the policy when empty
    pub sets: Vec<SetId>,
    pub today: Option<NaiveDate>,
    pub params: Vec<String>,
    pub format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// Evaluate a policy and print the reports
pub fn evaluate(config: EvaluateConfig) -> Result<()> {
    let reports = run(&config)?;

    let content = match config.format {
        OutputFormat::Json => output::format_json(&to_json(&reports)?, false)?,
        OutputFormat::JsonPretty => output::format_json(&to_json(&reports)?, true)?,
        OutputFormat::Tree => render_reports(&reports),
    };
    output::write_output(&content, config.output_file.as_deref())
}

/// Load both documents and evaluate the requested root sets
pub fn run(config: &EvaluateConfig) -> Result<Vec<SetReport>> {
    let policy = load_policy(&config.policy)
        .with_context(|| format!("Failed to load policy: {}", config.policy.display()))?;
    let engine = RequirementEngine::new();
    engine
        .validate_catalog(&policy.catalog)
        .with_context(|| format!("Invalid policy: {}", config.policy.display()))?;
    let context = ContextDocument::from_file(&config.context)
        .and_then(|doc| doc.resolve(&policy.entities))
        .with_context(|| format!("Failed to load context: {}", config.context.display()))?;

    let root = select_root(&context, config.examination, config.patient)?;
    let sets = if config.sets.is_empty() {
        policy.catalog.sets().map(|set| set.id).collect()
    } else {
        config.sets.clone()
    };

    let mut builder = EvaluationContext::builder();
    if let Some(today) = config.today {
        builder = builder.today(today);
    }
    for (name, value) in parse_parameters(&config.params)? {
        builder = builder.parameter(name, value);
    }
    let ctx = builder.build();

    log::info!(
        "evaluating {} set(s) of {} against {}",
        sets.len(),
        config.policy.display(),
        root.type_name()
    );
    Ok(evaluate_policy(&engine, &policy.catalog, &sets, &root, &ctx)?)
}

/// Pick the context root: explicit examination, explicit patient, or the
/// only examination in the document
fn select_root(
    context: &LoadedContext,
    examination: Option<EntityId>,
    patient: Option<EntityId>,
) -> Result<DomainObject> {
    if let Some(id) = examination {
        let exam = context
            .examination(id)
            .with_context(|| format!("Patient examination {id} not found in context"))?;
        return Ok(DomainObject::PatientExamination(Arc::clone(exam)));
    }
    if let Some(id) = patient {
        let record = context
            .record(id)
            .with_context(|| format!("Patient {id} not found in context"))?;
        return Ok(DomainObject::Patient(Arc::clone(record)));
    }

    let mut examinations = context.examinations.values();
    match (examinations.next(), examinations.next()) {
        (Some(exam), None) => Ok(DomainObject::PatientExamination(Arc::clone(exam))),
        (None, _) => anyhow::bail!("Context contains no patient examination; use --patient"),
        (Some(_), Some(_)) => {
            anyhow::bail!("Context contains several patient examinations; use --examination")
        }
    }
}

/// Parse `name=value` parameters
fn parse_parameters(params: &[String]) -> Result<Vec<(String, Value)>> {
    params
        .iter()
        .map(|param| {
            let Some((name, raw)) = param.split_once('=') else {
                anyhow::bail!("Invalid parameter format: '{}'. Expected 'name=value'", param);
            };
            let raw = raw.trim();
            // Anything that is not valid JSON is taken as a plain string
            let value = serde_json::from_str(raw).unwrap_or_else(|_| json!(raw));
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

fn to_json(reports: &[SetReport]) -> Result<Value> {
    serde_json::to_value(reports).context("Failed to serialize reports")
}

/// Render reports as an indented tree
pub fn render_reports(reports: &[SetReport]) -> String {
    let mut out = String::new();
    for report in reports {
        render_set(report, 0, &mut out);
    }
    let failed: usize = reports.iter().map(|r| r.failed_requirements().count()).sum();
    let satisfied = reports.iter().filter(|r| r.satisfied).count();
    let _ = write!(
        out,
        "\n{} of {} root set(s) satisfied, {} failed requirement(s)",
        satisfied,
        reports.len(),
        failed
    );
    out
}

fn render_set(report: &SetReport, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    if report.revisited {
        let _ = writeln!(
            out,
            "{indent}{} {} {}",
            "↺".dimmed(),
            report.name,
            "(already evaluated)".dimmed()
        );
        return;
    }

    let _ = writeln!(
        out,
        "{indent}{} {} [{}]",
        output::format_status(report.satisfied),
        report.name.bold(),
        report.set_type.as_str()
    );
    for requirement in &report.requirements {
        let _ = write!(
            out,
            "{indent}  {} {}",
            output::format_status(requirement.satisfied),
            requirement.name
        );
        if let Some(message) = &requirement.message {
            let _ = write!(out, " {}", message.yellow());
        }
        out.push('\n');
    }
    for child in &report.children {
        render_set(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqeval_eval::RequirementResult;
    use reqeval_model::RequirementSetType;

    #[test]
    fn test_parse_parameters() {
        let params = vec![
            "limit=3".to_string(),
            "mode = strict".to_string(),
            "flags=[1,2]".to_string(),
        ];
        let parsed = parse_parameters(&params).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("limit".to_string(), json!(3)),
                ("mode".to_string(), json!("strict")),
                ("flags".to_string(), json!([1, 2])),
            ]
        );
        assert!(parse_parameters(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_render_tree() {
        colored::control::set_override(false);
        let report = SetReport {
            id: 1,
            name: "root".into(),
            set_type: RequirementSetType::All,
            satisfied: false,
            requirements: vec![RequirementResult {
                id: 5,
                name: "polyp present".into(),
                satisfied: false,
                message: None,
            }],
            children: vec![SetReport::revisited(1, "root", RequirementSetType::All)],
            revisited: false,
        };

        let rendered = render_reports(&[report]);
        assert!(rendered.contains("✗ root [all]"));
        assert!(rendered.contains("  ✗ polyp present"));
        assert!(rendered.contains("↺ root (already evaluated)"));
        assert!(rendered.ends_with("0 of 1 root set(s) satisfied, 1 failed requirement(s)"));
    }
}
