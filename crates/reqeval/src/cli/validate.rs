//! Validate command implementation

use super::output;
use anyhow::Result;
use colored::Colorize;
use reqeval_eval::RequirementEngine;
use reqeval_model::{PolicyCatalog, load_policy};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Configuration for validate command
pub struct ValidateConfig {
    pub files: Vec<PathBuf>,
    /// Treat warnings as errors
    pub strict: bool,
    pub verbose: bool,
}

/// Validation result for a single policy file
#[derive(Debug)]
pub struct ValidationResult {
    pub file: PathBuf,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate policy files
pub fn validate(config: ValidateConfig) -> Result<()> {
    if config.files.is_empty() {
        anyhow::bail!("No files specified for validation");
    }

    let engine = RequirementEngine::new();
    let results: Vec<_> = config
        .files
        .iter()
        .map(|file| validate_file(&engine, file, config.verbose))
        .collect();

    for result in &results {
        print_validation_result(result);
    }

    let total_errors: usize = results.iter().map(|r| r.errors.len()).sum();
    let total_warnings: usize = results.iter().map(|r| r.warnings.len()).sum();

    println!();
    if total_errors == 0 && total_warnings == 0 {
        println!(
            "{}",
            output::format_success(&format!(
                "All {} file(s) validated successfully",
                config.files.len()
            ))
        );
        return Ok(());
    }

    let mut summary = Vec::new();
    if total_errors > 0 {
        summary.push(format!("{} error(s)", total_errors).red().to_string());
    }
    if total_warnings > 0 {
        summary.push(format!("{} warning(s)", total_warnings).yellow().to_string());
    }

    if total_errors > 0 || config.strict {
        anyhow::bail!("Validation failed: found {}", summary.join(", "));
    }
    eprintln!("{}", output::format_warning(&format!("Found {}", summary.join(", "))));
    Ok(())
}

/// Validate a single policy file
pub fn validate_file(engine: &RequirementEngine, file: &Path, verbose: bool) -> ValidationResult {
    if verbose {
        eprintln!("Validating: {}", file.display());
    }

    let mut result = ValidationResult {
        file: file.to_path_buf(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let policy = match load_policy(file) {
        Ok(policy) => policy,
        Err(e) => {
            result.errors.push(e.to_string());
            return result;
        }
    };

    if verbose {
        eprintln!(
            "  Loaded {} requirement(s) in {} set(s)",
            policy.catalog.requirements().count(),
            policy.catalog.sets().count()
        );
    }

    if let Err(e) = engine.validate_catalog(&policy.catalog) {
        result.errors.push(e.to_string());
    }
    result.warnings = catalog_warnings(&policy.catalog);
    result
}

/// Suspicious but evaluable catalog shapes
pub fn catalog_warnings(catalog: &PolicyCatalog) -> Vec<String> {
    let mut warnings = Vec::new();

    if catalog.sets().next().is_none() {
        warnings.push("Policy contains no requirement sets".to_string());
    }

    let owned: HashSet<_> = catalog
        .sets()
        .flat_map(|set| set.requirements.iter().copied())
        .collect();
    for requirement in catalog.requirements() {
        if !owned.contains(&requirement.id) {
            warnings.push(format!(
                "Requirement {} ({}) is not part of any set",
                requirement.id, requirement.name
            ));
        }
    }

    for set in catalog.sets() {
        if set.requirements.is_empty() && set.links_to_sets.is_empty() {
            warnings.push(format!(
                "Requirement set {} ({}) has no requirements and no linked sets",
                set.id, set.name
            ));
        }
    }
    warnings
}

/// Print validation result for a file
fn print_validation_result(result: &ValidationResult) {
    println!(
        "{} {}",
        output::format_status(result.success()),
        result.file.display()
    );
    for error in &result.errors {
        println!("    {} {}", "error:".red().bold(), error);
    }
    for warning in &result.warnings {
        println!("    {} {}", "warning:".yellow().bold(), warning);
    }
}
