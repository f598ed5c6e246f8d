//! Requirement evaluation command-line interface

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use reqeval::cli::{evaluate, operators, output, validate};
use reqeval::model::{EntityId, SetId};
use std::path::PathBuf;

/// Requirement evaluation tool
#[derive(Parser)]
#[command(name = "reqeval")]
#[command(author, version, about = "Evaluate requirement policies against patient data", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (tree, json, json-pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate requirement sets against a context document
    Evaluate {
        /// Policy file (JSON)
        policy: PathBuf,

        /// Context data file (JSON)
        #[arg(short, long)]
        context: PathBuf,

        /// Patient examination to evaluate
        #[arg(short, long)]
        examination: Option<EntityId>,

        /// Patient to evaluate, when no examination is given
        #[arg(short = 'P', long)]
        patient: Option<EntityId>,

        /// Root requirement set (repeatable; default: all sets)
        #[arg(short, long = "set")]
        sets: Vec<SetId>,

        /// Reference date for timeframes (YYYY-MM-DD; default: today)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Parameters (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Validate policy files
    Validate {
        /// Policy files to validate
        files: Vec<PathBuf>,

        /// Strict mode (warnings as errors)
        #[arg(short, long)]
        strict: bool,
    },

    /// List the registered operators
    Operators,
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let format = output::OutputFormat::parse(cli.format.as_deref().unwrap_or("tree"));

    match cli.command {
        Commands::Evaluate {
            policy,
            context,
            examination,
            patient,
            sets,
            today,
            params,
        } => {
            let config = evaluate::EvaluateConfig {
                policy,
                context,
                examination,
                patient,
                sets,
                today,
                params,
                format,
                output_file: cli.output,
            };
            evaluate::evaluate(config)
        }

        Commands::Validate { files, strict } => {
            let config = validate::ValidateConfig {
                files,
                strict,
                verbose: cli.verbose,
            };
            validate::validate(config)
        }

        Commands::Operators => operators::list(format, cli.output.as_deref()),
    }
}
