//! cimatrix: an operator CI test matrix kept in one JSON file.
//!
//! Each run of the tool loads the baseline dataset, folds in a freshly fetched
//! batch of CI job runs and writes the merged dataset back out. The dataset
//! maps a platform version (`4.17`) to its bundle results (rolling branch
//! builds), release results (tagged component versions), human notes and job
//! history links.
//!
//! # Pipeline
//!
//! 1. [`crate::core::codec::load`] reads the baseline (missing file = empty dataset).
//! 2. [`crate::engine::classifier::Classifier`] parses each job name into platform
//!    version, family and component version.
//! 3. [`crate::engine::normalizer::normalize`] maps status vocabulary and timestamps
//!    into a [`crate::core::dataset::TestResult`].
//! 4. [`crate::engine::merger::merge_into`] deduplicates by job URL, keeps lists
//!    newest first and applies the retention limit.
//! 5. [`crate::core::codec::save`] writes the result.
//!
//! Bad individual runs are skipped with a warning. A corrupt baseline is fatal.
//!
//! # Examples
//!
//! ```bash
//! cimatrix merge --baseline data.json --merged data.json --runs pr-1234.json --limit 50
//! cimatrix validate --dataset data.json --format json
//! cimatrix classify pull-ci-rh-ecosystem-edge-nvidia-ci-main-4.17-stable-nvidia-network-operator-e2e-24-10-x
//! ```

pub mod core;
pub mod engine;

use crate::core::{
    codec,
    config::{DEFAULT_CONFIG_FILE, MatrixConfig, OperatorProfile, RetentionLimit},
    dataset::Dataset,
    error::MatrixError,
    output, time,
};
use crate::engine::{
    classifier::Classifier,
    ingest::{self, IngestContext, IngestReport},
    merger,
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "cimatrix",
    version = env!("CARGO_PKG_VERSION"),
    about = "Operator CI test matrix reconciler"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ProfileArgs {
    /// Path to the TOML config file.
    #[clap(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Operator preset overriding the config file: 'nno' or 'gpu'.
    #[clap(long)]
    operator: Option<String>,
}

impl ProfileArgs {
    fn resolve(&self) -> Result<MatrixConfig, MatrixError> {
        let mut config = MatrixConfig::load(&self.config)?;
        if let Some(name) = &self.operator {
            config.operator = OperatorProfile::preset(name)?;
        }
        Ok(config)
    }
}

#[derive(clap::Args, Debug)]
struct MergeCli {
    /// Baseline dataset to start from; a missing file counts as empty.
    #[clap(long)]
    baseline: PathBuf,
    /// Where to write the merged dataset (may equal --baseline).
    #[clap(long)]
    merged: PathBuf,
    /// JSON array of fetched job runs. Repeat once per change request.
    #[clap(long = "runs", required = true)]
    runs: Vec<PathBuf>,
    /// Entries kept per version/family list: a number or 'unlimited'.
    #[clap(long)]
    limit: Option<String>,
    #[clap(flatten)]
    profile: ProfileArgs,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    format: String,
}

#[derive(clap::Args, Debug)]
struct ValidateCli {
    /// Dataset file to check.
    #[clap(long)]
    dataset: PathBuf,
    /// Also flag lists longer than this limit.
    #[clap(long)]
    limit: Option<String>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    format: String,
}

#[derive(clap::Args, Debug)]
struct ClassifyCli {
    /// Job names to classify.
    #[clap(required = true)]
    job_names: Vec<String>,
    #[clap(flatten)]
    profile: ProfileArgs,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    format: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge fetched job runs into the baseline dataset.
    Merge(MergeCli),
    /// Check that a dataset file loads and report its contents.
    Validate(ValidateCli),
    /// Show how job names are classified.
    Classify(ClassifyCli),
    /// Print the tool version.
    Version,
}

fn parse_format(raw: &str) -> Result<bool, MatrixError> {
    match raw {
        "json" => Ok(true),
        "text" => Ok(false),
        other => Err(MatrixError::ValidationError(format!(
            "unknown format '{}' (expected text or json)",
            other
        ))),
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), MatrixError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_merge(cli: MergeCli) -> Result<(), MatrixError> {
    let json = parse_format(&cli.format)?;
    let mut config = cli.profile.resolve()?;
    if let Some(raw) = &cli.limit {
        config.retention_limit = RetentionLimit::parse(raw)?;
    }
    let ctx = IngestContext::from_config(&config)?;

    let mut dataset = codec::load(&cli.baseline)?;
    let before = dataset.digest();

    let mut batches = Vec::with_capacity(cli.runs.len());
    for path in &cli.runs {
        batches.push(ingest::load_runs(path)?);
    }
    let report = ingest::ingest_batches(&mut dataset, batches.iter().map(Vec::as_slice), &ctx)?;

    codec::save(&dataset, &cli.merged)?;
    let changed = dataset.digest() != before;

    if json {
        print_json(&time::command_envelope(
            "merge",
            "ok",
            serde_json::json!({
                "operator": config.operator.name,
                "retention_limit": config.retention_limit,
                "received": report.received,
                "merge": report.merge,
                "skipped": report.skipped,
                "changed": changed,
                "versions": dataset.versions(),
                "merged_path": cli.merged.display().to_string(),
            }),
        ))?;
    } else {
        print_merge_text(&config, &report, &dataset, changed);
    }
    Ok(())
}

fn print_merge_text(
    config: &MatrixConfig,
    report: &IngestReport,
    dataset: &Dataset,
    changed: bool,
) {
    println!(
        "{} {} runs received, {} inserted, {} already recorded, {} evicted (limit {})",
        config.operator.display_name.bright_cyan().bold(),
        report.received,
        report.merge.inserted.to_string().bright_green(),
        report.merge.duplicates,
        report.merge.evicted,
        config.retention_limit
    );
    for (version, bucket) in dataset.iter() {
        let latest = bucket
            .bundle_tests
            .first()
            .map(|r| output::status_word(r.status).to_string())
            .unwrap_or_else(|| "-".dimmed().to_string());
        println!(
            "  {:<8} bundle {:>3}  release {:>3}  latest bundle {}",
            version,
            bucket.bundle_tests.len(),
            bucket.release_tests.len(),
            latest
        );
    }
    if report.warning_count() > 0 {
        let reasons: Vec<String> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        println!(
            "{} {} run(s) skipped: {}",
            "⚠".bright_yellow(),
            report.warning_count(),
            output::summarize_reasons(&reasons, 3, 120)
        );
    }
    if !changed {
        println!("{}", "Dataset unchanged".dimmed());
    }
}

fn run_validate(cli: ValidateCli) -> Result<(), MatrixError> {
    let json = parse_format(&cli.format)?;
    let limit = match &cli.limit {
        Some(raw) => RetentionLimit::parse(raw)?,
        None => RetentionLimit::UNLIMITED,
    };
    if !cli.dataset.exists() {
        return Err(MatrixError::ValidationError(format!(
            "dataset not found: {}",
            cli.dataset.display()
        )));
    }
    let dataset = codec::load(&cli.dataset)?;
    let issues = merger::audit(&dataset, limit);
    let status = if issues.is_empty() { "ok" } else { "warn" };

    if json {
        print_json(&time::command_envelope(
            "validate",
            status,
            serde_json::json!({
                "versions": dataset.versions(),
                "results": dataset.result_count(),
                "digest": dataset.digest(),
                "issues": issues,
            }),
        ))?;
    } else {
        println!(
            "{} {} versions, {} results",
            "✓".bright_green(),
            dataset.len(),
            dataset.result_count()
        );
        for issue in &issues {
            println!("  {} {}", "⚠".bright_yellow(), issue);
        }
    }
    Ok(())
}

fn run_classify(cli: ClassifyCli) -> Result<(), MatrixError> {
    let json = parse_format(&cli.format)?;
    let config = cli.profile.resolve()?;
    let classifier = Classifier::new(&config)?;

    let outcomes: Vec<_> = cli
        .job_names
        .iter()
        .map(|name| (name, classifier.classify(name)))
        .collect();

    if json {
        let rows: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|(name, outcome)| match outcome {
                Ok(class) => serde_json::json!({"job_name": name, "classification": class}),
                Err(e) => serde_json::json!({"job_name": name, "error": e.to_string()}),
            })
            .collect();
        print_json(&time::command_envelope(
            "classify",
            "ok",
            serde_json::json!({ "jobs": rows }),
        ))?;
    } else {
        for (name, outcome) in &outcomes {
            match outcome {
                Ok(class) => println!(
                    "{} {} -> {} {} {}",
                    "✓".bright_green(),
                    name,
                    class.platform_version.bright_cyan(),
                    class.family,
                    class.component_version
                ),
                Err(e) => println!("{} {}", "✗".bright_red(), e),
            }
        }
    }
    Ok(())
}

pub fn run() -> Result<(), MatrixError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Merge(merge_cli) => run_merge(merge_cli),
        Command::Validate(validate_cli) => run_validate(validate_cli),
        Command::Classify(classify_cli) => run_classify(classify_cli),
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
