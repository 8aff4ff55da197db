//! CLI entry point for the data cleaning pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use scrub_processing::{
    CleaningConfig, CleaningOp, Dataset, FillStrategy, ImportCoordinator, NormalizeMethod,
    OperationOutcome, Pipeline, Value,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// CLI-compatible cleaning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliStep {
    /// Remove exact duplicate rows
    Dedup,
    /// Fill missing values
    FillMissing,
    /// Rescale numeric columns
    Normalize,
    /// Report outliers (read-only)
    DetectOutliers,
}

/// CLI-compatible fill strategy
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFillStrategy {
    /// Mean of the column's numbers
    Mean,
    /// Median of the column's numbers
    Median,
    /// Most frequent value
    Mode,
    /// The literal given with --fill-value
    Constant,
}

/// CLI-compatible normalization method
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNormalizeMethod {
    /// Rescale to [--normalize-min, --normalize-max]
    MinMax,
    /// Subtract the mean, divide by the sample standard deviation
    ZScore,
}

impl From<CliNormalizeMethod> for NormalizeMethod {
    fn from(cli: CliNormalizeMethod) -> Self {
        match cli {
            CliNormalizeMethod::MinMax => NormalizeMethod::MinMax,
            CliNormalizeMethod::ZScore => NormalizeMethod::ZScore,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Tabular data cleaning pipeline",
    long_about = "Runs cleaning operations over a CSV or JSON file and writes the result as CSV.\n\n\
                  EXAMPLES:\n  \
                  # Run every step with defaults\n  \
                  scrub-processing -i data.csv\n\n  \
                  # Only deduplicate and fill with the median\n  \
                  scrub-processing -i data.csv --step dedup --step fill-missing --strategy median\n\n  \
                  # Fill with a constant and print a JSON report\n  \
                  scrub-processing -i data.json --step fill-missing --strategy constant --fill-value 0 --json"
)]
struct Args {
    /// Path to the CSV or JSON file to clean
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the cleaned CSV
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Steps to run, in order (repeatable). Defaults to all steps.
    #[arg(short, long = "step", value_enum)]
    steps: Vec<CliStep>,

    /// Fill strategy for the fill-missing step
    #[arg(long, value_enum, default_value = "mean")]
    strategy: CliFillStrategy,

    /// Value written by the constant fill strategy
    #[arg(long)]
    fill_value: Option<String>,

    /// Normalization method
    #[arg(long, value_enum, default_value = "min-max")]
    method: CliNormalizeMethod,

    /// Outlier threshold in standard deviations
    #[arg(long)]
    threshold: Option<f64>,

    /// Lower bound of the min-max target range
    #[arg(long, default_value = "0.0")]
    normalize_min: f64,

    /// Upper bound of the min-max target range
    #[arg(long, default_value = "1.0")]
    normalize_max: f64,

    /// Emit a progress update every N rows
    #[arg(long, default_value = "1000")]
    progress_interval: usize,

    /// Show the dataset profile without running any step
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Read a command-line literal as a number, boolean or text.
fn parse_literal(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<f64>() {
        return Value::number(n);
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(raw.to_string()),
    }
}

fn fill_strategy(args: &Args) -> Result<FillStrategy> {
    let name = match args.strategy {
        CliFillStrategy::Mean => "mean",
        CliFillStrategy::Median => "median",
        CliFillStrategy::Mode => "mode",
        CliFillStrategy::Constant => "constant",
    };
    let value = args.fill_value.as_deref().map(parse_literal);
    Ok(FillStrategy::parse(name, value)?)
}

fn build_ops(args: &Args) -> Result<Vec<CleaningOp>> {
    let steps = if args.steps.is_empty() {
        vec![
            CliStep::Dedup,
            CliStep::FillMissing,
            CliStep::Normalize,
            CliStep::DetectOutliers,
        ]
    } else {
        args.steps.clone()
    };

    steps
        .into_iter()
        .map(|step| {
            Ok(match step {
                CliStep::Dedup => CleaningOp::RemoveDuplicates,
                CliStep::FillMissing => CleaningOp::FillMissing {
                    strategy: fill_strategy(args)?,
                },
                CliStep::Normalize => CleaningOp::Normalize {
                    method: args.method.into(),
                },
                CliStep::DetectOutliers => CleaningOp::DetectOutliers {
                    threshold: args.threshold,
                },
            })
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = CleaningConfig::builder()
        .normalize_range(args.normalize_min, args.normalize_max)
        .progress_interval(args.progress_interval)
        .build()?;
    let ops = build_ops(&args)?;

    let pipeline = Pipeline::builder().config(config.clone()).build()?;
    let importer = ImportCoordinator::new(
        pipeline.store().clone(),
        pipeline.tracker().clone(),
        config,
    );

    let filename = file_name(&args.input);
    info!("Loading dataset from: {}", args.input.display());
    let content = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let imported = importer.import_file(&filename, &content)?;
    let dataset_id = imported.dataset_id.clone();
    info!(
        "Dataset loaded successfully: ({}, {})",
        imported.rows,
        imported.columns.len()
    );

    if args.dry_run {
        let dataset = pipeline.store().get(&dataset_id)?;
        print_profile(&filename, &dataset);
        return Ok(());
    }

    let mut outcomes: Vec<OperationOutcome<serde_json::Value>> = Vec::with_capacity(ops.len());
    for op in &ops {
        debug!("Running {}", op.kind());
        outcomes.push(op.run(&pipeline, &dataset_id)?);
    }

    if !args.output.exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output.display());
    }
    let output_path = args
        .output
        .join(format!("{}_cleaned.csv", file_stem(&args.input)));
    std::fs::write(&output_path, importer.export_csv(&dataset_id)?)?;
    info!("Dataset saved: {}", output_path.display());

    if args.json {
        let report = serde_json::json!({
            "input": filename,
            "output": output_path.display().to_string(),
            "file_id": dataset_id,
            "operations": outcomes,
            "history": pipeline.tracker().progress(&dataset_id),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let dataset = pipeline.store().get(&dataset_id)?;
        print_summary(&filename, &output_path, &dataset, &outcomes);
    }

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Print column kinds and missing counts.
///
/// Uses `println!` intentionally: this is the output of `--dry-run`, not a log.
fn print_profile(filename: &str, dataset: &Dataset) {
    println!("\n{}", "=".repeat(60));
    println!("DRY RUN - Dataset profile");
    println!("{}\n", "=".repeat(60));
    println!("  File: {}", filename);
    println!("  Rows: {}", dataset.row_count());
    println!("  Columns: {}", dataset.column_count());
    println!();
    println!("{:<24} {:<10} {:<10}", "Column", "Kind", "Missing");
    println!("{}", "-".repeat(46));
    for (idx, name) in dataset.columns.iter().enumerate() {
        println!(
            "{:<24} {:<10} {:<10}",
            truncate_str(name, 23),
            format!("{:?}", dataset.column_kind(idx)).to_lowercase(),
            dataset.missing_count(idx)
        );
    }
}

fn print_summary(
    filename: &str,
    output_path: &Path,
    dataset: &Dataset,
    outcomes: &[OperationOutcome<serde_json::Value>],
) {
    println!("\n{}", "=".repeat(60));
    println!("CLEANING SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  Input:   {}", filename);
    println!("  Output:  {}", output_path.display());
    println!(
        "  Shape:   {} rows x {} columns (version {})",
        dataset.row_count(),
        dataset.column_count(),
        dataset.version
    );
    println!();
    for outcome in outcomes {
        println!(
            "  {:<18} {}",
            outcome.kind.display_name(),
            if outcome.rewritten { "rewritten" } else { "unchanged" }
        );
        println!("    {}", outcome.summary);
    }
    println!("{}", "=".repeat(60));
}
