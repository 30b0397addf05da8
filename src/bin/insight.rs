//! Insight CLI - Command-line interface for Synheart Insight
//!
//! Commands:
//! - analyze: Run every analysis stage over an export and print the report
//! - baseline: Compute the rolling baseline of one metric
//! - config: Print the effective configuration as TOML
//! - doctor: Diagnose installation and configuration

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use synheart_insight::baseline::compute_baseline;
use synheart_insight::encoder::{InsightEncoder, INSIGHT_SCHEMA_VERSION};
use synheart_insight::pipeline::{HealthSnapshot, InsightEngine};
use synheart_insight::types::{series, Metric};
use synheart_insight::{
    InsightConfig, InsightError, OuraAdapter, RecordAdapter, INSIGHT_VERSION, PRODUCER_NAME,
};

/// Insight - Personal health analytics over wearable history
#[derive(Parser)]
#[command(name = "insight")]
#[command(author = "Synheart AI Inc")]
#[command(version = INSIGHT_VERSION)]
#[command(about = "Analyze wearable sleep and recovery history", long_about = None)]
struct Cli {
    /// Log filter (e.g. "debug", "synheart_insight=trace"); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and print the insight payload
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "oura")]
        source: Source,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Analyze as of this date (YYYY-MM-DD); defaults to the latest date
        #[arg(long)]
        as_of: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// Compute the baseline of a single metric
    Baseline {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "oura")]
        source: Source,

        /// Metric name (e.g. sleep_score, total_sleep_hours, contributor:sleep_deep_sleep)
        #[arg(short, long)]
        metric: String,

        /// Baseline window in days; defaults to the configured window
        #[arg(long)]
        window: Option<usize>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file to validate and print; defaults are printed without it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Diagnose installation and configuration
    Doctor {
        /// Configuration file to check
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum Source {
    /// Oura v2 export (daily_sleep, daily_readiness, daily_activity, sleep, vo2_max)
    Oura,
    /// Serialized health snapshot (records, sessions, vo2_max)
    Snapshot,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the JSON result
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<(), InsightCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            source,
            config,
            as_of,
            format,
        } => cmd_analyze(&input, source, config.as_deref(), as_of.as_deref(), format),
        Commands::Baseline {
            input,
            source,
            metric,
            window,
            config,
        } => cmd_baseline(&input, source, &metric, window, config.as_deref()),
        Commands::Config { config } => cmd_config(config.as_deref()),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_analyze(
    input: &Path,
    source: Source,
    config: Option<&Path>,
    as_of: Option<&str>,
    format: OutputFormat,
) -> Result<(), InsightCliError> {
    let config = load_config(config)?;
    let snapshot = read_snapshot(input, source)?;
    if snapshot.records.is_empty() && snapshot.sessions.is_empty() {
        return Err(InsightCliError::NoRecords);
    }
    let as_of = as_of.map(parse_date).transpose()?;

    let engine = InsightEngine::new(config)?;
    let report = engine.analyze(&snapshot, as_of)?;
    info!(as_of = %report.as_of, "report ready");

    let encoder = InsightEncoder::new();
    let output = match format {
        OutputFormat::Json => encoder.encode_to_json(&report)?,
        OutputFormat::JsonPretty => encoder.encode_to_json_pretty(&report)?,
    };
    println!("{}", output);
    Ok(())
}

fn cmd_baseline(
    input: &Path,
    source: Source,
    metric: &str,
    window: Option<usize>,
    config: Option<&Path>,
) -> Result<(), InsightCliError> {
    let config = load_config(config)?;
    let metric: Metric = metric.parse()?;
    let window = window.unwrap_or(config.baseline.window_days);
    let snapshot = read_snapshot(input, source)?;

    let values = if metric.is_nightly() {
        let nights = synheart_insight::aggregation::SleepAggregator::aggregate(
            &snapshot.sessions,
            &config.aggregation,
        );
        series(&nights, &metric)
    } else if metric == Metric::Vo2Max {
        snapshot.vo2_max.into_result("vo2_max")?
    } else {
        series(&snapshot.records, &metric)
    };

    let baseline = compute_baseline(&values, &metric, window)?;
    println!("{}", serde_json::to_string_pretty(&baseline)?);
    Ok(())
}

fn cmd_config(config: Option<&Path>) -> Result<(), InsightCliError> {
    let config = load_config(config)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), InsightCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "insight_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Insight version {}", INSIGHT_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Output schema: {}", INSIGHT_SCHEMA_VERSION),
    });

    // Check configuration file if provided
    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("Config file {} does not exist", path.display()),
        }),
        Some(path) => match InsightConfig::load(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (baseline window {} days)",
                    config.baseline.window_days
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    let stdin_message = if atty::is(atty::Stream::Stdin) {
        "stdin is a TTY (pass --input <file>)"
    } else {
        "stdin is a pipe (--input - ready)"
    };
    checks.push(DoctorCheck {
        name: "stdin".to_string(),
        status: CheckStatus::Ok,
        message: stdin_message.to_string(),
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: INSIGHT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Insight Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(InsightCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<InsightConfig, InsightCliError> {
    match path {
        Some(path) => Ok(InsightConfig::load(path)?),
        None => Ok(InsightConfig::default()),
    }
}

fn read_snapshot(input: &Path, source: Source) -> Result<HealthSnapshot, InsightCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let snapshot = match source {
        Source::Oura => OuraAdapter.parse(&input_data)?,
        Source::Snapshot => HealthSnapshot::from_json(&input_data)?,
    };
    Ok(snapshot)
}

fn parse_date(value: &str) -> Result<NaiveDate, InsightCliError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        InsightCliError::Insight(InsightError::DateParseError(format!("{}: {}", value, e)))
    })
}

// Error types

#[derive(Debug)]
enum InsightCliError {
    Io(io::Error),
    Insight(InsightError),
    Json(serde_json::Error),
    NoRecords,
    DoctorFailed,
}

impl From<io::Error> for InsightCliError {
    fn from(e: io::Error) -> Self {
        InsightCliError::Io(e)
    }
}

impl From<InsightError> for InsightCliError {
    fn from(e: InsightError) -> Self {
        InsightCliError::Insight(e)
    }
}

impl From<serde_json::Error> for InsightCliError {
    fn from(e: serde_json::Error) -> Self {
        InsightCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InsightCliError> for CliError {
    fn from(e: InsightCliError) -> Self {
        match e {
            InsightCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InsightCliError::Insight(e) => {
                let hint = match &e {
                    InsightError::ConfigError(_) => "Run 'insight config' to see valid settings",
                    InsightError::JsonError(_) | InsightError::ParseError(_) => {
                        "Check that --source matches the input"
                    }
                    InsightError::DateParseError(_) => "Dates use the YYYY-MM-DD format",
                    InsightError::InsufficientData { .. } => "Provide a longer history",
                    _ => "See the message for details",
                };
                CliError {
                    code: e.code().to_uppercase(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            InsightCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InsightCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No daily records or sleep sessions found in input".to_string(),
                hint: Some("Ensure the export is not empty".to_string()),
            },
            InsightCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
