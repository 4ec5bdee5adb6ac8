//! Fraud Dashboard - Main Entry Point
//!
//! Loads the trained model once, then scores an uploaded CSV or writes the
//! sample upload.
//!
//! Usage:
//!   fraud-dashboard score <upload.csv> [scored_output.csv] [report.json]
//!   fraud-dashboard sample [output.csv]

use anyhow::{bail, Context, Result};
use fraud_dashboard::{
    config::{AppConfig, LoggingConfig},
    models::ModelLoader,
    pipeline::ScoringPipeline,
    report::{Dashboard, ScoringReport},
    sample,
    types::RawTable,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for uploads that do not match the model
const EXIT_REJECTED_UPLOAD: u8 = 2;

enum Command {
    Score {
        upload: PathBuf,
        scored_output: Option<PathBuf>,
        report_output: Option<PathBuf>,
    },
    Sample {
        output: PathBuf,
    },
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.get(1).map(String::as_str) {
        Some("score") => {
            let upload = args
                .get(2)
                .map(PathBuf::from)
                .context("usage: fraud-dashboard score <upload.csv> [scored_output.csv] [report.json]")?;
            Ok(Command::Score {
                upload,
                scored_output: args.get(3).map(PathBuf::from),
                report_output: args.get(4).map(PathBuf::from),
            })
        }
        Some("sample") => Ok(Command::Sample {
            output: args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(sample::SAMPLE_FILE_NAME)),
        }),
        Some(other) => bail!("unknown command '{}'; expected 'score' or 'sample'", other),
        None => bail!("usage: fraud-dashboard <score|sample> [args...]"),
    }
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("fraud_dashboard={}", config.level)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;
    info!(model_path = %config.model.path.display(), "Configuration loaded");

    let command = parse_command(&args)?;

    // The model must be available before any upload is accepted
    let loader = ModelLoader::with_threads(config.model.onnx_threads);
    let model = match loader.load(&config.model) {
        Ok(model) => model,
        Err(e) => {
            error!(error = %e, "Model artifact unavailable, refusing to start");
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let drift = sample::schema_drift(model.feature_names());
    if !drift.is_empty() {
        warn!(
            missing_from_sample = ?drift.missing_from_sample,
            unused_by_model = ?drift.unused_by_model,
            "Sample data columns differ from the model schema"
        );
    }

    match command {
        Command::Sample { output } => {
            sample::write_sample(&output)?;
            info!(path = %output.display(), "Sample data written");
            println!("Sample data written to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Score {
            upload,
            scored_output,
            report_output,
        } => {
            let pipeline = ScoringPipeline::from_config(&config.scoring);

            let result = RawTable::from_path(&upload).and_then(|raw| {
                info!(
                    path = %upload.display(),
                    rows = raw.len(),
                    columns = raw.headers().len(),
                    "Data uploaded"
                );
                pipeline.score(&raw, model.as_ref())
            });

            let (table, summary) = match result {
                Ok(scored) => scored,
                Err(e) if e.is_request_error() => {
                    warn!(path = %upload.display(), error = %e, "Upload rejected");
                    eprintln!("{}", e.user_message());
                    return Ok(ExitCode::from(EXIT_REJECTED_UPLOAD));
                }
                Err(e) => return Err(e.into()),
            };

            println!("{}", Dashboard::new(&table, &summary, &config.report).render());

            if let Some(path) = scored_output {
                table.write_csv_path(&path)?;
                info!(path = %path.display(), rows = table.len(), "Scored table written");
            }

            if let Some(path) = report_output {
                let source = upload
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let report = ScoringReport::new(
                    &source,
                    model.name(),
                    &table,
                    summary,
                    config.report.histogram_buckets,
                );
                std::fs::write(&path, report.to_json()?)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                info!(path = %path.display(), report_id = %report.report_id, "Report written");
            }

            Ok(ExitCode::SUCCESS)
        }
    }
}
