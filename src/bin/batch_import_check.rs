//! Batch import checker
//!
//! Parses a file of batch import expressions and prints the run report as
//! JSON. Exits non-zero when any row fails.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use authoring::batch::{BatchImportRow, BatchImportRun};
use authoring::logging::init_tracing;
use authoring::wire::BatchImportReportView;
use authoring::{AuthoringConfig, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "batch-import-check", version, about = "Validate batch import expressions")]
struct Args {
    /// File with one expression per line, optionally `<source_id>\t<expression>`
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "AUTHORING_CONFIG")]
    config: Option<PathBuf>,

    /// Exit successfully even if some rows fail
    #[arg(long)]
    allow_failures: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Reads rows, skipping blank lines and `#` comments. Row numbers are line numbers.
fn read_rows(contents: &str) -> Vec<BatchImportRow> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let row_number = index + 1;
            Some(match line.split_once('\t') {
                Some((source_id, expression)) if !source_id.trim().is_empty() => {
                    BatchImportRow::new(row_number, expression.trim()).with_source_id(source_id.trim())
                }
                Some((_, expression)) => BatchImportRow::new(row_number, expression.trim()),
                None => BatchImportRow::new(row_number, trimmed),
            })
        })
        .collect()
}

/// Loads the configuration for an offline check.
///
/// No concept hierarchy is available offline, so enabling
/// `batch_import.validate_attribute_hierarchy` is a configuration error.
fn load_config(path: Option<&Path>) -> Result<AuthoringConfig, ConfigError> {
    let config = path.map_or_else(|| Ok(AuthoringConfig::default()), AuthoringConfig::load)?;
    if config.batch_import.validate_attribute_hierarchy {
        return Err(ConfigError::Invalid {
            field: "batch_import.validate_attribute_hierarchy".to_string(),
            reason: "batch-import-check has no concept hierarchy to validate against; set it to false".to_string(),
        });
    }
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(&args.log_level) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let contents = match fs::read_to_string(&args.input) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", args.input.display());
            return ExitCode::from(2);
        }
    };

    let rows = read_rows(&contents);
    info!(rows = rows.len(), input = %args.input.display(), "checking batch import file");

    let run = BatchImportRun::new(config.batch_import);
    let report = run.process(rows);
    let view = BatchImportReportView::from(&report);

    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to serialise report: {e}");
            return ExitCode::from(2);
        }
    }

    if view.failed > 0 && !args.allow_failures {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
