//! Batch processing command for multiple invoice files.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use invaudit_core::{
    AuditError, AutoSkip, DiscoveryChannel, DiscoveryCoordinator, DiscoverySession,
    InvoiceProcessor, InvoiceReport, ValidationStatus,
};

use super::process::OutputFormat;
use super::prompt::{can_prompt, TerminalPrompt};
use super::report::{self, SummaryRow};
use super::{load_config, open_store};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Continue with the next invoice when one fails
    #[arg(long)]
    continue_on_error: bool,

    /// Prompt for unknown parts instead of skipping them
    #[arg(long)]
    interactive: bool,

    /// Parts database (default: from config)
    #[arg(long)]
    db: Option<PathBuf>,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    report: Option<InvoiceReport>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "txt" | "json")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let mut store = open_store(args.db.as_deref(), &config)?;
    let processor = InvoiceProcessor::new(config);

    let interactive = can_prompt(args.interactive);
    let mut prompt = TerminalPrompt::new();
    let mut auto_skip = AutoSkip;
    let channel: &mut dyn DiscoveryChannel = if interactive {
        &mut prompt
    } else {
        &mut auto_skip
    };
    let mut discovery = DiscoveryCoordinator::new(channel);
    let mut session = DiscoverySession::new();

    let overall_pb = if interactive {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(files.len() as u64)
    };
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    let mut halted: Option<AuditError> = None;

    for path in files {
        let file_start = Instant::now();
        let result = processor.process_file(&path, &mut store, &mut discovery, &mut session);
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(report) => {
                results.push(ProcessResult {
                    path,
                    report: Some(report),
                    error: None,
                    processing_time_ms,
                });
            }
            Err(e) if e.halts_run() => {
                error!("Run halted at {}: {}", path.display(), e);
                halted = Some(e);
                break;
            }
            Err(e) => {
                let error_msg = e.to_string();
                if !args.continue_on_error {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    halted = Some(e);
                    break;
                }
                warn!("Failed to process {}: {}", path.display(), error_msg);
                results.push(ProcessResult {
                    path,
                    report: None,
                    error: Some(error_msg),
                    processing_time_ms,
                });
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_and_clear();

    // Reports of invoices finished before a halt are still written
    write_outputs(&args, &results)?;

    let successful = results.iter().filter(|r| r.report.is_some()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    let failed_lines: usize = results
        .iter()
        .filter_map(|r| r.report.as_ref())
        .map(|r| r.count(ValidationStatus::Failed))
        .sum();

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed, {} price mismatches, {} parts added",
        style(successful).green(),
        style(failed.len()).red(),
        style(failed_lines).yellow(),
        session.added()
    );

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for result in &failed {
            eprintln!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(e) = halted {
        anyhow::bail!("Processing stopped: {}", e);
    }

    Ok(())
}

fn write_outputs(args: &BatchArgs, results: &[ProcessResult]) -> anyhow::Result<()> {
    for result in results {
        let Some(report) = &result.report else {
            continue;
        };

        let content = report::render(report, args.format)?;
        match &args.output_dir {
            Some(output_dir) => {
                let output_name = result
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("invoice");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));
                fs::write(&output_path, content)?;
                debug!("Wrote output to {}", output_path.display());
            }
            None => {
                println!("{}", content);
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        let rows: Vec<SummaryRow<'_>> = results
            .iter()
            .map(|r| SummaryRow {
                path: &r.path,
                report: r.report.as_ref(),
                error: r.error.as_deref(),
                processing_time_ms: r.processing_time_ms,
            })
            .collect();

        report::write_summary(&summary_path, &rows)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    Ok(())
}
