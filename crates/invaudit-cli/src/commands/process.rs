//! Process command - audit a single invoice file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use invaudit_core::models::PageTables;
use invaudit_core::{
    load_page_tables, AutoSkip, DiscoveryChannel, DiscoveryCoordinator, DiscoverySession,
    InvoiceProcessor, InvoiceReport, ValidationStatus,
};

use super::prompt::{can_prompt, TerminalPrompt};
use super::{load_config, open_store, report};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Invoice file (PDF, page text, or page tables JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Pre-detected page tables (JSON) to use instead of table detection
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Parts database (default: from config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Skip unknown parts instead of prompting
    #[arg(long)]
    non_interactive: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let interactive = can_prompt(config.discovery.interactive && !args.non_interactive);
    let mut store = open_store(args.db.as_deref(), &config)?;
    let processor = InvoiceProcessor::new(config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message("Extracting tables...");

    let pages = load_input(&processor, &args.input, args.tables.as_deref())?;

    // Prompts would interleave with the spinner
    pb.finish_and_clear();

    let mut prompt = TerminalPrompt::new();
    let mut auto_skip = AutoSkip;
    let channel: &mut dyn DiscoveryChannel = if interactive {
        &mut prompt
    } else {
        &mut auto_skip
    };
    let mut discovery = DiscoveryCoordinator::new(channel);
    let mut session = DiscoverySession::new();

    let source = display_name(&args.input);
    let report = processor.process_pages(&source, &pages, &mut store, &mut discovery, &mut session)?;

    let output = report::render(&report, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    print_summary(&report);
    if session.added() > 0 {
        eprintln!(
            "{} Added {} new parts to the reference store",
            style("ℹ").blue(),
            session.added()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Load invoice pages, optionally taking the tables from a separate file.
fn load_input(
    processor: &InvoiceProcessor,
    input: &Path,
    tables: Option<&Path>,
) -> anyhow::Result<Vec<PageTables>> {
    let Some(tables_path) = tables else {
        return processor
            .load_pages(input)
            .with_context(|| format!("Failed to read {}", input.display()));
    };

    let mut pages = load_page_tables(tables_path)?;

    // Page text still comes from the invoice for metadata and the fallback
    match processor.load_pages(input) {
        Ok(loaded) => {
            for page in pages.iter_mut().filter(|p| p.text.trim().is_empty()) {
                if let Some(source) = loaded.iter().find(|l| l.number == page.number) {
                    page.text = source.text.clone();
                }
            }
        }
        Err(e) => warn!("Could not read page text from {}: {}", input.display(), e),
    }

    Ok(pages)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_summary(report: &InvoiceReport) {
    eprintln!();
    eprintln!(
        "{} {}: {} lines checked",
        style("✓").green(),
        report.invoice.label(),
        report.results.len()
    );
    eprintln!(
        "   {} passed, {} failed, {} unknown, {} rows excluded",
        style(report.count(ValidationStatus::Passed)).green(),
        style(report.count(ValidationStatus::Failed)).red(),
        style(report.count(ValidationStatus::Unknown)).yellow(),
        report.skipped_rows()
    );
}
