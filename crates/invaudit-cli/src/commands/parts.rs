//! Parts command - manage the reference store of authorized prices.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use console::style;
use serde::Deserialize;
use tracing::{debug, warn};

use invaudit_core::error::StoreError;
use invaudit_core::invoice::rules::parse_amount;
use invaudit_core::{ChargeType, NewPart, ReferenceStore};

use super::{load_config, open_store};

/// Arguments for the parts command.
#[derive(Args)]
pub struct PartsArgs {
    /// Parts database (default: from config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: PartsCommand,
}

#[derive(Subcommand)]
enum PartsCommand {
    /// List authorized parts
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add one authorized part
    Add(AddArgs),

    /// Import authorized parts from a CSV file
    Import {
        /// CSV with item_code, description, charge_type, authorized_price
        /// and an optional category column
        file: PathBuf,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Item code, including any color suffix
    #[arg(long)]
    item_code: String,

    /// Item description as billed
    #[arg(long)]
    description: String,

    /// Charge type (RENT, LOSS_CHARGE, RUIN_CHARGE, PREP_CHARGE, OTHER)
    #[arg(long, default_value = "RENT")]
    charge_type: String,

    /// Authorized unit price
    #[arg(long)]
    price: String,

    /// Optional category
    #[arg(long)]
    category: Option<String>,
}

/// One row of an import file.
#[derive(Debug, Deserialize)]
struct PartRecord {
    item_code: String,
    description: String,
    charge_type: String,
    authorized_price: String,
    #[serde(default)]
    category: Option<String>,
}

pub fn run(args: PartsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mut store = open_store(args.db.as_deref(), &config)?;

    match args.command {
        PartsCommand::List { json } => list_parts(&store, json),
        PartsCommand::Add(add_args) => add_part(&mut store, add_args),
        PartsCommand::Import { file } => import_parts(&mut store, &file),
    }
}

fn list_parts(store: &dyn ReferenceStore, json: bool) -> anyhow::Result<()> {
    let parts = store.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&parts)?);
        return Ok(());
    }

    if parts.is_empty() {
        println!("{} No parts in the reference store.", style("ℹ").blue());
        return Ok(());
    }

    println!(
        "{:<14} {:<36} {:<12} {:>10}",
        style("ITEM").bold(),
        style("DESCRIPTION").bold(),
        style("TYPE").bold(),
        style("PRICE").bold()
    );
    for part in &parts {
        println!(
            "{:<14} {:<36} {:<12} {:>10}",
            part.item_code,
            part.description,
            part.charge_type.as_str(),
            part.authorized_price
        );
    }
    println!();
    println!("{} parts", parts.len());

    Ok(())
}

fn new_part(
    item_code: &str,
    description: &str,
    charge_type: &str,
    price: &str,
    category: Option<String>,
) -> anyhow::Result<NewPart> {
    let Some(charge_type) = ChargeType::parse(charge_type) else {
        anyhow::bail!("Unrecognized charge type: {}", charge_type);
    };
    let Some(price) = parse_amount(price) else {
        anyhow::bail!("Invalid price: {}", price);
    };
    if price.is_sign_negative() {
        anyhow::bail!("Price cannot be negative: {}", price);
    }
    if item_code.trim().is_empty() || description.trim().is_empty() {
        anyhow::bail!("Item code and description are required");
    }

    let part = NewPart::new(charge_type, description, item_code, price);
    Ok(match category.filter(|c| !c.trim().is_empty()) {
        Some(category) => part.with_category(category),
        None => part,
    })
}

fn add_part(store: &mut dyn ReferenceStore, args: AddArgs) -> anyhow::Result<()> {
    let part = new_part(
        &args.item_code,
        &args.description,
        &args.charge_type,
        &args.price,
        args.category,
    )?;

    let part = store.create(part)?;
    println!(
        "{} Added {} at {}",
        style("✓").green(),
        part.key,
        part.authorized_price
    );

    Ok(())
}

fn import_parts(store: &mut dyn ReferenceStore, file: &Path) -> anyhow::Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;

    let mut added = 0;
    let mut duplicates = 0;

    for (i, record) in reader.deserialize::<PartRecord>().enumerate() {
        // Header is line 1
        let line = i + 2;
        let record = record.with_context(|| format!("{}: line {}", file.display(), line))?;
        let part = new_part(
            &record.item_code,
            &record.description,
            &record.charge_type,
            &record.authorized_price,
            record.category,
        )
        .with_context(|| format!("{}: line {}", file.display(), line))?;

        match store.create(part) {
            Ok(part) => {
                debug!("Imported {}", part.key);
                added += 1;
            }
            Err(StoreError::Duplicate(key)) => {
                warn!("Line {}: part {} already exists", line, key);
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!(
        "{} Imported {} parts ({} already present)",
        style("✓").green(),
        added,
        duplicates
    );

    Ok(())
}
