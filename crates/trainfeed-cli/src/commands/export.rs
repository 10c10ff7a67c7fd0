//! The `trainfeed export` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;

use trainfeed_core::codec::{export_file_name, to_csv_file_contents, to_json, ExportFormat};

use super::{load_config, open_store};

#[derive(Args)]
pub struct ExportArgs {
    /// Output format: json, csv
    #[arg(long, default_value = "json")]
    format: ExportFormat,

    /// Output directory (default: export_dir from config)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub fn execute(args: ExportArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    if store.is_empty() {
        eprintln!("Warning: no records to export; nothing written.");
        return Ok(());
    }

    let contents = match args.format {
        ExportFormat::Json => to_json(store.records()).context("failed to encode records")?,
        ExportFormat::Csv => to_csv_file_contents(store.records()),
    };

    let dir = args.output.unwrap_or(config.export_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let path = dir.join(export_file_name(args.format, Local::now().date_naive()));
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(format = %args.format, records = store.len(), "exported");
    println!("Exported {} record(s) to {}", store.len(), path.display());
    Ok(())
}
