//! The `trainfeed import` command.

use std::path::Path;

use anyhow::{Context, Result};

use super::{load_config, open_store};

pub fn execute(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut store = open_store(&config)?;
    let summary = store
        .import_json(&text)
        .with_context(|| format!("cannot import {}", file.display()))?;

    println!(
        "Imported {}: {} accepted, {} rejected, {} added, {} duplicate(s)",
        file.display(),
        summary.accepted,
        summary.rejected,
        summary.added,
        summary.duplicates
    );
    if summary.coerced_scores > 0 {
        eprintln!(
            "Warning: {} rating(s) were missing or invalid and set to 3",
            summary.coerced_scores
        );
    }
    if !summary.persisted {
        eprintln!("Warning: local storage failed; imported records were not written to disk");
    }

    Ok(())
}
