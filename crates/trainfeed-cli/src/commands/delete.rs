//! The `trainfeed delete` command.

use std::path::Path;

use anyhow::Result;

use trainfeed_core::RecordId;

use super::{load_config, open_store};

pub fn execute(id: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut store = open_store(&config)?;

    match store.delete(&RecordId::from(id)) {
        Some(deleted) => {
            println!(
                "Deleted record {} ({})",
                deleted.record.id(),
                deleted.record.metadata().course_name
            );
            if !deleted.persisted {
                eprintln!(
                    "Warning: local storage failed; the record will reappear on the next run"
                );
            }
            Ok(())
        }
        None => anyhow::bail!("record not found: {id}"),
    }
}
