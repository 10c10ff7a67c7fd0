//! The `trainfeed instructor` commands.

use std::path::Path;

use anyhow::Result;
use chrono::Local;
use clap::Subcommand;
use comfy_table::{Cell, Table};

use super::{load_config, open_store, Session};

#[derive(Subcommand)]
pub enum InstructorCommand {
    /// Add an instructor to the roster
    Add {
        /// Display name (unique, case-insensitive)
        name: String,
    },

    /// List roster entries with how many records name them
    List,

    /// Remove a roster entry by id; existing records are kept as they are
    Remove {
        /// Roster entry id
        id: String,
    },
}

pub async fn execute(command: InstructorCommand, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    match command {
        InstructorCommand::List => {
            let store = open_store(&config)?;
            if store.roster().is_empty() {
                println!("No instructors yet. Add one with `trainfeed instructor add <name>`.");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "Name", "Added", "Records"]);
            for entry in store.roster().entries() {
                table.add_row(vec![
                    Cell::new(&entry.id),
                    Cell::new(&entry.name),
                    Cell::new(entry.added_at.with_timezone(&Local).format("%Y-%m-%d")),
                    Cell::new(store.instructor_usage(&entry.name)),
                ]);
            }
            println!("{table}");
        }
        InstructorCommand::Add { name } => {
            let mut session = Session::start(&config, None)?;
            let added = session.store.add_instructor(&name)?;
            println!("Added instructor {} ({})", added.entry.name, added.entry.id);
            if !added.persisted {
                eprintln!("Warning: local storage failed; the roster was not written to disk");
            }
            session.finish().await?;
        }
        InstructorCommand::Remove { id } => {
            let mut session = Session::start(&config, None)?;
            let removed = session.store.remove_instructor(&id)?;
            println!("Removed instructor {}", removed.entry.name);
            if removed.usage_count > 0 {
                eprintln!(
                    "Warning: {} existing record(s) still name '{}'",
                    removed.usage_count, removed.entry.name
                );
            }
            if !removed.persisted {
                eprintln!("Warning: local storage failed; the roster was not written to disk");
            }
            session.finish().await?;
        }
    }

    Ok(())
}
