//! The `trainfeed list` command.

use std::path::Path;

use anyhow::Result;
use chrono::Local;
use comfy_table::{Cell, Table};

use trainfeed_core::statistics::overall_average;

use super::{load_config, open_store};

pub fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    if store.is_empty() {
        println!("No feedback records yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Created",
        "Course",
        "Training date",
        "Location",
        "Instructor",
        "Average",
    ]);

    for record in store.records_newest_first() {
        let meta = record.metadata();
        table.add_row(vec![
            Cell::new(record.id()),
            Cell::new(
                record
                    .created_at()
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M"),
            ),
            Cell::new(&meta.course_name),
            Cell::new(&meta.training_date),
            Cell::new(&meta.location),
            Cell::new(meta.instructor_name.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.2}", overall_average(record.ratings()))),
        ]);
    }

    println!("{table}");
    println!("{} record(s)", store.len());
    Ok(())
}
