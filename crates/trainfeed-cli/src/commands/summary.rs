//! The `trainfeed summary` command.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::{load_config, open_store};

pub fn execute(instructor: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let summary = store.aggregate(instructor);

    match instructor {
        Some(name) => println!("Summary for instructor: {name}"),
        None => println!("Summary for all records"),
    }
    if summary.count == 0 {
        println!("No data: 0 records match.");
    }

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        Cell::new("Records"),
        Cell::new(summary.count.to_string()),
    ]);
    for (label, value) in [
        ("Average", summary.avg),
        ("Highest", summary.max),
        ("Lowest", summary.min),
    ] {
        table.add_row(vec![Cell::new(label), Cell::new(format!("{value:.2}"))]);
    }
    for (category, value) in summary.per_category.iter() {
        table.add_row(vec![
            Cell::new(category.label()),
            Cell::new(format!("{value:.2}")),
        ]);
    }

    println!("{table}");
    Ok(())
}
