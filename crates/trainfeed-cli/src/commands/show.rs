//! The `trainfeed show` command.

use std::path::Path;

use anyhow::Result;
use chrono::Local;
use comfy_table::{Cell, Table};

use trainfeed_core::statistics::{overall_average, CategoryAverages};
use trainfeed_core::{Category, RecordId};

use super::{load_config, open_store};

pub fn execute(id: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    let Some(record) = store.get(&RecordId::from(id)) else {
        anyhow::bail!("record not found: {id}");
    };

    let meta = record.metadata();
    println!("Record:      {}", record.id());
    println!(
        "Created:     {}",
        record
            .created_at()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    println!("Course:      {}", meta.course_name);
    println!("Date:        {}", meta.training_date);
    println!("Location:    {}", meta.location);
    for (label, value) in [
        ("Batch:      ", &meta.batch),
        ("Department: ", &meta.department),
        ("Instructor: ", &meta.instructor_name),
    ] {
        if let Some(value) = value {
            println!("{label} {value}");
        }
    }

    let averages = CategoryAverages::of(record.ratings());
    let mut table = Table::new();
    table.set_header(vec!["Category", "Scores", "Average"]);
    for category in Category::ALL {
        let scores: Vec<String> = record
            .ratings()
            .scores(category)
            .iter()
            .map(ToString::to_string)
            .collect();
        table.add_row(vec![
            Cell::new(category.label()),
            Cell::new(scores.join(" ")),
            Cell::new(format!("{:.2}", averages.get(category))),
        ]);
    }
    table.add_row(vec![
        Cell::new("Overall"),
        Cell::new(""),
        Cell::new(format!("{:.2}", overall_average(record.ratings()))),
    ]);
    println!("\n{table}");

    let open = record.open_ended();
    for (label, text) in [
        ("Strengths", &open.strengths),
        ("Suggestions", &open.suggestions),
        ("Future topics", &open.future_topics),
    ] {
        if !text.is_empty() {
            println!("\n{label}:\n  {text}");
        }
    }

    Ok(())
}
