//! The `trainfeed submit` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use trainfeed_core::statistics::overall_average;
use trainfeed_core::{Category, FormInput};
use trainfeed_sinks::DirectoryAutoSave;

use super::{load_config, Session};

#[derive(Args)]
pub struct SubmitArgs {
    /// Course name (required)
    #[arg(long, default_value = "")]
    course: String,

    /// Training date, e.g. 2026-03-01
    #[arg(long, default_value = "")]
    date: String,

    /// Training location (required)
    #[arg(long, default_value = "")]
    location: String,

    #[arg(long)]
    batch: Option<String>,

    #[arg(long)]
    department: Option<String>,

    /// Instructor name, preferably one from the roster
    #[arg(long)]
    instructor: Option<String>,

    /// Instructor ratings 1-5, comma-separated (4 items)
    #[arg(long, value_delimiter = ',')]
    instructor_scores: Vec<String>,

    /// Content ratings 1-5, comma-separated (4 items)
    #[arg(long, value_delimiter = ',')]
    content_scores: Vec<String>,

    /// Venue ratings 1-5, comma-separated (3 items)
    #[arg(long, value_delimiter = ',')]
    venue_scores: Vec<String>,

    /// Catering ratings 1-5, comma-separated (3 items)
    #[arg(long, value_delimiter = ',')]
    catering_scores: Vec<String>,

    /// Benefit ratings 1-5, comma-separated (3 items)
    #[arg(long, value_delimiter = ',')]
    benefit_scores: Vec<String>,

    #[arg(long, default_value = "")]
    strengths: String,

    #[arg(long, default_value = "")]
    suggestions: String,

    #[arg(long, default_value = "")]
    future_topics: String,

    /// Also write a CSV snapshot into this directory after saving
    #[arg(long)]
    autosave_dir: Option<PathBuf>,
}

impl SubmitArgs {
    fn into_form(self) -> FormInput {
        let scores = [
            (Category::Instructor, self.instructor_scores),
            (Category::Content, self.content_scores),
            (Category::Venue, self.venue_scores),
            (Category::Catering, self.catering_scores),
            (Category::Benefit, self.benefit_scores),
        ];
        let form = FormInput {
            course_name: self.course,
            training_date: self.date,
            location: self.location,
            batch: self.batch.unwrap_or_default(),
            department: self.department.unwrap_or_default(),
            instructor_name: self.instructor.unwrap_or_default(),
            strengths: self.strengths,
            suggestions: self.suggestions,
            future_topics: self.future_topics,
            ..Default::default()
        };
        scores
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .fold(form, |form, (category, values)| {
                form.with_scores(category, values)
            })
    }
}

pub async fn execute(args: SubmitArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    // the grant lasts for this process only
    let autosave = match &args.autosave_dir {
        Some(dir) => match DirectoryAutoSave::armed(dir) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                eprintln!("Warning: auto-save not enabled: {e}");
                None
            }
        },
        None => None,
    };

    let mut form = args.into_form();
    let mut session = Session::start(&config, autosave)?;

    if !form.instructor_name.trim().is_empty() {
        match session.store.roster().find_by_name(&form.instructor_name) {
            Some(entry) => form.instructor_name = entry.name.clone(),
            None => eprintln!(
                "Warning: instructor '{}' is not in the roster",
                form.instructor_name.trim()
            ),
        }
    }

    let outcome = session.store.submit(&form)?;
    println!(
        "Saved record {} (average {:.2})",
        outcome.record.id(),
        overall_average(outcome.record.ratings())
    );
    if !outcome.persisted {
        eprintln!("Warning: local storage failed; the record was not written to disk");
    }

    session.finish().await?;
    Ok(())
}
