//! JSON/CSV export and JSON import.
//!
//! Import is the only place untyped data enters the model: every element of
//! an imported array is read as a [`RawRecord`] and normalized into a
//! [`FeedbackRecord`] or counted as rejected.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ImportError;
use crate::model::{
    non_blank, Category, FeedbackRecord, Metadata, OpenEnded, Ratings, RecordId, Score,
};
use crate::statistics::overall_average;

/// Byte-order mark prepended to CSV files so spreadsheets detect UTF-8.
pub const UTF8_BOM: char = '\u{feff}';

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// File formats for bulk export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// `feedback-data-<YYYY-MM-DD>.<ext>`
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "feedback-data-{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Pretty-printed JSON array of the full records.
pub fn to_json(records: &[FeedbackRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Column names, in output order.
pub fn csv_header() -> Vec<String> {
    let mut header: Vec<String> = [
        "created_at",
        "course_name",
        "training_date",
        "location",
        "batch",
        "department",
        "instructor_name",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    for category in Category::ALL {
        for i in 1..=category.arity() {
            header.push(format!("{}_{i}", category.key()));
        }
    }

    header.extend(
        ["average", "strengths", "suggestions", "future_topics"]
            .into_iter()
            .map(String::from),
    );
    header
}

/// Header plus one row per record, `\n`-separated, without a BOM.
pub fn to_csv(records: &[FeedbackRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(join_row(csv_header().iter().map(String::as_str)));

    for record in records {
        let meta = record.metadata();
        let open = record.open_ended();
        let created = record
            .created_at()
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let scores: Vec<String> = record.ratings().iter().map(|s| s.to_string()).collect();
        let average = format!("{:.2}", overall_average(record.ratings()));

        let mut row: Vec<&str> = vec![
            created.as_str(),
            meta.course_name.as_str(),
            meta.training_date.as_str(),
            meta.location.as_str(),
            meta.batch.as_deref().unwrap_or_default(),
            meta.department.as_deref().unwrap_or_default(),
            meta.instructor_name.as_deref().unwrap_or_default(),
        ];
        row.extend(scores.iter().map(String::as_str));
        row.push(&average);
        row.push(&open.strengths);
        row.push(&open.suggestions);
        row.push(&open.future_topics);

        lines.push(join_row(row));
    }

    lines.join("\n")
}

/// CSV text as written to a file: BOM followed by [`to_csv`].
pub fn to_csv_file_contents(records: &[FeedbackRecord]) -> String {
    let mut out = String::from(UTF8_BOM);
    out.push_str(&to_csv(records));
    out
}

/// Quote a field if it contains a delimiter, quote or line break, or if it
/// starts with a character a spreadsheet would treat as a formula.
pub fn escape_csv_field(field: &str) -> Cow<'_, str> {
    let has_special = field.contains([',', '"', '\n', '\r']);
    let formula_like = field.starts_with(['=', '+', '-', '@']);
    if has_special || formula_like {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn join_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(escape_csv_field)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// One element of an import array, before normalization.
///
/// Every field is optional and loosely typed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRecord {
    pub id: Option<Value>,
    pub created_at: Option<Value>,
    pub metadata: Option<RawMetadata>,
    pub ratings: Option<Value>,
    pub open_ended: Option<RawOpenEnded>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMetadata {
    pub course_name: Option<Value>,
    pub training_date: Option<Value>,
    pub location: Option<Value>,
    pub batch: Option<Value>,
    pub department: Option<Value>,
    pub instructor_name: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOpenEnded {
    pub strengths: Option<Value>,
    pub suggestions: Option<Value>,
    pub future_topics: Option<Value>,
}

/// Result of normalizing one [`RawRecord`].
#[derive(Debug)]
pub enum Normalized {
    Accepted {
        record: FeedbackRecord,
        /// Rating slots that were missing or invalid and set to neutral.
        coerced: usize,
    },
    Rejected {
        reason: String,
    },
}

impl RawRecord {
    /// Coerce into a well-formed record. `now` stands in for a missing or
    /// unreadable creation time.
    pub fn normalize(self, now: DateTime<Utc>) -> Normalized {
        let meta = self.metadata.unwrap_or_default();
        let course_name = text(meta.course_name.as_ref()).unwrap_or_default();
        let location = text(meta.location.as_ref()).unwrap_or_default();
        if course_name.is_empty() && location.is_empty() {
            return Normalized::Rejected {
                reason: "missing both courseName and location".into(),
            };
        }

        let id = match self.id.as_ref().and_then(|v| text(Some(v))) {
            Some(id) => RecordId::from(id),
            None => RecordId::generate(),
        };

        let created_at = self
            .created_at
            .as_ref()
            .and_then(timestamp_from_json)
            .unwrap_or(now);

        let ratings_value = self.ratings.as_ref();
        let mut coerced = 0usize;
        let ratings = Ratings::from_fn(|category, index| {
            ratings_value
                .and_then(|r| r.get(category.key()))
                .and_then(Value::as_array)
                .and_then(|items| items.get(index))
                .and_then(score_from_json)
                .unwrap_or_else(|| {
                    coerced += 1;
                    Score::NEUTRAL
                })
        });

        let open = self.open_ended.unwrap_or_default();
        let record = FeedbackRecord {
            id,
            created_at,
            metadata: Metadata {
                course_name,
                training_date: text(meta.training_date.as_ref()).unwrap_or_default(),
                location,
                batch: text(meta.batch.as_ref()),
                department: text(meta.department.as_ref()),
                instructor_name: text(meta.instructor_name.as_ref()),
            },
            ratings,
            open_ended: OpenEnded {
                strengths: free_text(open.strengths.as_ref()),
                suggestions: free_text(open.suggestions.as_ref()),
                future_topics: free_text(open.future_topics.as_ref()),
            },
        };

        Normalized::Accepted { record, coerced }
    }
}

/// Outcome of [`parse_import`].
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub accepted: Vec<FeedbackRecord>,
    pub rejected_count: usize,
    /// Total rating slots defaulted to neutral across accepted records.
    pub coerced_scores: usize,
}

/// Parse an import file. Only a non-JSON or non-array document fails; bad
/// elements are counted in `rejected_count`.
pub fn parse_import(text: &str) -> Result<ImportOutcome, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ImportError::NotAnArray {
                found: json_kind(&other),
            })
        }
    };

    let now = Utc::now();
    let mut outcome = ImportOutcome::default();

    for (index, item) in items.into_iter().enumerate() {
        let normalized = match serde_json::from_value::<RawRecord>(item) {
            Ok(raw) => raw.normalize(now),
            Err(e) => Normalized::Rejected {
                reason: e.to_string(),
            },
        };
        match normalized {
            Normalized::Accepted { record, coerced } => {
                if coerced > 0 {
                    tracing::warn!(
                        index,
                        record = %record.id(),
                        coerced,
                        "imported ratings defaulted to {}",
                        Score::NEUTRAL
                    );
                }
                outcome.coerced_scores += coerced;
                outcome.accepted.push(record);
            }
            Normalized::Rejected { reason } => {
                tracing::warn!(index, "rejected import element: {reason}");
                outcome.rejected_count += 1;
            }
        }
    }

    Ok(outcome)
}

/// Outcome of [`merge`].
#[derive(Debug)]
pub struct MergeOutcome {
    pub merged: Vec<FeedbackRecord>,
    pub added: usize,
    pub duplicates: usize,
}

/// Append `incoming` records whose id is not already present.
///
/// Existing records keep their order and are never replaced. An id that
/// repeats inside `incoming` is added once.
pub fn merge(existing: &[FeedbackRecord], incoming: Vec<FeedbackRecord>) -> MergeOutcome {
    let mut seen: HashSet<RecordId> = existing.iter().map(|r| r.id().clone()).collect();
    let mut merged = existing.to_vec();
    let mut added = 0usize;
    let mut duplicates = 0usize;

    for record in incoming {
        if seen.insert(record.id().clone()) {
            merged.push(record);
            added += 1;
        } else {
            duplicates += 1;
        }
    }

    MergeOutcome {
        merged,
        added,
        duplicates,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Trimmed, non-empty text; numbers are accepted as their decimal form.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Open-ended answers keep their whitespace; anything but a string is empty.
fn free_text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn score_from_json(value: &Value) -> Option<Score> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .and_then(Score::from_integer),
        Value::String(s) => Score::parse_form(s),
        _ => None,
    }
}

fn timestamp_from_json(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{create_record, FormInput};

    fn form_record(course: &str, location: &str, score: &str) -> FeedbackRecord {
        let mut input = FormInput {
            course_name: course.into(),
            training_date: "2026-10-01".into(),
            location: location.into(),
            ..Default::default()
        };
        for c in Category::ALL {
            input = input.with_scores(c, vec![score; c.arity()]);
        }
        create_record(&input).unwrap()
    }

    /// Minimal RFC 4180 reader used to check that exported cells re-parse.
    fn read_csv(text: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if in_quotes {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        field.push('"');
                        chars.next();
                    }
                    '"' => in_quotes = false,
                    other => field.push(other),
                }
            } else {
                match c {
                    '"' => in_quotes = true,
                    ',' => row.push(std::mem::take(&mut field)),
                    '\n' => {
                        row.push(std::mem::take(&mut field));
                        rows.push(std::mem::take(&mut row));
                    }
                    other => field.push(other),
                }
            }
        }
        row.push(field);
        rows.push(row);
        rows
    }

    #[test]
    fn header_has_fixed_layout() {
        let header = csv_header();
        assert_eq!(header.len(), 7 + 17 + 1 + 3);
        assert_eq!(header[7], "instructor_1");
        assert_eq!(header[11], "content_1");
        assert_eq!(header[23], "benefit_3");
        assert_eq!(header[24], "average");
        assert_eq!(header[27], "future_topics");
    }

    #[test]
    fn escape_plain_field_is_borrowed() {
        assert!(matches!(escape_csv_field("Room A"), Cow::Borrowed("Room A")));
    }

    #[test]
    fn escape_quotes_special_characters() {
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_csv_field("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn escape_guards_formula_prefixes() {
        for field in ["=SUM(A1)", "+1", "-2", "@cmd"] {
            let escaped = escape_csv_field(field);
            assert!(escaped.starts_with('"'), "{field} should be quoted");
        }
    }

    #[test]
    fn csv_cell_with_comma_quote_newline_reparses() {
        let tricky = "Good, \"very\" good\nsecond line";
        let mut record = form_record("Course", "Hall", "4");
        record.open_ended.strengths = tricky.to_string();

        let csv = to_csv(&[record]);
        let rows = read_csv(&csv);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), csv_header().len());
        assert_eq!(rows[1][25], tricky);
    }

    #[test]
    fn csv_row_contains_average_with_two_decimals() {
        let record = form_record("Leadership 101", "Room A", "4");
        let csv = to_csv(&[record]);
        let rows = read_csv(&csv);
        assert_eq!(rows[1][1], "Leadership 101");
        assert_eq!(rows[1][24], "4.00");
        assert!(rows[1][7..24].iter().all(|s| s == "4"));
    }

    #[test]
    fn csv_file_contents_start_with_bom() {
        let contents = to_csv_file_contents(&[]);
        assert!(contents.starts_with(UTF8_BOM));
        assert!(contents[UTF8_BOM.len_utf8()..].starts_with("created_at,"));
    }

    #[test]
    fn export_file_names_are_date_stamped() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(
            export_file_name(ExportFormat::Json, date),
            "feedback-data-2026-10-17.json"
        );
        assert_eq!(
            export_file_name(ExportFormat::Csv, date),
            "feedback-data-2026-10-17.csv"
        );
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn import_rejects_non_array() {
        let err = parse_import(r#"{"id": "x"}"#).unwrap_err();
        assert!(matches!(err, ImportError::NotAnArray { found: "object" }));
        assert!(matches!(
            parse_import("not json").unwrap_err(),
            ImportError::InvalidJson(_)
        ));
    }

    #[test]
    fn import_counts_rejected_elements() {
        let text = r#"[
            {"id": "a", "metadata": {"courseName": "Safety", "location": "Plant 2"},
             "ratings": {"instructor": [5,5,5,5], "content": [4,4,4,4],
                         "venue": [3,3,3], "catering": [2,2,2], "benefit": [1,1,1]},
             "openEnded": {"strengths": "hands-on"}},
            {"id": "b", "metadata": {"batch": "7"}}
        ]"#;
        let outcome = parse_import(text).unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected_count, 1);
        assert_eq!(outcome.coerced_scores, 0);

        let record = &outcome.accepted[0];
        assert_eq!(record.id().as_str(), "a");
        assert_eq!(record.open_ended().strengths, "hands-on");
        assert_eq!(record.open_ended().suggestions, "");
    }

    #[test]
    fn import_pads_and_coerces_bad_ratings() {
        let text = r#"[{"metadata": {"courseName": "Excel"},
                        "ratings": {"venue": [6, "x"], "catering": [2, 4, 5, 1, 1]}}]"#;
        let outcome = parse_import(text).unwrap();
        let record = &outcome.accepted[0];

        let venue: Vec<u8> = record.ratings().venue.iter().map(|s| s.value()).collect();
        assert_eq!(venue, vec![3, 3, 3]);
        let catering: Vec<u8> = record.ratings().catering.iter().map(|s| s.value()).collect();
        assert_eq!(catering, vec![2, 4, 5]);
        // instructor 4 + content 4 + venue 3 + benefit 3 all defaulted
        assert_eq!(outcome.coerced_scores, 14);
    }

    #[test]
    fn import_preserves_in_range_value_among_bad_ones() {
        let text = r#"[{"metadata": {"location": "Room B"},
                        "ratings": {"venue": [0, "2", 4.0]}}]"#;
        let outcome = parse_import(text).unwrap();
        let venue: Vec<u8> = outcome.accepted[0]
            .ratings()
            .venue
            .iter()
            .map(|s| s.value())
            .collect();
        assert_eq!(venue, vec![3, 2, 4]);
    }

    #[test]
    fn import_regenerates_missing_id_and_timestamp() {
        let text = r#"[{"metadata": {"courseName": "A", "location": "B"}, "createdAt": "yesterday"}]"#;
        let before = Utc::now();
        let outcome = parse_import(text).unwrap();
        let record = &outcome.accepted[0];
        assert!(!record.id().as_str().is_empty());
        assert!(record.created_at() >= before);
    }

    #[test]
    fn import_element_with_wrong_metadata_type_is_soft_rejected() {
        let text = r#"[{"metadata": "oops"}, 42, {"metadata": {"courseName": "ok"}}]"#;
        let outcome = parse_import(text).unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected_count, 2);
    }

    #[test]
    fn json_roundtrip_through_import_and_merge() {
        let mut records = vec![
            form_record("Leadership 101", "Room A", "4"),
            form_record("Safety", "Plant 2", "5"),
        ];
        records[1].metadata.instructor_name = Some("Alice".into());
        records[1].open_ended.future_topics = "  keep spacing  ".into();

        let json = to_json(&records).unwrap();
        let outcome = parse_import(&json).unwrap();
        assert_eq!(outcome.rejected_count, 0);
        assert_eq!(outcome.coerced_scores, 0);

        let merged = merge(&[], outcome.accepted);
        assert_eq!(merged.added, 2);
        assert_eq!(merged.merged, records);
    }

    #[test]
    fn merge_drops_duplicates_and_is_idempotent() {
        let existing = vec![form_record("A", "B", "3")];
        let incoming = vec![existing[0].clone(), form_record("C", "D", "5")];

        let first = merge(&existing, incoming.clone());
        assert_eq!(first.added, 1);
        assert_eq!(first.duplicates, 1);
        assert_eq!(first.merged[0], existing[0]);

        let second = merge(&first.merged, incoming);
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(second.merged, first.merged);
    }

    #[test]
    fn merge_never_overwrites_existing() {
        let existing = vec![form_record("Original", "Room", "3")];
        let mut impostor = existing[0].clone();
        impostor.metadata.course_name = "Replacement".into();

        let outcome = merge(&existing, vec![impostor]);
        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].metadata().course_name, "Original");
    }

    #[test]
    fn merge_dedupes_within_incoming() {
        let record = form_record("A", "B", "3");
        let outcome = merge(&[], vec![record.clone(), record]);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.duplicates, 1);
    }
}
