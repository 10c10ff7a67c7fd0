//! Core data model types for trainfeed.
//!
//! A [`FeedbackRecord`] is only ever built by [`create_record`] (from a form
//! submission) or by the import codec (from untrusted JSON). Both paths
//! coerce ratings into [`Score`], so code holding a record never re-checks
//! field presence or rating ranges.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Lowest rating a respondent can give.
pub const MIN_SCORE: u8 = 1;
/// Highest rating a respondent can give.
pub const MAX_SCORE: u8 = 5;
/// Number of rating items across all categories.
pub const TOTAL_SCORES: usize = 17;

/// A single rating in `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// Substituted for any rating that is missing, non-numeric or out of range.
    pub const NEUTRAL: Score = Score(3);

    /// Returns `None` unless `value` is within `[1, 5]`.
    pub fn new(value: u8) -> Option<Self> {
        (MIN_SCORE..=MAX_SCORE).contains(&value).then_some(Self(value))
    }

    /// Accept any integer, rejecting values outside `[1, 5]`.
    pub fn from_integer(value: i64) -> Option<Self> {
        u8::try_from(value).ok().and_then(Self::new)
    }

    /// Parse a raw form value such as `" 4 "`.
    pub fn parse_form(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().and_then(Self::from_integer)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Score::new(value).ok_or_else(|| format!("score {value} outside {MIN_SCORE}..={MAX_SCORE}"))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> f64 {
        f64::from(score.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the five rating groups on the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Instructor,
    Content,
    Venue,
    Catering,
    Benefit,
}

impl Category {
    /// All categories in schema order (the order used by CSV columns).
    pub const ALL: [Category; 5] = [
        Category::Instructor,
        Category::Content,
        Category::Venue,
        Category::Catering,
        Category::Benefit,
    ];

    /// Number of rating items in this category.
    pub fn arity(self) -> usize {
        match self {
            Category::Instructor | Category::Content => 4,
            Category::Venue | Category::Catering | Category::Benefit => 3,
        }
    }

    /// Key used in JSON and CSV headers.
    pub fn key(self) -> &'static str {
        match self {
            Category::Instructor => "instructor",
            Category::Content => "content",
            Category::Venue => "venue",
            Category::Catering => "catering",
            Category::Benefit => "benefit",
        }
    }

    /// Human-readable label for tables.
    pub fn label(self) -> &'static str {
        match self {
            Category::Instructor => "Instructor",
            Category::Content => "Content",
            Category::Venue => "Venue",
            Category::Catering => "Catering",
            Category::Benefit => "Benefit",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instructor" => Ok(Category::Instructor),
            "content" => Ok(Category::Content),
            "venue" => Ok(Category::Venue),
            "catering" | "food" => Ok(Category::Catering),
            "benefit" => Ok(Category::Benefit),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// The five rating groups with their fixed arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub instructor: [Score; 4],
    pub content: [Score; 4],
    pub venue: [Score; 3],
    pub catering: [Score; 3],
    pub benefit: [Score; 3],
}

impl Ratings {
    /// Every item set to the same score.
    pub fn uniform(score: Score) -> Self {
        Self::from_fn(|_, _| score)
    }

    /// Build ratings item by item, in schema order.
    pub fn from_fn(mut f: impl FnMut(Category, usize) -> Score) -> Self {
        Self {
            instructor: std::array::from_fn(|i| f(Category::Instructor, i)),
            content: std::array::from_fn(|i| f(Category::Content, i)),
            venue: std::array::from_fn(|i| f(Category::Venue, i)),
            catering: std::array::from_fn(|i| f(Category::Catering, i)),
            benefit: std::array::from_fn(|i| f(Category::Benefit, i)),
        }
    }

    pub fn scores(&self, category: Category) -> &[Score] {
        match category {
            Category::Instructor => &self.instructor,
            Category::Content => &self.content,
            Category::Venue => &self.venue,
            Category::Catering => &self.catering,
            Category::Benefit => &self.benefit,
        }
    }

    /// All 17 scores, concatenated in schema order.
    pub fn iter(&self) -> impl Iterator<Item = Score> + '_ {
        Category::ALL
            .into_iter()
            .flat_map(move |c| self.scores(c).iter().copied())
    }
}

/// Opaque record identifier.
///
/// Generated ids are UUID v4 strings, but imported ids are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive fields of a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub course_name: String,
    /// Calendar date as entered, usually `YYYY-MM-DD`.
    #[serde(default)]
    pub training_date: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Copied from the roster at submission time; never a reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_name: Option<String>,
}

/// Free-text answers. Unanswered questions are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEnded {
    #[serde(default)]
    pub strengths: String,
    #[serde(default)]
    pub suggestions: String,
    #[serde(default)]
    pub future_topics: String,
}

/// One submitted survey.
///
/// Fields are read-only outside this crate; a record is never edited in
/// place once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub(crate) id: RecordId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) metadata: Metadata,
    pub(crate) ratings: Ratings,
    pub(crate) open_ended: OpenEnded,
}

impl FeedbackRecord {
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn ratings(&self) -> &Ratings {
        &self.ratings
    }

    pub fn open_ended(&self) -> &OpenEnded {
        &self.open_ended
    }
}

/// Raw values from a submission source, before validation.
///
/// Ratings are kept as the strings the source produced so that a bad
/// individual value can be defaulted instead of failing the submission.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub course_name: String,
    pub training_date: String,
    pub location: String,
    pub batch: String,
    pub department: String,
    pub instructor_name: String,
    pub scores: BTreeMap<Category, Vec<String>>,
    pub strengths: String,
    pub suggestions: String,
    pub future_topics: String,
}

impl FormInput {
    /// Set the raw values for one category.
    pub fn with_scores<I, V>(mut self, category: Category, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.scores
            .insert(category, values.into_iter().map(Into::into).collect());
        self
    }
}

/// Build a record from a form submission with a fresh id and timestamp.
pub fn create_record(input: &FormInput) -> Result<FeedbackRecord, ValidationError> {
    create_record_at(input, RecordId::generate(), Utc::now())
}

/// Same as [`create_record`] with caller-supplied identity and time.
pub fn create_record_at(
    input: &FormInput,
    id: RecordId,
    created_at: DateTime<Utc>,
) -> Result<FeedbackRecord, ValidationError> {
    let course_name = input.course_name.trim();
    if course_name.is_empty() {
        return Err(ValidationError::MissingCourseName);
    }
    let location = input.location.trim();
    if location.is_empty() {
        return Err(ValidationError::MissingLocation);
    }

    let mut coerced = 0usize;
    let ratings = Ratings::from_fn(|category, index| {
        let parsed = input
            .scores
            .get(&category)
            .and_then(|values| values.get(index))
            .and_then(|raw| Score::parse_form(raw));
        parsed.unwrap_or_else(|| {
            coerced += 1;
            Score::NEUTRAL
        })
    });
    if coerced > 0 {
        tracing::warn!(
            record = %id,
            coerced,
            "missing or invalid ratings defaulted to {}",
            Score::NEUTRAL
        );
    }

    Ok(FeedbackRecord {
        id,
        created_at,
        metadata: Metadata {
            course_name: course_name.to_string(),
            training_date: input.training_date.trim().to_string(),
            location: location.to_string(),
            batch: non_blank(&input.batch),
            department: non_blank(&input.department),
            instructor_name: non_blank(&input.instructor_name),
        },
        ratings,
        open_ended: OpenEnded {
            strengths: input.strengths.trim().to_string(),
            suggestions: input.suggestions.trim().to_string(),
            future_topics: input.future_topics.trim().to_string(),
        },
    })
}

pub(crate) fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
