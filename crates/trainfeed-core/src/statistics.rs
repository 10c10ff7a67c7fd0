//! Average-score statistics over records.
//!
//! Every function here is total: empty input produces zeros, never an error
//! or NaN. Values are unrounded; rounding to two decimals is a display
//! concern.

use serde::{Deserialize, Serialize};

use crate::model::{Category, FeedbackRecord, Ratings, Score};

/// Arithmetic mean, or 0.0 for an empty sequence.
pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0f64, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Mean of one category's scores.
pub fn category_average(scores: &[Score]) -> f64 {
    mean(scores.iter().copied().map(f64::from))
}

/// Mean over all 17 items of a record's ratings.
pub fn overall_average(ratings: &Ratings) -> f64 {
    mean(ratings.iter().map(f64::from))
}

/// Per-category means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverages {
    pub instructor: f64,
    pub content: f64,
    pub venue: f64,
    pub catering: f64,
    pub benefit: f64,
}

impl CategoryAverages {
    /// Category means of a single record.
    pub fn of(ratings: &Ratings) -> Self {
        Self::from_fn(|c| category_average(ratings.scores(c)))
    }

    fn from_fn(mut f: impl FnMut(Category) -> f64) -> Self {
        Self {
            instructor: f(Category::Instructor),
            content: f(Category::Content),
            venue: f(Category::Venue),
            catering: f(Category::Catering),
            benefit: f(Category::Benefit),
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Instructor => self.instructor,
            Category::Content => self.content,
            Category::Venue => self.venue,
            Category::Catering => self.catering,
            Category::Benefit => self.benefit,
        }
    }

    /// `(category, mean)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Summary over a set of records.
///
/// `count == 0` is the "no data" state: every other field is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    /// Mean of the records' overall averages.
    pub avg: f64,
    /// Highest overall average of any record.
    pub max: f64,
    /// Lowest overall average of any record.
    pub min: f64,
    /// Mean of each record's category mean.
    pub per_category: CategoryAverages,
}

/// Summarize `records`, optionally only those whose instructor name equals
/// `instructor`.
pub fn aggregate(records: &[FeedbackRecord], instructor: Option<&str>) -> Summary {
    let selected: Vec<&FeedbackRecord> = records
        .iter()
        .filter(|r| match instructor {
            Some(name) => r.metadata().instructor_name.as_deref() == Some(name),
            None => true,
        })
        .collect();

    if selected.is_empty() {
        return Summary::default();
    }

    let overall: Vec<f64> = selected
        .iter()
        .map(|r| overall_average(r.ratings()))
        .collect();
    let max = overall.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = overall.iter().copied().fold(f64::INFINITY, f64::min);

    let per_category = CategoryAverages::from_fn(|c| {
        mean(
            selected
                .iter()
                .map(|r| category_average(r.ratings().scores(c))),
        )
    });

    Summary {
        count: selected.len(),
        avg: mean(overall.iter().copied()),
        max,
        min,
        per_category,
    }
}
