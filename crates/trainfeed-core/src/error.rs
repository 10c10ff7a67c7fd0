//! Error types surfaced by the core.
//!
//! Validation and import-shape errors block a single operation and leave
//! state untouched. Storage errors never escape the persistence boundary as
//! failures; they travel as warnings next to a usable value.

use std::path::PathBuf;

use thiserror::Error;

/// A form submission that cannot become a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `courseName` was empty after trimming.
    #[error("course name is required")]
    MissingCourseName,

    /// `location` was empty after trimming.
    #[error("location is required")]
    MissingLocation,
}

/// The import text as a whole was unusable.
///
/// Problems with individual elements are not errors; they are counted in
/// the import outcome.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The text is not JSON at all.
    #[error("import is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The top-level JSON value is not an array.
    #[error("import must be a JSON array of records, found {found}")]
    NotAnArray { found: &'static str },
}

/// Errors from the key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a backing file failed.
    #[error("storage I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored value exists but does not deserialize.
    #[error("stored value under '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The collection could not be serialized.
    #[error("failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend refused the write because it is full.
    #[error("storage capacity exceeded: {requested} bytes requested, {capacity} available")]
    CapacityExceeded { requested: usize, capacity: usize },
}

/// Errors from roster maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The instructor name was empty after trimming.
    #[error("instructor name is required")]
    EmptyName,

    /// An instructor with the same name is already on the roster.
    #[error("instructor already on roster: {0}")]
    Duplicate(String),

    /// No roster entry has the given id.
    #[error("instructor not found: {0}")]
    NotFound(String),
}
