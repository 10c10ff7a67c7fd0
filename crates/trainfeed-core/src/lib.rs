//! trainfeed-core — Feedback record model, statistics, codec and store.
//!
//! This crate defines the typed survey record, the statistics derived from
//! it, the JSON/CSV import-export boundary, and the owned store that keeps
//! the collection and the instructor roster in a key-value backend.

pub mod codec;
pub mod error;
pub mod events;
pub mod model;
pub mod persistence;
pub mod roster;
pub mod statistics;
pub mod store;

pub use error::{ImportError, RosterError, StorageError, ValidationError};
pub use events::{EventBus, FeedbackEvent};
pub use model::{
    create_record, Category, FeedbackRecord, FormInput, Metadata, OpenEnded, Ratings, RecordId,
    Score,
};
pub use persistence::{FileKvStore, KeyValueStore, Loaded, MemoryKvStore, Persistence};
pub use roster::{InstructorEntry, Roster};
pub use store::{FeedbackStore, RecordDeleted, SubmitOutcome};
