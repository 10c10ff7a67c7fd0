//! Post-commit notifications.
//!
//! The store emits an event only after the local save has succeeded.
//! Subscribers (relay, auto-save) run independently and cannot affect the
//! outcome of the save that triggered them.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::model::FeedbackRecord;
use crate::roster::InstructorEntry;

/// Something that was durably committed to local storage.
#[derive(Debug, Clone)]
pub enum FeedbackEvent {
    /// A new record was saved.
    RecordSaved {
        record: FeedbackRecord,
        /// The whole collection as saved, including `record`.
        snapshot: Arc<Vec<FeedbackRecord>>,
    },

    /// The instructor roster was changed and saved.
    RosterChanged { roster: Arc<Vec<InstructorEntry>> },
}

impl FeedbackEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedbackEvent::RecordSaved { .. } => "record_saved",
            FeedbackEvent::RosterChanged { .. } => "roster_changed",
        }
    }
}

/// One-to-many broadcast of [`FeedbackEvent`]s.
///
/// Cloning shares the same channel. The channel closes once every clone is
/// dropped, which ends subscriber loops.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FeedbackEvent>,
    capacity: usize,
}

impl EventBus {
    /// `capacity` events are buffered per subscriber before the oldest are
    /// dropped for slow receivers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.tx.subscribe()
    }

    /// Send to all current subscribers. Never blocks.
    ///
    /// Returns the number of subscribers reached, or `None` if nobody is
    /// listening.
    pub fn emit(&self, event: FeedbackEvent) -> Option<usize> {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::debug!(kind, "no subscribers for event");
                None
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
