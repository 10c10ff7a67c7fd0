//! The owned feedback store.
//!
//! `FeedbackStore` is the single owner of the record collection and the
//! instructor roster. Every mutation follows the same sequence: change the
//! in-memory state, persist the whole collection, and only if that worked
//! emit a post-commit event.

use std::cmp::Reverse;
use std::sync::Arc;

use crate::codec::{self, ImportOutcome};
use crate::error::{ImportError, RosterError, StorageError, ValidationError};
use crate::events::{EventBus, FeedbackEvent};
use crate::model::{create_record, FeedbackRecord, FormInput, RecordId};
use crate::persistence::{KeyValueStore, Persistence};
use crate::roster::{InstructorEntry, Roster};
use crate::statistics::{self, Summary};

/// Result of a form submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record: FeedbackRecord,
    /// `false` if the record is only held in memory for this session.
    pub persisted: bool,
}

/// Result of deleting a record.
#[derive(Debug, Clone)]
pub struct RecordDeleted {
    pub record: FeedbackRecord,
    /// `false` if the deletion only happened in memory and the record will
    /// be back on the next load.
    pub persisted: bool,
}

/// Result of a merge-import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub added: usize,
    pub duplicates: usize,
    pub coerced_scores: usize,
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub struct InstructorAdded {
    pub entry: InstructorEntry,
    pub persisted: bool,
}

#[derive(Debug, Clone)]
pub struct RemovedInstructor {
    pub entry: InstructorEntry,
    /// Records that still carry this instructor's name.
    pub usage_count: usize,
    pub persisted: bool,
}

pub struct FeedbackStore<S> {
    persistence: Persistence<S>,
    records: Vec<FeedbackRecord>,
    roster: Roster,
    events: Option<EventBus>,
    load_warnings: Vec<StorageError>,
}

impl<S: KeyValueStore> FeedbackStore<S> {
    /// Load both collections from `backend`. Unreadable data starts empty
    /// and is reported through [`load_warnings`](Self::load_warnings).
    pub fn open(backend: S) -> Self {
        let mut persistence = Persistence::new(backend);
        let records = persistence.load_records();
        let roster = persistence.load_roster();
        let load_warnings = records
            .warning
            .into_iter()
            .chain(roster.warning)
            .collect();

        tracing::debug!(
            records = records.value.len(),
            instructors = roster.value.len(),
            "store opened"
        );

        Self {
            persistence,
            records: records.value,
            roster: roster.value,
            events: None,
            load_warnings,
        }
    }

    /// Publish post-commit events on `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn load_warnings(&self) -> &[StorageError] {
        &self.load_warnings
    }

    pub fn backend(&self) -> &S {
        self.persistence.backend()
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Records in insertion order.
    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    /// Records in display order: newest `createdAt` first.
    pub fn records_newest_first(&self) -> Vec<&FeedbackRecord> {
        let mut sorted: Vec<&FeedbackRecord> = self.records.iter().collect();
        sorted.sort_by_key(|r| Reverse(r.created_at()));
        sorted
    }

    pub fn get(&self, id: &RecordId) -> Option<&FeedbackRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validate and append a new record.
    ///
    /// A failed save keeps the record in memory and reports
    /// `persisted: false`; no event is emitted in that case.
    pub fn submit(&mut self, input: &FormInput) -> Result<SubmitOutcome, ValidationError> {
        let record = create_record(input)?;
        self.records.push(record.clone());

        let persisted = self.persistence.save_records(&self.records);
        if persisted {
            tracing::info!(id = %record.id(), course = %record.metadata().course_name, "record saved");
            self.emit(FeedbackEvent::RecordSaved {
                record: record.clone(),
                snapshot: Arc::new(self.records.clone()),
            });
        } else {
            tracing::warn!(id = %record.id(), "record kept in memory only");
        }

        Ok(SubmitOutcome { record, persisted })
    }

    /// Remove a record. Returns `None` if no record has that id.
    pub fn delete(&mut self, id: &RecordId) -> Option<RecordDeleted> {
        let index = self.records.iter().position(|r| r.id() == id)?;
        let record = self.records.remove(index);
        let persisted = self.persistence.save_records(&self.records);
        if !persisted {
            tracing::warn!(%id, "deletion not persisted");
        }
        Some(RecordDeleted { record, persisted })
    }

    /// Parse `text` as an import file and merge the accepted records.
    pub fn import_json(&mut self, text: &str) -> Result<ImportSummary, ImportError> {
        let ImportOutcome {
            accepted,
            rejected_count,
            coerced_scores,
        } = codec::parse_import(text)?;
        let accepted_count = accepted.len();

        let merged = codec::merge(&self.records, accepted);
        let persisted = if merged.added > 0 {
            self.records = merged.merged;
            self.persistence.save_records(&self.records)
        } else {
            true
        };

        tracing::info!(
            accepted = accepted_count,
            rejected = rejected_count,
            added = merged.added,
            duplicates = merged.duplicates,
            "import merged"
        );

        Ok(ImportSummary {
            accepted: accepted_count,
            rejected: rejected_count,
            added: merged.added,
            duplicates: merged.duplicates,
            coerced_scores,
            persisted,
        })
    }

    /// Summary statistics, optionally for one instructor.
    pub fn aggregate(&self, instructor: Option<&str>) -> Summary {
        statistics::aggregate(&self.records, instructor)
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Number of records whose instructor name matches `name` exactly.
    pub fn instructor_usage(&self, name: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.metadata().instructor_name.as_deref() == Some(name))
            .count()
    }

    pub fn add_instructor(&mut self, name: &str) -> Result<InstructorAdded, RosterError> {
        let entry = self.roster.add(name)?;
        let persisted = self.commit_roster();
        Ok(InstructorAdded { entry, persisted })
    }

    /// Remove a roster entry. Existing records keep their copy of the name;
    /// `usage_count` tells the caller how many there are.
    pub fn remove_instructor(&mut self, id: &str) -> Result<RemovedInstructor, RosterError> {
        let entry = self.roster.remove(id)?;
        let usage_count = self.instructor_usage(&entry.name);
        if usage_count > 0 {
            tracing::warn!(
                instructor = %entry.name,
                usage_count,
                "removed instructor is referenced by existing records"
            );
        }
        let persisted = self.commit_roster();
        Ok(RemovedInstructor {
            entry,
            usage_count,
            persisted,
        })
    }

    fn commit_roster(&mut self) -> bool {
        let persisted = self.persistence.save_roster(&self.roster);
        if persisted {
            self.emit(FeedbackEvent::RosterChanged {
                roster: Arc::new(self.roster.entries().to_vec()),
            });
        }
        persisted
    }

    fn emit(&self, event: FeedbackEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{create_record_at, Category};
    use crate::persistence::{FileKvStore, MemoryKvStore};

    fn form(course: &str, instructor: &str, score: &str) -> FormInput {
        let mut input = FormInput {
            course_name: course.into(),
            training_date: "2026-10-01".into(),
            location: "Room A".into(),
            instructor_name: instructor.into(),
            ..Default::default()
        };
        for c in Category::ALL {
            input = input.with_scores(c, vec![score; c.arity()]);
        }
        input
    }

    fn store() -> FeedbackStore<MemoryKvStore> {
        FeedbackStore::open(MemoryKvStore::new())
    }

    #[test]
    fn submit_persists_and_survives_reopen() {
        let mut store = store();
        let outcome = store.submit(&form("Leadership 101", "", "4")).unwrap();
        assert!(outcome.persisted);
        assert_eq!(store.len(), 1);

        let reopened = FeedbackStore::open(store.backend().clone());
        assert_eq!(reopened.records(), store.records());
        assert!(reopened.load_warnings().is_empty());
    }

    #[test]
    fn submit_validation_error_leaves_state_unchanged() {
        let mut store = store();
        let err = store.submit(&form("", "", "4")).unwrap_err();
        assert_eq!(err, ValidationError::MissingCourseName);
        assert!(store.is_empty());
    }

    #[test]
    fn submit_with_full_storage_keeps_record_in_memory() {
        let mut store = FeedbackStore::open(MemoryKvStore::with_capacity_limit(16));
        let outcome = store.submit(&form("Course", "", "3")).unwrap();
        assert!(!outcome.persisted);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn submit_emits_only_after_successful_save() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let mut full = FeedbackStore::open(MemoryKvStore::with_capacity_limit(16))
            .with_events(bus.clone());
        full.submit(&form("Course", "", "3")).unwrap();
        assert!(rx.try_recv().is_err());

        let mut ok = store().with_events(bus);
        let outcome = ok.submit(&form("Course", "", "3")).unwrap();
        match rx.recv().await.unwrap() {
            FeedbackEvent::RecordSaved { record, snapshot } => {
                assert_eq!(record.id(), outcome.record.id());
                assert_eq!(snapshot.len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn records_newest_first_orders_by_created_at() {
        let mut store = store();
        let now = Utc::now();
        let old = create_record_at(&form("Old", "", "3"), "old".into(), now - Duration::days(2))
            .unwrap();
        let new = create_record_at(&form("New", "", "3"), "new".into(), now).unwrap();
        store.records = vec![old, new];

        let ordered: Vec<&str> = store
            .records_newest_first()
            .iter()
            .map(|r| r.id().as_str())
            .collect();
        assert_eq!(ordered, vec!["new", "old"]);
        assert_eq!(store.records()[0].id().as_str(), "old");
    }

    #[test]
    fn delete_by_id() {
        let mut store = store();
        let id = store.submit(&form("A", "", "3")).unwrap().record.id().clone();
        store.submit(&form("B", "", "3")).unwrap();

        let removed = store.delete(&id).unwrap();
        assert!(removed.persisted);
        assert_eq!(removed.record.metadata().course_name, "A");
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_none());
        assert!(store.delete(&id).is_none());

        let reopened = FeedbackStore::open(store.backend().clone());
        assert_eq!(reopened.len(), 1);
    }

    /// Reads from a prepared store, refuses every write.
    struct ReadOnlyKvStore(MemoryKvStore);

    impl KeyValueStore for ReadOnlyKvStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }

        fn set(&mut self, _key: &str, value: String) -> Result<(), StorageError> {
            Err(StorageError::CapacityExceeded {
                requested: value.len(),
                capacity: 0,
            })
        }
    }

    #[test]
    fn delete_reports_failed_save() {
        let mut seeded = store();
        let id = seeded.submit(&form("A", "", "3")).unwrap().record.id().clone();

        let mut store = FeedbackStore::open(ReadOnlyKvStore(seeded.backend().clone()));
        assert_eq!(store.len(), 1);

        let removed = store.delete(&id).unwrap();
        assert!(!removed.persisted);
        assert!(store.is_empty());

        // the backend still holds the record, so it comes back on reopen
        let reopened = FeedbackStore::open(ReadOnlyKvStore(store.backend().0.clone()));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn unreadable_records_file_is_kept_aside_on_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FeedbackStore::open(FileKvStore::open(dir.path()).unwrap());
        store.submit(&form("A", "", "3")).unwrap();
        store.submit(&form("B", "", "3")).unwrap();

        let path = dir.path().join("feedbackData.json");
        let damaged = std::fs::read_to_string(&path)
            .unwrap()
            .replacen("\"venue\":[3,3,3]", "\"venue\":[6,3,3]", 1);
        std::fs::write(&path, &damaged).unwrap();

        let mut reopened = FeedbackStore::open(FileKvStore::open(dir.path()).unwrap());
        assert!(reopened.is_empty());
        assert_eq!(reopened.load_warnings().len(), 1);

        assert!(reopened.submit(&form("C", "", "3")).unwrap().persisted);
        let kept = std::fs::read_to_string(dir.path().join("feedbackData.corrupt.json")).unwrap();
        assert_eq!(kept, damaged);
        assert_eq!(
            FeedbackStore::open(FileKvStore::open(dir.path()).unwrap()).len(),
            1
        );
    }

    #[test]
    fn import_merges_and_reports_counts() {
        let mut store = store();
        let existing = store.submit(&form("A", "", "3")).unwrap().record;

        let mut exported: serde_json::Value =
            serde_json::from_str(&codec::to_json(store.records()).unwrap()).unwrap();
        exported
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"metadata": {"courseName": "New", "location": "Hall"}}));
        exported
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({"metadata": {}}));

        let summary = store.import_json(&exported.to_string()).unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.duplicates, 1);
        assert!(summary.persisted);
        assert_eq!(store.records()[0], existing);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn import_twice_is_idempotent() {
        let mut source = store();
        source.submit(&form("A", "", "4")).unwrap();
        source.submit(&form("B", "", "5")).unwrap();
        let json = codec::to_json(source.records()).unwrap();

        let mut target = store();
        assert_eq!(target.import_json(&json).unwrap().added, 2);
        let snapshot = target.records().to_vec();

        let second = target.import_json(&json).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(target.records(), snapshot.as_slice());
    }

    #[test]
    fn import_rejects_non_array_without_changes() {
        let mut store = store();
        store.submit(&form("A", "", "4")).unwrap();
        assert!(store.import_json("{}").is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn aggregate_filters_by_instructor() {
        let mut store = store();
        store.submit(&form("A", "Alice", "5")).unwrap();
        store.submit(&form("B", "Bob", "3")).unwrap();

        assert_eq!(store.aggregate(None).count, 2);
        let alice = store.aggregate(Some("Alice"));
        assert_eq!(alice.count, 1);
        assert_eq!(alice.avg, 5.0);
        assert_eq!(store.aggregate(Some("Nobody")).count, 0);
    }

    #[test]
    fn removing_instructor_keeps_record_names() {
        let mut store = store();
        let alice = store.add_instructor("Alice").unwrap();
        assert!(alice.persisted);
        store.submit(&form("A", "Alice", "4")).unwrap();
        store.submit(&form("B", "Alice", "4")).unwrap();

        let removed = store.remove_instructor(&alice.entry.id).unwrap();
        assert_eq!(removed.usage_count, 2);
        assert!(store.roster().is_empty());
        assert!(store
            .records()
            .iter()
            .all(|r| r.metadata().instructor_name.as_deref() == Some("Alice")));
    }

    #[test]
    fn roster_survives_reopen() {
        let mut store = store();
        store.add_instructor("Alice").unwrap();
        assert_eq!(
            store.add_instructor("ALICE").unwrap_err(),
            RosterError::Duplicate("Alice".into())
        );

        let reopened = FeedbackStore::open(store.backend().clone());
        assert_eq!(reopened.roster().len(), 1);
    }

    #[tokio::test]
    async fn roster_change_emits_full_roster() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let mut store = store().with_events(bus);
        store.add_instructor("Alice").unwrap();
        store.add_instructor("Bob").unwrap();

        rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            FeedbackEvent::RosterChanged { roster } => assert_eq!(roster.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn corrupt_storage_opens_empty_with_warning() {
        let mut backend = MemoryKvStore::new();
        backend
            .set(crate::persistence::RECORDS_KEY, "[{".into())
            .unwrap();
        let store = FeedbackStore::open(backend);
        assert!(store.is_empty());
        assert_eq!(store.load_warnings().len(), 1);
    }
}
