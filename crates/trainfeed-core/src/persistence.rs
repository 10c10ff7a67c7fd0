//! Key-value persistence for the record collection and the roster.
//!
//! Each collection lives under its own key as a JSON document and is
//! replaced wholesale on every save. Loading never fails: a missing key is
//! an empty collection, a corrupt one is an empty collection plus a warning.
//! The unreadable document is copied to `<key>.corrupt` before the first
//! save that would overwrite it.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::model::FeedbackRecord;
use crate::roster::Roster;

/// Key holding the JSON array of records.
pub const RECORDS_KEY: &str = "feedbackData";
/// Key holding the JSON array of roster entries.
pub const ROSTER_KEY: &str = "instructorRoster";

/// Key under which an unreadable document for `key` is preserved.
pub fn corrupt_key(key: &str) -> String {
    format!("{key}.corrupt")
}

/// A string-to-string store, modelled on browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Use `dir` as the backing directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        // write-then-rename so a reader never sees a partial document
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }
}

/// In-process store with an optional byte quota.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: HashMap<String, String>,
    capacity: Option<usize>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would make the total stored bytes exceed `bytes`.
    pub fn with_capacity_limit(bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: Some(bytes),
        }
    }

    fn used_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(capacity) = self.capacity {
            let requested = key.len() + value.len();
            let available = capacity.saturating_sub(self.used_excluding(key));
            if requested > available {
                return Err(StorageError::CapacityExceeded {
                    requested,
                    capacity: available,
                });
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// A value read from storage, with the reason it may have been reset.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub warning: Option<StorageError>,
}

/// Typed load/save of the two collections over a [`KeyValueStore`].
#[derive(Debug)]
pub struct Persistence<S> {
    backend: S,
    /// Raw documents that failed to load, keyed by their original key.
    unreadable: BTreeMap<String, String>,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            unreadable: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn load_records(&mut self) -> Loaded<Vec<FeedbackRecord>> {
        self.load(RECORDS_KEY)
    }

    pub fn load_roster(&mut self) -> Loaded<Roster> {
        self.load(ROSTER_KEY)
    }

    /// Persist the full record collection. Returns `false` if the backend
    /// refused the write.
    pub fn save_records(&mut self, records: &[FeedbackRecord]) -> bool {
        self.save(RECORDS_KEY, records)
    }

    pub fn save_roster(&mut self, roster: &Roster) -> bool {
        self.save(ROSTER_KEY, roster)
    }

    fn load<T: DeserializeOwned + Default>(&mut self, key: &str) -> Loaded<T> {
        let result = self.backend.get(key).and_then(|raw| match raw {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| {
                self.unreadable.insert(key.to_string(), raw);
                StorageError::Corrupt {
                    key: key.to_string(),
                    source,
                }
            }),
            None => Ok(T::default()),
        });

        match result {
            Ok(value) => Loaded {
                value,
                warning: None,
            },
            Err(e) => {
                tracing::warn!(key, "starting with an empty collection: {e}");
                Loaded {
                    value: T::default(),
                    warning: Some(e),
                }
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> bool {
        if !self.preserve_unreadable(key) {
            return false;
        }

        let result = serde_json::to_string(value)
            .map_err(|source| StorageError::Serialize {
                key: key.to_string(),
                source,
            })
            .and_then(|json| self.backend.set(key, json));

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, "save failed: {e}");
                false
            }
        }
    }

    /// Copy a document that failed to load out of the way before it is
    /// overwritten. Saving `key` is refused until the copy succeeds.
    fn preserve_unreadable(&mut self, key: &str) -> bool {
        let Some(raw) = self.unreadable.remove(key) else {
            return true;
        };
        let backup = corrupt_key(key);
        match self.backend.set(&backup, raw.clone()) {
            Ok(()) => {
                tracing::warn!(key, backup = %backup, "unreadable document preserved");
                true
            }
            Err(e) => {
                tracing::warn!(key, "cannot preserve unreadable document, not saving: {e}");
                self.unreadable.insert(key.to_string(), raw);
                false
            }
        }
    }
}
