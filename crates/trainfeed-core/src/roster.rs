//! The instructor roster.
//!
//! Records copy the instructor's name at submission time, so removing a
//! roster entry never touches existing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RosterError;

/// A selectable instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorEntry {
    pub id: String,
    pub name: String,
    pub added_at: DateTime<Utc>,
}

/// Ordered list of instructors with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    entries: Vec<InstructorEntry>,
}

impl Roster {
    pub fn entries(&self) -> &[InstructorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name, ignoring case and surrounding whitespace.
    pub fn find_by_name(&self, name: &str) -> Option<&InstructorEntry> {
        let wanted = name.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.name.to_lowercase() == wanted)
    }

    /// Add an instructor. Names are trimmed and must be unique ignoring case.
    pub fn add(&mut self, name: &str) -> Result<InstructorEntry, RosterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }
        if let Some(existing) = self.find_by_name(name) {
            return Err(RosterError::Duplicate(existing.name.clone()));
        }
        let entry = InstructorEntry {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            added_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Remove the entry with the given id.
    pub fn remove(&mut self, id: &str) -> Result<InstructorEntry, RosterError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
        Ok(self.entries.remove(index))
    }
}
