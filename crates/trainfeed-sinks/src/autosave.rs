//! Directory auto-save: rewrites a date-stamped CSV snapshot of the whole
//! collection after every committed record.
//!
//! The directory grant lives only for the current process. Losing write
//! access disarms the sink so later saves do not keep failing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use trainfeed_core::codec::to_csv_file_contents;
use trainfeed_core::FeedbackEvent;

use crate::error::SinkError;
use crate::sink::{Delivery, RecordSink};

/// Whether the sink currently holds a usable directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCapability {
    Armed(PathBuf),
    Disarmed,
}

/// `feedback-autosave-<YYYY-MM-DD>.csv`
pub fn autosave_file_name(date: NaiveDate) -> String {
    format!("feedback-autosave-{}.csv", date.format("%Y-%m-%d"))
}

fn check_writable(dir: &Path) -> Result<(), String> {
    let meta = std::fs::metadata(dir).map_err(|e| e.to_string())?;
    if !meta.is_dir() {
        return Err("not a directory".into());
    }
    if meta.permissions().readonly() {
        return Err("directory is read-only".into());
    }
    Ok(())
}

pub struct DirectoryAutoSave {
    capability: Mutex<DirectoryCapability>,
}

impl Default for DirectoryAutoSave {
    fn default() -> Self {
        Self::disarmed()
    }
}

impl DirectoryAutoSave {
    pub fn disarmed() -> Self {
        Self {
            capability: Mutex::new(DirectoryCapability::Disarmed),
        }
    }

    /// Grant `dir`, failing if it cannot be written to right now.
    pub fn armed(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let sink = Self::disarmed();
        sink.arm(dir)?;
        Ok(sink)
    }

    pub fn arm(&self, dir: impl Into<PathBuf>) -> Result<(), SinkError> {
        let dir = dir.into();
        check_writable(&dir).map_err(|reason| SinkError::PermissionDenied {
            dir: dir.clone(),
            reason,
        })?;
        tracing::info!(dir = %dir.display(), "auto-save armed");
        self.set(DirectoryCapability::Armed(dir));
        Ok(())
    }

    pub fn disarm(&self) {
        self.set(DirectoryCapability::Disarmed);
    }

    pub fn capability(&self) -> DirectoryCapability {
        match self.capability.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set(&self, capability: DirectoryCapability) {
        match self.capability.lock() {
            Ok(mut guard) => *guard = capability,
            Err(poisoned) => *poisoned.into_inner() = capability,
        }
    }

    fn permission_lost(&self, dir: PathBuf, reason: String) -> SinkError {
        self.disarm();
        SinkError::PermissionDenied { dir, reason }
    }
}

#[async_trait]
impl RecordSink for DirectoryAutoSave {
    fn name(&self) -> &str {
        "autosave"
    }

    async fn handle(&self, event: &FeedbackEvent) -> Result<Delivery, SinkError> {
        let FeedbackEvent::RecordSaved { snapshot, .. } = event else {
            return Ok(Delivery::Skipped);
        };
        let DirectoryCapability::Armed(dir) = self.capability() else {
            return Ok(Delivery::Skipped);
        };

        if let Err(reason) = check_writable(&dir) {
            return Err(self.permission_lost(dir, reason));
        }

        let path = dir.join(autosave_file_name(Local::now().date_naive()));
        let contents = to_csv_file_contents(snapshot);
        match tokio::fs::write(&path, contents).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), records = snapshot.len(), "auto-saved");
                Ok(Delivery::Delivered)
            }
            Err(e) if matches!(e.kind(), ErrorKind::PermissionDenied | ErrorKind::NotFound) => {
                Err(self.permission_lost(dir, e.to_string()))
            }
            Err(source) => Err(SinkError::Io { path, source }),
        }
    }
}
