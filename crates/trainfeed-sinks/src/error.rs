//! Sink error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors a post-commit sink can report.
///
/// None of these affect the save that produced the event; the dispatcher
/// turns them into warnings.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The relay endpoint answered with a non-success status.
    #[error("relay rejected the payload (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The auto-save directory is gone or no longer writable.
    #[error("no write permission for {}: {reason}", dir.display())]
    PermissionDenied { dir: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SinkError {
    /// Whether the sink switched itself off because of this error.
    pub fn disables_sink(&self) -> bool {
        matches!(self, SinkError::PermissionDenied { .. })
    }
}
