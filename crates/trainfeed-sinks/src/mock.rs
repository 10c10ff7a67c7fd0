//! In-process sinks for testing dispatch without a network or filesystem.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use trainfeed_core::FeedbackEvent;

use crate::error::SinkError;
use crate::sink::{Delivery, RecordSink};

/// Remembers the kind of every event it receives.
pub struct RecordingSink {
    name: String,
    kinds: Mutex<Vec<&'static str>>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kinds: Mutex::new(Vec::new()),
        }
    }

    /// Event kinds seen so far, in arrival order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.kinds
            .lock()
            .map(|kinds| kinds.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &FeedbackEvent) -> Result<Delivery, SinkError> {
        if let Ok(mut kinds) = self.kinds.lock() {
            kinds.push(event.kind());
        }
        Ok(Delivery::Delivered)
    }
}

/// Fails every event with a network error.
pub struct FailingSink {
    name: String,
    attempts: AtomicU32,
}

impl FailingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _event: &FeedbackEvent) -> Result<Delivery, SinkError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(SinkError::Network("connection refused".into()))
    }
}
