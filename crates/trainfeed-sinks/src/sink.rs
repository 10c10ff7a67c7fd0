//! The sink trait and the dispatcher that feeds it from the event bus.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use trainfeed_core::{EventBus, FeedbackEvent};

use crate::error::SinkError;

/// What a sink did with an event it handled without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The event was not relevant to this sink, or the sink is switched off.
    Skipped,
}

/// A best-effort consumer of committed changes.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Short name used in logs and warnings.
    fn name(&self) -> &str;

    /// Handle one event. A single attempt; no retries.
    async fn handle(&self, event: &FeedbackEvent) -> Result<Delivery, SinkError>;
}

/// Tally of sink outcomes across one or more events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One `"<sink>: <error>"` line per failure, in completion order.
    pub warnings: Vec<String>,
}

impl SinkReport {
    pub fn absorb(&mut self, other: SinkReport) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.warnings.extend(other.warnings);
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Fans each event out to every registered sink concurrently.
#[derive(Clone, Default)]
pub struct SinkDispatcher {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl SinkDispatcher {
    pub fn new(sinks: Vec<Arc<dyn RecordSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver one event to all sinks and wait for every one to finish.
    pub async fn dispatch(&self, event: &FeedbackEvent) -> SinkReport {
        let mut pending: FuturesUnordered<_> = self
            .sinks
            .iter()
            .map(|sink| async move { (sink.name(), sink.handle(event).await) })
            .collect();

        let mut report = SinkReport::default();
        while let Some((name, result)) = pending.next().await {
            match result {
                Ok(Delivery::Delivered) => {
                    tracing::debug!(sink = name, kind = event.kind(), "delivered");
                    report.delivered += 1;
                }
                Ok(Delivery::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(sink = name, kind = event.kind(), "sink failed: {e}");
                    if e.disables_sink() {
                        tracing::warn!(sink = name, "sink disabled until re-armed");
                    }
                    report.failed += 1;
                    report.warnings.push(format!("{name}: {e}"));
                }
            }
        }
        report
    }

    /// Subscribe to `bus` and handle events in a background task.
    ///
    /// The subscription is taken before this returns, so events emitted
    /// afterwards are never missed. The task finishes once every handle to
    /// the bus is dropped, yielding the combined report.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<SinkReport> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            let mut total = SinkReport::default();
            loop {
                match rx.recv().await {
                    Ok(event) => total.absorb(self.dispatch(&event).await),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "sink dispatcher fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!(
                delivered = total.delivered,
                failed = total.failed,
                "sink dispatcher stopped"
            );
            total
        })
    }
}
