//! Subcommand implementations and the session plumbing they share.

pub mod delete;
pub mod export;
pub mod import;
pub mod init;
pub mod instructor;
pub mod list;
pub mod show;
pub mod submit;
pub mod summary;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use trainfeed_core::{EventBus, FeedbackStore, FileKvStore};
use trainfeed_sinks::{
    create_sinks, load_config_from, DirectoryAutoSave, SinkDispatcher, SinkReport, TrainfeedConfig,
};

/// Buffered events per sink subscriber.
const EVENT_CAPACITY: usize = 64;

pub fn load_config(path: Option<&Path>) -> Result<TrainfeedConfig> {
    load_config_from(path)
}

/// Open the store without any sinks, for read-only commands.
pub fn open_store(config: &TrainfeedConfig) -> Result<FeedbackStore<FileKvStore>> {
    let backend = FileKvStore::open(&config.data_dir)
        .with_context(|| format!("cannot open data directory {}", config.data_dir.display()))?;
    let store = FeedbackStore::open(backend);
    for warning in store.load_warnings() {
        eprintln!("Warning: {warning}; starting with an empty collection");
    }
    Ok(store)
}

/// A store wired to the configured sinks for one mutating command.
pub struct Session {
    pub store: FeedbackStore<FileKvStore>,
    bus: EventBus,
    dispatcher: JoinHandle<SinkReport>,
}

impl Session {
    pub fn start(
        config: &TrainfeedConfig,
        autosave: Option<Arc<DirectoryAutoSave>>,
    ) -> Result<Self> {
        let sinks = create_sinks(config, autosave)?;
        tracing::debug!(sinks = sinks.len(), "starting session");

        let bus = EventBus::new(EVENT_CAPACITY);
        let dispatcher = SinkDispatcher::new(sinks).spawn(&bus);
        let store = open_store(config)?.with_events(bus.clone());

        Ok(Self {
            store,
            bus,
            dispatcher,
        })
    }

    /// Close the bus, wait for in-flight sink work and print its warnings.
    pub async fn finish(self) -> Result<SinkReport> {
        let Session {
            store,
            bus,
            dispatcher,
        } = self;
        drop(store);
        drop(bus);

        let report = dispatcher.await.context("sink dispatcher panicked")?;
        for warning in &report.warnings {
            eprintln!("Warning: {warning}");
        }
        Ok(report)
    }
}
