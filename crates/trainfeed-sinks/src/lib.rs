//! trainfeed-sinks — best-effort consumers of committed changes.
//!
//! Sinks subscribe to the core event bus and run after the local save has
//! already succeeded: a webhook relay to an external spreadsheet and a
//! directory auto-save of the full CSV snapshot. Their failures surface as
//! warnings only.

pub mod autosave;
pub mod config;
pub mod error;
pub mod mock;
pub mod relay;
pub mod sink;

pub use autosave::{DirectoryAutoSave, DirectoryCapability};
pub use config::{create_sinks, load_config, load_config_from, RelayConfig, TrainfeedConfig};
pub use error::SinkError;
pub use relay::WebhookRelay;
pub use sink::{Delivery, RecordSink, SinkDispatcher, SinkReport};
