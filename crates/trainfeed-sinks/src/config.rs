//! trainfeed configuration and sink factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::autosave::DirectoryAutoSave;
use crate::relay::WebhookRelay;
use crate::sink::RecordSink;

/// Overrides `[relay].endpoint` when set.
pub const RELAY_URL_ENV: &str = "TRAINFEED_RELAY_URL";

/// Spreadsheet webhook settings.
///
/// Note: Custom Debug impl masks the query string, which often carries a
/// deployment key.
#[derive(Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub endpoint: String,
    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &mask_query(&self.endpoint))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn mask_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?***"),
        None => url.to_string(),
    }
}

fn default_relay_timeout() -> u64 {
    10
}

/// Top-level trainfeed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainfeedConfig {
    /// Directory holding the key-value store files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Where `export` writes when no `--output` is given.
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub relay: Option<RelayConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./trainfeed-data")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for TrainfeedConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            export_dir: default_export_dir(),
            relay: None,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again, so a value containing `${...}`
/// is kept literally.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while let Some(offset) = result[pos..].find("${") {
        let start = pos + offset;
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
            pos = start + value.len();
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `trainfeed.toml` in the current directory
/// 2. `~/.config/trainfeed/config.toml`
///
/// Environment variable override: `TRAINFEED_RELAY_URL`.
pub fn load_config() -> Result<TrainfeedConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TrainfeedConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("trainfeed.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<TrainfeedConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => TrainfeedConfig::default(),
    };

    Ok(apply_overrides(config, std::env::var(RELAY_URL_ENV).ok()))
}

fn apply_overrides(mut config: TrainfeedConfig, relay_url: Option<String>) -> TrainfeedConfig {
    if let Some(url) = relay_url {
        match config.relay.as_mut() {
            Some(relay) => relay.endpoint = url,
            None => {
                config.relay = Some(RelayConfig {
                    endpoint: url,
                    timeout_secs: default_relay_timeout(),
                })
            }
        }
    }

    // an endpoint that resolves to nothing means the relay is off
    config.relay = config.relay.and_then(|relay| {
        let endpoint = resolve_env_vars(&relay.endpoint).trim().to_string();
        if endpoint.is_empty() {
            tracing::warn!("relay endpoint is empty after resolving variables; relay disabled");
            None
        } else {
            Some(RelayConfig { endpoint, ..relay })
        }
    });

    config
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("trainfeed"))
}

/// Build the sinks this configuration enables.
///
/// `autosave` is only present when the caller granted a directory for this
/// process; the grant is never read from or written to the config file.
pub fn create_sinks(
    config: &TrainfeedConfig,
    autosave: Option<Arc<DirectoryAutoSave>>,
) -> Result<Vec<Arc<dyn RecordSink>>> {
    let mut sinks: Vec<Arc<dyn RecordSink>> = Vec::new();
    if let Some(relay) = &config.relay {
        sinks.push(Arc::new(WebhookRelay::new(
            &relay.endpoint,
            relay.timeout_secs,
        )?));
    }
    if let Some(autosave) = autosave {
        sinks.push(autosave);
    }
    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_TRAINFEED_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_TRAINFEED_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_TRAINFEED_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_TRAINFEED_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_expand_substituted_values() {
        std::env::set_var("_TRAINFEED_SELF_REF", "${_TRAINFEED_SELF_REF}");
        std::env::set_var("_TRAINFEED_PING", "${_TRAINFEED_PONG}");
        std::env::set_var("_TRAINFEED_PONG", "${_TRAINFEED_PING}");

        assert_eq!(
            resolve_env_vars("${_TRAINFEED_SELF_REF}/hook"),
            "${_TRAINFEED_SELF_REF}/hook"
        );
        assert_eq!(
            resolve_env_vars("${_TRAINFEED_PING}-${_TRAINFEED_PONG}"),
            "${_TRAINFEED_PONG}-${_TRAINFEED_PING}"
        );
        assert_eq!(resolve_env_vars("open ${_TRAINFEED_PING"), "open ${_TRAINFEED_PING");

        std::env::remove_var("_TRAINFEED_SELF_REF");
        std::env::remove_var("_TRAINFEED_PING");
        std::env::remove_var("_TRAINFEED_PONG");
    }

    #[test]
    fn default_config() {
        let config = TrainfeedConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./trainfeed-data"));
        assert_eq!(config.export_dir, PathBuf::from("."));
        assert!(config.relay.is_none());
    }

    #[test]
    fn parse_relay_config() {
        let toml_str = r#"
data_dir = "/var/lib/trainfeed"

[relay]
endpoint = "https://script.example.com/exec?key=secret"
"#;
        let config: TrainfeedConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/trainfeed"));
        let relay = config.relay.unwrap();
        assert_eq!(relay.timeout_secs, 10);

        let debug = format!("{relay:?}");
        assert!(debug.contains("https://script.example.com/exec?***"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn env_override_creates_relay() {
        let config = apply_overrides(
            TrainfeedConfig::default(),
            Some("http://localhost:9000/hook".into()),
        );
        let relay = config.relay.unwrap();
        assert_eq!(relay.endpoint, "http://localhost:9000/hook");
        assert_eq!(relay.timeout_secs, 10);
    }

    #[test]
    fn unresolved_endpoint_disables_relay() {
        let config: TrainfeedConfig = toml::from_str(
            r#"
[relay]
endpoint = "${_TRAINFEED_UNSET_RELAY_VAR}"
"#,
        )
        .unwrap();
        assert!(apply_overrides(config, None).relay.is_none());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/trainfeed.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn sinks_follow_config() {
        let none = create_sinks(&TrainfeedConfig::default(), None).unwrap();
        assert!(none.is_empty());

        let config = TrainfeedConfig {
            relay: Some(RelayConfig {
                endpoint: "http://localhost:9000".into(),
                timeout_secs: 1,
            }),
            ..Default::default()
        };
        let autosave = Arc::new(DirectoryAutoSave::disarmed());
        let sinks = create_sinks(&config, Some(autosave)).unwrap();
        let names: Vec<_> = sinks.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["relay", "autosave"]);
    }
}
