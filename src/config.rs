//! Runtime configuration loading: JSON file with environment overrides.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::UtcOffset;
use tracing::{info, warn};

use crate::state::{DEFAULT_SWEEP_CONCURRENCY, Settings};

/// Default location on disk where the daemon looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/lifecycle.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PICKUP_LIFECYCLE_CONFIG_PATH";
/// Singapore time; listings are entered in local wall-clock time.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 480;
const DEFAULT_EXPIRY_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 10 * 60;
const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Listing store backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// MongoDB, configured through `MONGO_URI`.
    Mongo,
    /// Process-local store, for development runs.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration.
pub struct AppConfig {
    /// Channel holding the public announcements.
    pub announcement_channel: Option<String>,
    /// Offset of listing wall-clock times from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Period of the expiry sweep.
    pub expiry_interval: Duration,
    /// Period of the membership reconciliation pass.
    pub reconcile_interval: Duration,
    /// Listings processed concurrently by one sweep.
    pub sweep_concurrency: usize,
    /// Port of the health endpoint.
    pub health_port: u16,
    /// Listing store backend.
    pub store: StoreKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            announcement_channel: None,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            expiry_interval: Duration::from_secs(DEFAULT_EXPIRY_INTERVAL_SECS),
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            sweep_concurrency: DEFAULT_SWEEP_CONCURRENCY,
            health_port: DEFAULT_HEALTH_PORT,
            store: StoreKind::Mongo,
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk and the process environment, falling back to defaults.
    pub fn load() -> Self {
        Self::load_file().with_env(|key| env::var(key).ok())
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply `ANNOUNCEMENT_CHANNEL` and `PORT` overrides.
    fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(channel) = lookup("ANNOUNCEMENT_CHANNEL").filter(|value| !value.trim().is_empty()) {
            self.announcement_channel = Some(channel);
        }
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.health_port = port,
                Err(err) => warn!(value = %port, error = %err, "ignoring invalid PORT"),
            }
        }
        self
    }

    /// Offset used to interpret listing dates, defaulting to UTC+8 when out of range.
    pub fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(
            |err| {
                warn!(
                    minutes = self.utc_offset_minutes,
                    error = %err,
                    "invalid utc offset; using default"
                );
                UtcOffset::from_whole_seconds(DEFAULT_UTC_OFFSET_MINUTES * 60)
                    .unwrap_or(UtcOffset::UTC)
            },
        )
    }

    /// Service settings derived from this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            announcement_channel: self.announcement_channel.clone(),
            sweep_concurrency: self.sweep_concurrency.max(1),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    announcement_channel: Option<String>,
    utc_offset_minutes: Option<i32>,
    expiry_interval_secs: Option<u64>,
    reconcile_interval_secs: Option<u64>,
    sweep_concurrency: Option<usize>,
    health_port: Option<u16>,
    store: Option<StoreKind>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            announcement_channel: value.announcement_channel,
            utc_offset_minutes: value.utc_offset_minutes.unwrap_or(defaults.utc_offset_minutes),
            expiry_interval: value
                .expiry_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_interval),
            reconcile_interval: value
                .reconcile_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
            sweep_concurrency: value.sweep_concurrency.unwrap_or(defaults.sweep_concurrency),
            health_port: value.health_port.unwrap_or(defaults.health_port),
            store: value.store.unwrap_or(defaults.store),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use time::macros::offset;

    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(parse("{}"), AppConfig::default());
        assert_eq!(AppConfig::default().utc_offset(), offset!(+8));
    }

    #[test]
    fn file_values_override_defaults() {
        let config = parse(
            r#"{
                "announcement_channel": "@pickup_games",
                "utc_offset_minutes": -300,
                "expiry_interval_secs": 900,
                "reconcile_interval_secs": 0,
                "sweep_concurrency": 2,
                "store": "memory"
            }"#,
        );

        assert_eq!(config.announcement_channel.as_deref(), Some("@pickup_games"));
        assert_eq!(config.utc_offset(), offset!(-5));
        assert_eq!(config.expiry_interval, Duration::from_secs(900));
        assert_eq!(config.reconcile_interval, Duration::from_secs(600));
        assert_eq!(config.settings().sweep_concurrency, 2);
        assert_eq!(config.store, StoreKind::Memory);
    }

    #[test]
    fn environment_overrides_file() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("ANNOUNCEMENT_CHANNEL", "@override"), ("PORT", "9090")]);
        let config = parse(r#"{"announcement_channel": "@file"}"#)
            .with_env(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.announcement_channel.as_deref(), Some("@override"));
        assert_eq!(config.health_port, 9090);
    }

    #[test]
    fn invalid_port_is_ignored() {
        let config = AppConfig::default().with_env(|key| (key == "PORT").then(|| "http".to_owned()));
        assert_eq!(config.health_port, DEFAULT_HEALTH_PORT);
    }

    #[test]
    fn out_of_range_offset_falls_back() {
        let config = AppConfig {
            utc_offset_minutes: 100 * 60,
            ..AppConfig::default()
        };
        assert_eq!(config.utc_offset(), offset!(+8));
    }
}
