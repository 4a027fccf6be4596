//! Engine configuration.

use crate::persist::{FileStore, KeyValueStore, MemoryStore};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variables read by [`WeaverConfig::from_env`].
pub const ENV_BASE_URL: &str = "STORYWEAVER_BASE_URL";
pub const ENV_ENDPOINT: &str = "STORYWEAVER_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "STORYWEAVER_TIMEOUT_SECS";
pub const ENV_SEED: &str = "STORYWEAVER_SEED";
pub const ENV_SAVE_DIR: &str = "STORYWEAVER_SAVE_DIR";
pub const ENV_LIVE: &str = "STORYWEAVER_LIVE";

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Configuration for a tale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaverConfig {
    /// Base URL that relative endpoints are joined onto.
    pub base_url: String,

    /// Endpoint used until one is saved in the store.
    pub endpoint: String,

    /// How long a Live DM turn may take before falling back.
    pub timeout: Duration,

    /// Session seed. Random when unset.
    pub seed: Option<u64>,

    /// Directory for the file store. Saves stay in memory when unset.
    pub save_dir: Option<PathBuf>,

    /// Start in live mode.
    pub live: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            base_url: live_dm::DEFAULT_BASE_URL.to_string(),
            endpoint: live_dm::DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(20),
            seed: None,
            save_dir: None,
            live: false,
        }
    }
}

impl WeaverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Read configuration from `STORYWEAVER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`. Unset or blank variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(base_url) = get(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    var: ENV_TIMEOUT_SECS,
                    value: secs,
                })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(seed) = get(ENV_SEED) {
            config.seed = Some(seed.parse().map_err(|_| ConfigError::Invalid {
                var: ENV_SEED,
                value: seed,
            })?);
        }
        if let Some(dir) = get(ENV_SAVE_DIR) {
            config.save_dir = Some(PathBuf::from(dir));
        }
        if let Some(live) = get(ENV_LIVE) {
            config.live = parse_flag(&live).ok_or(ConfigError::Invalid {
                var: ENV_LIVE,
                value: live,
            })?;
        }

        Ok(config)
    }

    /// The store this configuration points at.
    pub fn store(&self) -> Box<dyn KeyValueStore> {
        match &self.save_dir {
            Some(dir) => Box::new(FileStore::new(dir)),
            None => Box::new(MemoryStore::new()),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
