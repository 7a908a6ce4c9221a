use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tokio::fs;
use tracing::warn;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "FLEETDECK_CONFIG";
pub const TOKEN_ENV: &str = "FLEETDECK_API_TOKEN";
const DEFAULT_CONFIG_PATH: &str = "fleetdeck.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api: ApiConf,
    pub poller: PollerConf,
    pub monitor: MonitorConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConf {
    pub base_url: String,
    /// Path prefix in front of every endpoint, e.g. `/api/v1`.
    pub prefix: String,
    pub timeout_secs: u64,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PollerConf {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConf {
    pub interval_ms: u64,
    pub online_within_secs: i64,
    pub warning_within_secs: i64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api: ApiConf::default(),
            poller: PollerConf::default(),
            monitor: MonitorConf::default(),
        }
    }
}

impl Default for ApiConf {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            prefix: "/api/v1".into(),
            timeout_secs: 10,
            token: None,
        }
    }
}

impl Default for PollerConf {
    fn default() -> Self {
        Self { interval_ms: 2_000, max_attempts: 300 }
    }
}

impl Default for MonitorConf {
    fn default() -> Self {
        Self { interval_ms: 5_000, online_within_secs: 10, warning_within_secs: 30 }
    }
}

impl PollerConf {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl MonitorConf {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ConsoleConfig {
    /// Strict parse, used for explicit files and tests.
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: ConsoleConfig = serde_yaml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path).await?;
        Self::from_yaml_str(&txt)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        if self.poller.interval_ms == 0 || self.monitor.interval_ms == 0 {
            return Err(ConfigError::Invalid("polling intervals must be > 0".into()));
        }
        if self.poller.max_attempts == 0 {
            return Err(ConfigError::Invalid("poller.max_attempts must be > 0".into()));
        }
        if self.monitor.warning_within_secs < self.monitor.online_within_secs {
            return Err(ConfigError::Invalid(
                "monitor.warning_within_secs must be >= monitor.online_within_secs".into(),
            ));
        }
        Ok(())
    }

    /// Environment token wins over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.api.token = Some(token);
            }
        }
        self
    }
}

/// Lenient load: a missing or broken file falls back to defaults with a warning.
pub async fn load_config(explicit: Option<&Path>) -> ConsoleConfig {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::var(CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into())
            .into(),
    };
    let cfg = if path.exists() {
        ConsoleConfig::from_file(&path).await.unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            ConsoleConfig::default()
        })
    } else {
        warn!(path = %path.display(), "no config file, using defaults");
        ConsoleConfig::default()
    };
    cfg.with_env_overrides()
}
