use std::path::Path;
use serde::Deserialize;
use anyhow::{Context, Result};
use diont::DiontConfig;
use shared::types::ServiceRecord;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: DiontConfig,
    #[serde(default)]
    pub announce: AnnounceConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Services announced at startup. `host` may be left out.
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnounceConfig {
    /// 0 disables periodic re-announcement
    #[serde(default = "default_repeat_interval")]
    pub repeat_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_repeat_interval() -> u64 {
    30
}

fn default_history_len() -> usize {
    256
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            repeat_interval_secs: default_repeat_interval(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history_len: default_history_len(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}
