use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::state::{clamp_max_length, DEFAULT_MAX_LENGTH};

/// Fallback when neither the environment nor the config file names a backend
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Runtime override for the backend URL
pub const BACKEND_URL_ENV: &str = "KAHANI_BACKEND_URL";

/// Backend URL baked in at build time, if `KAHANI_BACKEND_URL` was set then.
pub fn build_time_backend_url() -> &'static str {
    option_env!("KAHANI_BACKEND_URL").unwrap_or(DEFAULT_BACKEND_URL)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub max_length: u32,
    /// 0 waits forever
    pub stream_idle_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend_url: None,
            max_length: DEFAULT_MAX_LENGTH,
            stream_idle_timeout_secs: 60,
            connect_timeout_secs: 10,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&config_content)?;
        config.max_length = clamp_max_length(config.max_length);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_max_length(max_length: u32) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.max_length = clamp_max_length(max_length);
        config.save()
    }

    /// Resolve the backend URL: explicit override, then the runtime
    /// environment, then the config file, then the build-time default.
    pub fn resolve_backend_url(&self, cli_override: Option<&str>) -> String {
        let env_value = std::env::var(BACKEND_URL_ENV).ok();
        self.resolve_backend_url_with(cli_override, env_value.as_deref())
    }

    fn resolve_backend_url_with(&self, cli_override: Option<&str>, env_value: Option<&str>) -> String {
        [cli_override, env_value, self.backend_url.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| !url.trim().is_empty())
            .unwrap_or_else(|| build_time_backend_url())
            .to_string()
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.stream_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("kahani").join("config.json"))
    }
}
