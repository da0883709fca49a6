use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::session::{
    SessionTiming, DEFAULT_INACTIVITY_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TARGET_SECS,
    DEFAULT_WARNING_FRACTION,
};
use crate::util::duration_from_secs;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub inactivity_secs: f64,
    pub target_secs: f64,
    pub poll_interval_ms: u64,
    pub warning_fraction: f64,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub environment: String,
    pub owner_id: Option<String>,
    pub keylog_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inactivity_secs: DEFAULT_INACTIVITY_SECS,
            target_secs: DEFAULT_TARGET_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            warning_fraction: DEFAULT_WARNING_FRACTION,
            api_url: None,
            api_key: None,
            environment: "development".to_string(),
            owner_id: None,
            keylog_dir: None,
        }
    }
}

impl Config {
    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            inactivity_deadline: duration_from_secs(self.inactivity_secs),
            target_duration: duration_from_secs(self.target_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            warning_fraction: self.warning_fraction.clamp(0.0, 1.0),
        }
    }

    /// Apply `ANKY_*` environment variables on top of the stored values
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("ANKY_API_URL") {
            self.api_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(key) = non_empty("ANKY_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(env) = non_empty("ANKY_ENVIRONMENT") {
            self.environment = env;
        }
        if let Some(owner) = non_empty("ANKY_OWNER_ID") {
            self.owner_id = Some(owner);
        }
        if let Some(dir) = non_empty("ANKY_KEYLOG_DIR") {
            self.keylog_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable config falls back to defaults
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring invalid config");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(cfg)?)?;
        Ok(())
    }
}
