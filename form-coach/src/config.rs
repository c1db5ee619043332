// Form Coach - Coach configuration
// Persisted as JSON under the user data directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::debounce::{NotificationDebouncer, DEFAULT_NOTIFY_INTERVAL};
use crate::joints::Side;

/// Current config version - bump when defaults change to drop stale files
const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not find config path")]
    NoConfigPath,
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub config_version: u32,

    /// Minimum gap between spoken notifications
    pub notify_interval_ms: u64,

    /// Side of the body whose joints are tracked
    pub side: Side,

    /// Speak feedback (on-screen feedback is always shown)
    pub voice_enabled: bool,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            notify_interval_ms: DEFAULT_NOTIFY_INTERVAL.as_millis() as u64,
            side: Side::Left,
            voice_enabled: true,
        }
    }
}

impl CoachConfig {
    const CONFIG_PATH: &'static str = "form-coach/coach_config.json";

    /// Load from the user data directory, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_or_default(&path),
            _ => Self::default(),
        }
    }

    /// Load from `path`, falling back to defaults when the file is missing,
    /// unreadable or from an older config version
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) if config.config_version < CONFIG_VERSION => {
                log::info!(
                    "[Config] version {} < {} - resetting to defaults",
                    config.config_version,
                    CONFIG_VERSION
                );
                Self::default()
            }
            Ok(config) => config,
            Err(e) => {
                log::warn!("[Config] using defaults, {:?} unusable: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigPath)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join(Self::CONFIG_PATH))
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.notify_interval_ms)
    }

    pub fn debouncer(&self) -> NotificationDebouncer {
        NotificationDebouncer::new(self.notify_interval())
    }
}
