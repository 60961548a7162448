//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::hotkey::VirtualKey;

/// Environment variable overriding the settings file location
const CONFIG_ENV: &str = "SWITCHER_CONFIG";

/// Errors from loading, validating or saving hotkey settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read or write settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("initiator {initiator} and modifier {modifier} overlap")]
    OverlappingKeys {
        initiator: VirtualKey,
        modifier: VirtualKey,
    },
}

/// Gesture hotkey settings
///
/// One value is read per gesture; see [`ConfigHandle`] for how it is swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotkeyConfig {
    /// Key held to begin a gesture
    pub initiator: VirtualKey,
    /// Key tapped or held while the initiator is down
    pub modifier: VirtualKey,
    /// Longest first modifier release that still counts as a tap
    pub tap_timeout_ms: u64,
    /// Pause after the last tap that turns a tap gesture into the overlay
    pub overlay_timeout_ms: u64,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            initiator: VirtualKey::LMENU,
            modifier: VirtualKey::LSHIFT,
            tap_timeout_ms: 300,
            overlay_timeout_ms: 500,
        }
    }
}

impl HotkeyConfig {
    /// Check the timeouts and that the two keys are physically distinct
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tap_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("tapTimeoutMs"));
        }
        if self.overlay_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("overlayTimeoutMs"));
        }
        if self.initiator.overlaps(self.modifier) {
            return Err(ConfigError::OverlappingKeys {
                initiator: self.initiator,
                modifier: self.modifier,
            });
        }
        Ok(())
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the JSON hotkey settings file
    pub settings_path: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Self {
        let settings_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_settings_path);

        Self { settings_path }
    }

    /// Read hotkey settings, falling back to defaults when the file is absent
    pub fn load_hotkeys(&self) -> Result<HotkeyConfig, ConfigError> {
        load_hotkeys_from(&self.settings_path)
    }

    /// Last modification time of the settings file, if it exists
    pub fn settings_modified(&self) -> Option<std::time::SystemTime> {
        std::fs::metadata(&self.settings_path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Persist hotkey settings as pretty-printed JSON
    pub fn save_hotkeys(&self, hotkeys: &HotkeyConfig) -> Result<(), ConfigError> {
        hotkeys.validate()?;
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(hotkeys)?;
        std::fs::write(&self.settings_path, json)?;
        info!(path = ?self.settings_path, "hotkey settings saved");
        Ok(())
    }
}

/// %APPDATA%/Switcher/config.json, or the working directory without APPDATA
fn default_settings_path() -> PathBuf {
    let base = std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("Switcher").join("config.json")
}

fn load_hotkeys_from(path: &Path) -> Result<HotkeyConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "no settings file, using defaults");
            return Ok(HotkeyConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    let hotkeys: HotkeyConfig = serde_json::from_str(&contents)?;
    hotkeys.validate()?;
    Ok(hotkeys)
}

/// Shared, hot-swappable hotkey settings
///
/// Readers take a whole `Arc` snapshot, so the hook thread never observes
/// a half-updated value while the settings surface publishes a new one.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<HotkeyConfig>>>,
    rx: watch::Receiver<Arc<HotkeyConfig>>,
}

impl ConfigHandle {
    /// Create a handle holding the given settings
    pub fn new(hotkeys: HotkeyConfig) -> Self {
        let (tx, rx) = watch::channel(Arc::new(hotkeys));
        Self { tx: Arc::new(tx), rx }
    }

    /// Current settings
    pub fn snapshot(&self) -> Arc<HotkeyConfig> {
        Arc::clone(&*self.rx.borrow())
    }

    /// Validate and publish new settings
    ///
    /// Gestures already in progress finish with the settings they started with.
    pub fn replace(&self, hotkeys: HotkeyConfig) -> Result<(), ConfigError> {
        hotkeys.validate()?;
        self.tx.send_replace(Arc::new(hotkeys));
        info!(?hotkeys, "hotkey settings replaced");
        Ok(())
    }
}
