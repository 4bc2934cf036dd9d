//! Configuration loading and management
//!
//! Settings persist as a flat JSON record. A missing or unreadable file
//! falls back to the documented defaults; every field is individually
//! defaulted so partial files from older versions still load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hotkey::keys::{self, HotkeySpec};

/// Persisted daemon settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Modifier virtual-key code, 0 for none
    pub modifier_vk: u32,
    /// Hotkey virtual-key code
    pub hotkey_vk: u32,
    /// Display name matching `modifier_vk`
    pub modifier_name: String,
    /// Display name matching `hotkey_vk`
    pub hotkey_name: String,
    /// Full-batch injection retries after the first attempt
    pub retry_count: u32,
    /// Pause between injection attempts, milliseconds
    pub retry_delay_ms: u64,
    /// Settle time between restoring focus and injecting, milliseconds
    pub focus_restore_delay_ms: u64,
    /// Localhost TCP port for the control channel
    pub control_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            modifier_vk: keys::vk::CONTROL,
            hotkey_vk: keys::vk::BACKTICK,
            modifier_name: "Ctrl".to_string(),
            hotkey_name: "Backtick".to_string(),
            retry_count: 3,
            retry_delay_ms: 100,
            focus_restore_delay_ms: 300,
            control_port: 48119,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults on absence or
    /// any read/parse failure
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(?path, error = %e, "settings file unreadable, using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(?path, error = %e, "settings file unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Write settings to `path` as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Update the hotkey pair, keeping names and codes consistent
    pub fn set_hotkey(&mut self, modifier_vk: u32, hotkey_vk: u32) {
        self.modifier_vk = modifier_vk;
        self.hotkey_vk = hotkey_vk;
        self.modifier_name = keys::vk_name(modifier_vk);
        self.hotkey_name = keys::vk_name(hotkey_vk);
    }

    /// Hotkey description for status output, e.g. `Ctrl+Backtick`
    pub fn hotkey_label(&self) -> String {
        if self.modifier_vk == 0 {
            self.hotkey_name.clone()
        } else {
            format!("{}+{}", self.modifier_name, self.hotkey_name)
        }
    }
}

/// Default location of the settings file
pub fn settings_path() -> PathBuf {
    let base = std::env::var_os("APPDATA")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("keyrelay").join("settings.json")
}

/// Validated, immutable-per-session hotkey and timing parameters
///
/// Built from [`Settings`] at startup. The key pair may later be swapped
/// through [`crate::hotkey::keys::SharedHotkey`]; the timing fields hold
/// for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyConfig {
    pub key_vk: u32,
    pub modifier_vk: u32,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub focus_restore_delay: Duration,
}

impl HotkeyConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        if settings.hotkey_vk == 0 {
            return Err(ConfigError::MissingKey);
        }
        Ok(Self {
            key_vk: settings.hotkey_vk,
            modifier_vk: settings.modifier_vk,
            retry_count: settings.retry_count,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            focus_restore_delay: Duration::from_millis(settings.focus_restore_delay_ms),
        })
    }

    pub fn spec(&self) -> HotkeySpec {
        HotkeySpec {
            key_vk: self.key_vk,
            modifier_vk: self.modifier_vk,
        }
    }
}

/// Errors raised while loading, saving or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("hotkey key code must be non-zero")]
    MissingKey,

    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}
