//! Settings management.
//!
//! Settings are stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/dualnode/settings.toml` (or `~/.config/...`)
//! - Windows: `%APPDATA%/dualnode/settings.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Address-format value meaning "use the chain's own".
pub const PREFIX_USE_CHAIN: i32 = -1;

/// Errors from loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Node connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Primary node WebSocket endpoint. Empty disables the primary chain.
    #[serde(default)]
    pub api_url: String,

    /// Secondary node WebSocket endpoint. Empty disables the secondary chain.
    #[serde(default)]
    pub secondary_api_url: String,

    /// Manual ss58 address format, or `-1` to use the chain's.
    #[serde(default = "default_prefix")]
    pub prefix: i32,

    /// Display unit used when the chain reports no token symbol.
    #[serde(default = "default_unit")]
    pub default_unit: String,

    /// Origin name presented to wallet extensions.
    #[serde(default = "default_extension_origin")]
    pub extension_origin: String,

    /// Persisted type overrides file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types_path: Option<PathBuf>,

    /// Backing directory for the key store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyring_path: Option<PathBuf>,
}

fn default_prefix() -> i32 {
    PREFIX_USE_CHAIN
}

fn default_unit() -> String {
    "UNIT".into()
}

fn default_extension_origin() -> String {
    "dualnode".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            secondary_api_url: String::new(),
            prefix: default_prefix(),
            default_unit: default_unit(),
            extension_origin: default_extension_origin(),
            types_path: None,
            keyring_path: None,
        }
    }
}

impl Settings {
    /// Loads settings from the default path, creating it if not found.
    pub fn load() -> Result<Self, SettingsError> {
        let path = default_path().ok_or(SettingsError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let settings = Settings::default();
            settings.save_to(&path)?;
            Ok(settings)
        }
    }

    /// Loads settings from a file.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Saves settings to the default path.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Saves settings to a file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Primary node URL, or `None` when unset.
    pub fn primary_endpoint(&self) -> Option<&str> {
        non_empty(&self.api_url)
    }

    /// Secondary node URL, or `None` when unset. The secondary chain is optional.
    pub fn secondary_endpoint(&self) -> Option<&str> {
        non_empty(&self.secondary_api_url)
    }

    /// Manually configured address format, if any.
    ///
    /// `-1` means "use the chain default"; out-of-range values are ignored.
    pub fn manual_ss58(&self) -> Option<u16> {
        if self.prefix == PREFIX_USE_CHAIN {
            return None;
        }
        u16::try_from(self.prefix).ok()
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s) }
}

/// Returns the default settings file path.
pub fn default_path() -> Option<PathBuf> {
    app_dir().map(|d| d.join("settings.toml"))
}

/// Returns the application's directory inside the platform config dir.
pub fn app_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("dualnode"))
}

/// Returns the platform-specific config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
