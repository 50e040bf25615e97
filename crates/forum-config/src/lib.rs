//! Configuration for the forum mod system
//!
//! The configuration lives in a TOML file (`forum.toml`). Only the `[mods]`
//! table is consumed by the mod extension system:
//!
//! ```toml
//! [mods]
//! dir = "mods"
//! installed = ["approve_topic", "...", "last_post"]
//! disabled = ["polls"]
//! fail_on_missing_required = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker in the load order that stands for "every other discovered mod"
pub const LOAD_REST_MARKER: &str = "...";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "FORUM_CONFIG";

/// Default name of the plugin directory, relative to the application root
pub const DEFAULT_MODS_DIR: &str = "mods";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Settings consumed by the mod loader and installer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ModsConfig {
    /// Directory holding mod units; relative paths resolve against the app root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Load order. Names before `...` load first, names after it load last,
    /// and `...` itself loads every other discovered mod alphabetically.
    pub installed: Vec<String>,
    /// Mods present in the directory that must not be loaded
    pub disabled: Vec<String>,
    /// Abort startup when a required mod is missing instead of skipping the dependent
    pub fail_on_missing_required: bool,
}

impl Default for ModsConfig {
    fn default() -> Self {
        ModsConfig {
            dir: None,
            installed: vec![LOAD_REST_MARKER.to_string()],
            disabled: Vec::new(),
            fail_on_missing_required: false,
        }
    }
}

impl ModsConfig {
    /// Resolve the plugin directory against the application root
    pub fn resolve_dir(&self, app_root: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => app_root.join(dir),
            None => app_root.join(DEFAULT_MODS_DIR),
        }
    }

    /// Whether the load order auto-loads unlisted mods
    pub fn loads_rest(&self) -> bool {
        self.installed.iter().any(|name| name == LOAD_REST_MARKER)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub mods: ModsConfig,
}

impl Config {
    pub fn path() -> PathBuf {
        // Honor explicit override via FORUM_CONFIG for tests / isolated runs.
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir().map_or_else(
                || PathBuf::from(".config/forum/forum.toml"),
                |h| h.join(".config").join("forum").join("forum.toml"),
            )
        }

        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map_or_else(
                || PathBuf::from("config\\forum\\forum.toml"),
                |c| c.join("forum").join("forum.toml"),
            )
        }
    }

    /// Load from the default location, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "mods.dir" => self.mods.dir.as_ref().map(|d| d.display().to_string()),
            "mods.installed" => Some(self.mods.installed.join(",")),
            "mods.disabled" => Some(self.mods.disabled.join(",")),
            "mods.fail-on-missing-required" => Some(self.mods.fail_on_missing_required.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "mods.dir" => self.mods.dir = Some(PathBuf::from(value)),
            "mods.installed" => self.mods.installed = split_list(value),
            "mods.disabled" => self.mods.disabled = split_list(value),
            "mods.fail-on-missing-required" => {
                self.mods.fail_on_missing_required =
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn values_iter(&self) -> Vec<(&str, String)> {
        let mut values = Vec::new();
        if let Some(ref dir) = self.mods.dir {
            values.push(("mods.dir", dir.display().to_string()));
        }
        values.push(("mods.installed", self.mods.installed.join(",")));
        values.push(("mods.disabled", self.mods.disabled.join(",")));
        values.push((
            "mods.fail-on-missing-required",
            self.mods.fail_on_missing_required.to_string(),
        ));
        values
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.mods.installed, vec!["...".to_string()]);
        assert!(config.mods.disabled.is_empty());
        assert!(!config.mods.fail_on_missing_required);
        assert!(config.mods.loads_rest());
    }

    #[test]
    fn test_config_set_get() {
        let mut config = Config::default();
        config.set("mods.installed", "a, b,...,z").unwrap();
        assert_eq!(config.mods.installed, vec!["a", "b", "...", "z"]);
        assert_eq!(config.get("mods.installed"), Some("a,b,...,z".to_string()));
    }

    #[test]
    fn test_config_unknown_key() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("unknown-key", "value"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert_eq!(config.get("unknown-key"), None);
    }

    #[test]
    fn test_config_invalid_bool() {
        let mut config = Config::default();
        let err = config
            .set("mods.fail-on-missing-required", "maybe")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value 'maybe' for 'mods.fail-on-missing-required'"
        );
    }

    #[test]
    fn test_resolve_dir() {
        let root = Path::new("/srv/forum");
        let mut mods = ModsConfig::default();
        assert_eq!(mods.resolve_dir(root), PathBuf::from("/srv/forum/mods"));
        mods.dir = Some(PathBuf::from("plugins"));
        assert_eq!(mods.resolve_dir(root), PathBuf::from("/srv/forum/plugins"));
        mods.dir = Some(PathBuf::from("/opt/mods"));
        assert_eq!(mods.resolve_dir(root), PathBuf::from("/opt/mods"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.toml");
        fs::write(&path, "[mods]\ndisabled = [\"polls\"]\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.mods.disabled, vec!["polls"]);
        assert_eq!(config.mods.installed, vec!["..."]);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forum.toml");
        let mut config = Config::default();
        config.set("mods.fail-on-missing-required", "true").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
