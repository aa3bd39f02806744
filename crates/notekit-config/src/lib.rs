use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Options recognized by an editing session.
///
/// Every key is optional in the TOML file; missing keys take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of snapshots kept in the undo history
    pub history_limit: usize,
    /// Text length ceiling for insertions, 0 disables the check
    pub max_text_length: usize,
    /// Record a history snapshot per keystroke instead of per command
    pub record_every_keystroke: bool,
    /// Number of spaces inserted by `tab`, 0 disables tab handling
    pub tab_size: usize,
    pub tab_disable: bool,
    /// Dispatch the built-in key map instead of passing keys through
    pub shortcuts: bool,
    /// Apply character formatting as styled spans rather than tags
    pub style_with_css: bool,
    pub link_add_no_referrer: bool,
    pub link_add_no_opener: bool,
    /// Largest image file (bytes) accepted for data URL insertion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_image_file_size: Option<u64>,
    pub spell_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: 200,
            max_text_length: 0,
            record_every_keystroke: false,
            tab_size: 4,
            tab_disable: false,
            shortcuts: true,
            style_with_css: false,
            link_add_no_referrer: false,
            link_add_no_opener: false,
            maximum_image_file_size: None,
            spell_check: true,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config = Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::ConfigParseError { source, .. } => ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Parse and validate options from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|source| ConfigError::ConfigParseError {
                config_path: PathBuf::new(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must keep at least one snapshot".to_string(),
            });
        }
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/notekit");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/notekit/config.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.history_limit, 200);
        assert_eq!(config.max_text_length, 0);
        assert_eq!(config.tab_size, 4);
        assert!(config.shortcuts);
        assert!(!config.record_every_keystroke);
        assert_eq!(config.maximum_image_file_size, None);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = Config {
            history_limit: 10,
            maximum_image_file_size: Some(1024),
            ..Config::default()
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("max_text_length = 500\nshortcuts = false\n").unwrap();

        assert_eq!(config.max_text_length, 500);
        assert!(!config.shortcuts);
        assert_eq!(config.history_limit, 200);
    }

    #[test]
    fn test_zero_history_limit_rejected() {
        let result = Config::from_toml_str("history_limit = 0");

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "history_limit",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "history_limit = \"many\"").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        match err {
            ConfigError::ConfigParseError { config_path, .. } => assert_eq!(config_path, config_file),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            history_limit: 3,
            record_every_keystroke: true,
            ..Config::default()
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }
}
