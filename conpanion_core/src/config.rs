//! Configuration file support for Conpanion.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/conpanion/config.toml`.

use crate::metabolism::GYM_SESSION_MET;
use crate::{Error, Result, UserId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub workout: WorkoutConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Active identity; without one, user operations are refused
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Live workout parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutConfig {
    #[serde(default = "default_rest_seconds")]
    pub default_rest_seconds: u32,

    #[serde(default = "default_met_value")]
    pub met_value: f64,
}

impl Default for WorkoutConfig {
    fn default() -> Self {
        Self {
            default_rest_seconds: default_rest_seconds(),
            met_value: default_met_value(),
        }
    }
}

// Default value functions
fn home_dir_or_current() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir_or_current().join(".local/share"));
    base.join("conpanion")
}

fn default_rest_seconds() -> u32 {
    60
}

fn default_met_value() -> f64 {
    GYM_SESSION_MET
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_or_current().join(".config"));
        base.join("conpanion").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workout.default_rest_seconds == 0 {
            return Err(Error::Config(
                "workout.default_rest_seconds must be at least 1".into(),
            ));
        }
        if !self.workout.met_value.is_finite() || self.workout.met_value <= 0.0 {
            return Err(Error::Config(format!(
                "workout.met_value must be positive, got {}",
                self.workout.met_value
            )));
        }
        if matches!(&self.user.id, Some(id) if id.trim().is_empty()) {
            return Err(Error::Config("user.id cannot be blank".into()));
        }
        Ok(())
    }

    /// The configured user, if any
    pub fn user_id(&self) -> Option<UserId> {
        self.user.id.as_deref().map(UserId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.workout.default_rest_seconds, 60);
        assert_eq!(config.workout.met_value, 6.0);
        assert!(config.user_id().is_none());
        assert!(config.data.data_dir.ends_with("conpanion"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.user.id = Some("u1".into());
        config.workout.default_rest_seconds = 90;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.user_id(), Some(UserId::new("u1")));
        assert_eq!(loaded.workout.default_rest_seconds, 90);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[workout]
default_rest_seconds = 120
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workout.default_rest_seconds, 120);
        assert_eq!(config.workout.met_value, 6.0); // default
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        for toml_str in [
            "[workout]\ndefault_rest_seconds = 0\n",
            "[workout]\nmet_value = 0.0\n",
            "[user]\nid = \"  \"\n",
        ] {
            let config: Config = toml::from_str(toml_str).unwrap();
            assert!(matches!(config.validate(), Err(Error::Config(_))));
        }
    }
}
