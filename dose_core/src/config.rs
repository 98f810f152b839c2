//! Configuration file support for mmecalc.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/mmecalc/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub clinical: ClinicalConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Clinical defaults used by the CLI when the user gives no value
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClinicalConfig {
    #[serde(default = "default_prn_percent")]
    pub prn_percent_default: f64,

    #[serde(default = "default_prn_percent_min")]
    pub prn_percent_min: f64,

    #[serde(default = "default_prn_percent_max")]
    pub prn_percent_max: f64,

    #[serde(default = "default_rotation_reduction_standard")]
    pub rotation_reduction_standard: f64,

    #[serde(default = "default_rotation_reduction_conservative")]
    pub rotation_reduction_conservative: f64,
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            prn_percent_default: default_prn_percent(),
            prn_percent_min: default_prn_percent_min(),
            prn_percent_max: default_prn_percent_max(),
            rotation_reduction_standard: default_rotation_reduction_standard(),
            rotation_reduction_conservative: default_rotation_reduction_conservative(),
        }
    }
}

/// Thresholds for the safety review
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_high_total_mme")]
    pub high_total_mme: f64,

    #[serde(default = "default_high_breakthrough_ratio")]
    pub high_breakthrough_ratio: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            high_total_mme: default_high_total_mme(),
            high_breakthrough_ratio: default_high_breakthrough_ratio(),
        }
    }
}

/// Where to load the drug registry from
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// External registry file; the built-in registry is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_prn_percent() -> f64 {
    10.0
}

fn default_prn_percent_min() -> f64 {
    10.0
}

fn default_prn_percent_max() -> f64 {
    15.0
}

fn default_rotation_reduction_standard() -> f64 {
    25.0
}

fn default_rotation_reduction_conservative() -> f64 {
    50.0
}

fn default_high_total_mme() -> f64 {
    200.0
}

fn default_high_breakthrough_ratio() -> u32 {
    20
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

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::Config(errors.join("; ")));
        }

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("mmecalc").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
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

    /// Check that ranges and thresholds make sense
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let clinical = &self.clinical;

        if clinical.prn_percent_min > clinical.prn_percent_max {
            errors.push(format!(
                "prn_percent_min {} > prn_percent_max {}",
                clinical.prn_percent_min, clinical.prn_percent_max
            ));
        }
        if !(clinical.prn_percent_default > 0.0) {
            errors.push(format!(
                "prn_percent_default {} must be > 0",
                clinical.prn_percent_default
            ));
        }
        for (name, value) in [
            ("rotation_reduction_standard", clinical.rotation_reduction_standard),
            ("rotation_reduction_conservative", clinical.rotation_reduction_conservative),
        ] {
            if !(0.0..100.0).contains(&value) {
                errors.push(format!("{} {} must be in [0, 100)", name, value));
            }
        }
        if self.safety.high_breakthrough_ratio > 100 {
            errors.push(format!(
                "high_breakthrough_ratio {} must be <= 100",
                self.safety.high_breakthrough_ratio
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.clinical.prn_percent_default, 10.0);
        assert_eq!(config.clinical.rotation_reduction_standard, 25.0);
        assert_eq!(config.clinical.rotation_reduction_conservative, 50.0);
        assert_eq!(config.safety.high_total_mme, 200.0);
        assert_eq!(config.safety.high_breakthrough_ratio, 20);
        assert!(config.registry.path.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.clinical.prn_percent_max,
            parsed.clinical.prn_percent_max
        );
        assert_eq!(config.safety.high_total_mme, parsed.safety.high_total_mme);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[clinical]
prn_percent_default = 15.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.clinical.prn_percent_default, 15.0);
        assert_eq!(config.clinical.prn_percent_max, 15.0); // default
        assert_eq!(config.safety.high_breakthrough_ratio, 20); // default
    }

    #[test]
    fn test_save_and_load() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.safety.high_total_mme = 120.0;
        config.registry.path = Some(PathBuf::from("/etc/mmecalc/registry.toml"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.safety.high_total_mme, 120.0);
        assert_eq!(
            loaded.registry.path,
            Some(PathBuf::from("/etc/mmecalc/registry.toml"))
        );
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[clinical]\nprn_percent_min = 20.0\nrotation_reduction_standard = 120.0\n",
        )
        .unwrap();

        match Config::load_from(&path) {
            Err(Error::Config(msg)) => {
                assert!(msg.contains("prn_percent_min"));
                assert!(msg.contains("rotation_reduction_standard"));
            }
            other => panic!("Expected config error, got {:?}", other),
        }
    }
}
