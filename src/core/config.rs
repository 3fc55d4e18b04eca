use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateServiceConfig {
    pub base_url: String,
}

/// Static rates keyed `"FROM/TO"`, e.g. `"INR/USD": 0.012`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FixedRatesConfig {
    #[serde(default)]
    pub rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub rate_service: Option<RateServiceConfig>,
    pub fixed: Option<FixedRatesConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            rate_service: None,
            fixed: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Display currency every report is converted into.
    pub currency: String,
    /// YAML or JSON export of the entity service. Relative paths resolve
    /// against the config file's directory.
    pub snapshot_path: String,
    pub default_project: Option<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "marginal", "marginal")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let snapshot = PathBuf::from(&config.snapshot_path);
        if snapshot.is_relative() {
            if let Some(dir) = path.parent() {
                config.snapshot_path = dir.join(snapshot).to_string_lossy().into_owned();
            }
        }
        debug!("Successfully loaded config");
        Ok(config)
    }
}
