use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::{info, warn};

use crate::{
    location::{self, DEFAULT_CITY, LocationRecord},
    provider::cwa::{CwaProvider, DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
    sun::{SolarCalculator, SunSchedule, SunriseTable},
};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "CWA_API_KEY";

/// Settings persisted between runs.
///
/// Example TOML:
/// ```toml
/// api_key = "CWA-XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"
/// city_name = "臺北市"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// CWA open-data authorization key.
    pub api_key: Option<String>,

    /// City chosen on the settings screen.
    pub city_name: Option<String>,

    /// Override for the datastore base URL.
    pub base_url: Option<String>,

    pub request_timeout_secs: Option<u64>,

    /// Optional sunrise/sunset table; sun times are computed when absent.
    pub sunrise_table: Option<PathBuf>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("tw", "cwa-weather", "cwa-weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Persisted city, falling back to the default city.
    pub fn city_name_or_default(&self) -> &str {
        self.city_name.as_deref().unwrap_or(DEFAULT_CITY)
    }

    /// Resolve the persisted city against the location table.
    pub fn location(&self) -> Result<&'static LocationRecord> {
        Ok(location::resolve(self.city_name_or_default())?)
    }

    /// Store a city after checking that it is supported.
    pub fn set_city(&mut self, city_name: &str) -> Result<&'static LocationRecord> {
        let loc = location::resolve(city_name)?;
        self.city_name = Some(loc.city_name.to_string());
        Ok(loc)
    }

    /// API key from `CWA_API_KEY`, or the stored one.
    pub fn api_key(&self) -> Result<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Result<String> {
        env_value
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| {
                anyhow!(
                    "No CWA API key configured.\n\
                     Hint: run `cwa-weather configure` or set {API_KEY_ENV}."
                )
            })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

/// Construct the CWA provider from config.
pub fn provider_from_config(config: &Config) -> Result<CwaProvider> {
    let api_key = config.api_key()?;
    CwaProvider::with_options(api_key, config.base_url(), config.request_timeout())
        .context("Failed to build HTTP client")
}

/// Sunrise table from config, or the solar calculator when none is set.
pub fn sun_schedule_from_config(config: &Config) -> Result<Box<dyn SunSchedule>> {
    match &config.sunrise_table {
        Some(path) => {
            let table = SunriseTable::load(path).with_context(|| {
                format!("Failed to load sunrise table: {}", path.display())
            })?;
            if table.is_empty() {
                warn!(path = %path.display(), "sunrise table is empty, every moment is day");
            } else {
                info!(path = %path.display(), entries = table.len(), "loaded sunrise table");
            }
            Ok(Box::new(table))
        }
        None => Ok(Box::new(SolarCalculator)),
    }
}
