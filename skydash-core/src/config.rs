use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env, fs, path::PathBuf};

use crate::model::Coordinates;

/// Environment variable that overrides the stored conditions API key.
pub const API_KEY_ENV: &str = "WEATHERSTACK_API_KEY";

/// Provider id of the current-conditions service in `[providers]`.
pub const CONDITIONS_PROVIDER: &str = "weatherstack";

pub const DEFAULT_CITY: &str = "London";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Base URLs of the upstream services. Each defaults to the public host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub current: String,
    pub geocoding: String,
    pub forecast: String,
    pub archive: String,
    pub air_quality: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            current: "http://api.weatherstack.com".to_string(),
            geocoding: "https://geocoding-api.open-meteo.com".to_string(),
            forecast: "https://api.open-meteo.com".to_string(),
            archive: "https://archive-api.open-meteo.com".to_string(),
            air_quality: "https://air-quality-api.open-meteo.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one host, e.g. a local mock server.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            current: base.clone(),
            geocoding: base.clone(),
            forecast: base.clone(),
            archive: base.clone(),
            air_quality: base,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// City loaded when no query is given.
    pub default_city: Option<String>,

    /// Example TOML:
    /// [providers.weatherstack]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub endpoints: Endpoints,

    /// Coordinates reported by location detection.
    pub home: Option<Coordinates>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        if let Some(home) = cfg.home {
            Coordinates::new(home.latitude, home.longitude)
                .map_err(|e| anyhow!("Invalid [home] coordinates: {e}"))?;
        }
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "skydash", "skydash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted preferences.
    pub fn preferences_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("preferences.json"))
    }

    pub fn default_city(&self) -> &str {
        self.default_city.as_deref().unwrap_or(DEFAULT_CITY)
    }

    /// Set or replace the conditions provider API key.
    pub fn set_conditions_api_key(&mut self, api_key: String) {
        self.providers.insert(CONDITIONS_PROVIDER.to_string(), ProviderConfig { api_key });
    }

    /// API key for the conditions provider; the environment wins over the file.
    pub fn conditions_api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.stored_conditions_api_key().map(str::to_owned))
    }

    pub fn stored_conditions_api_key(&self) -> Option<&str> {
        self.providers
            .get(CONDITIONS_PROVIDER)
            .map(|cfg| cfg.api_key.as_str())
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.default_city(), "London");
        assert_eq!(cfg.endpoints, Endpoints::default());
        assert!(cfg.home.is_none());
        assert!(cfg.stored_conditions_api_key().is_none());
    }

    #[test]
    fn parses_full_config() {
        let cfg = Config::from_toml(
            r#"
            default_city = "Oslo"

            [providers.weatherstack]
            api_key = "KEY"

            [endpoints]
            forecast = "http://localhost:9000"

            [home]
            latitude = 59.91
            longitude = 10.75
            "#,
        )
        .unwrap();

        assert_eq!(cfg.default_city(), "Oslo");
        assert_eq!(cfg.stored_conditions_api_key(), Some("KEY"));
        assert_eq!(cfg.endpoints.forecast, "http://localhost:9000");
        assert_eq!(cfg.endpoints.archive, Endpoints::default().archive);
        assert_eq!(cfg.home.unwrap().latitude, 59.91);
    }

    #[test]
    fn rejects_out_of_range_home() {
        let err = Config::from_toml("[home]\nlatitude = 120.0\nlongitude = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("Invalid [home] coordinates"));
    }

    #[test]
    fn set_conditions_api_key_replaces() {
        let mut cfg = Config::default();
        cfg.set_conditions_api_key("OLD".into());
        cfg.set_conditions_api_key("NEW".into());
        assert_eq!(cfg.stored_conditions_api_key(), Some("NEW"));
    }

    #[test]
    fn endpoints_all_trims_trailing_slash() {
        let e = Endpoints::all("http://127.0.0.1:1234/");
        assert_eq!(e.current, "http://127.0.0.1:1234");
        assert_eq!(e.air_quality, "http://127.0.0.1:1234");
    }

    #[test]
    fn roundtrips_through_toml() {
        let mut cfg = Config { default_city: Some("Lima".into()), ..Config::default() };
        cfg.set_conditions_api_key("K".into());
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.default_city(), "Lima");
        assert_eq!(back.stored_conditions_api_key(), Some("K"));
    }
}
