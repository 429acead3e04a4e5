//! Small key/value persistence for unit, theme and recent searches.
//!
//! Reads fall back to defaults on any problem and writes never fail the
//! caller: losing a preference only means starting from the default again.

use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, warn};

use crate::{
    error::WeatherError,
    model::{RecentSearchEntry, RecentSearches, TemperatureUnit, Theme},
};

pub const UNIT_KEY: &str = "weather_app_unit";
pub const THEME_KEY: &str = "weather_app_theme";
pub const RECENTS_KEY: &str = "weather_app_recent_searches";

/// Capability-checked string storage.
pub trait PreferenceStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError>;
}

fn storage_error(e: impl std::fmt::Display) -> WeatherError {
    WeatherError::UnsupportedEnvironment(format!("Preference storage ({e})"))
}

/// A JSON object on disk, rewritten whole on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, WeatherError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(storage_error(e)),
        };
        serde_json::from_str(&contents).map_err(storage_error)
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        let _guard = self.write_lock.lock();

        // A corrupt file is replaced rather than blocking every later write.
        let mut all = self.read_all().unwrap_or_default();
        all.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(storage_error)?;
        }
        let json = serde_json::to_string_pretty(&all).map_err(storage_error)?;
        fs::write(&self.path, json).map_err(storage_error)
    }
}

/// In-process storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = values.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self { values: Mutex::new(values) }
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// For environments without any persistence.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl PreferenceStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, WeatherError> {
        Err(storage_error("unavailable"))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), WeatherError> {
        Err(storage_error("unavailable"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    pub unit: TemperatureUnit,
    pub theme: Theme,
    pub recent_searches: RecentSearches,
}

#[derive(Debug, Clone)]
pub struct PersistedPreferences {
    store: Arc<dyn PreferenceStore>,
}

impl PersistedPreferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Read all preferences; each one falls back to its default independently.
    pub fn load(&self) -> Preferences {
        let unit = self
            .read(UNIT_KEY)
            .and_then(|raw| raw.parse::<TemperatureUnit>().map_err(|e| debug!("{}", e)).ok())
            .unwrap_or_default();

        let theme = self
            .read(THEME_KEY)
            .and_then(|raw| raw.parse::<Theme>().map_err(|e| debug!("{}", e)).ok())
            .unwrap_or_default();

        let recent_searches = self
            .read(RECENTS_KEY)
            .and_then(|raw| {
                serde_json::from_str::<Vec<RecentSearchEntry>>(&raw)
                    .map_err(|e| debug!("Ignoring stored recent searches: {}", e))
                    .ok()
            })
            .map(RecentSearches::from)
            .unwrap_or_default();

        Preferences { unit, theme, recent_searches }
    }

    pub fn save_unit(&self, unit: TemperatureUnit) {
        self.write(UNIT_KEY, unit.as_str());
    }

    pub fn save_theme(&self, theme: Theme) {
        self.write(THEME_KEY, theme.as_str());
    }

    pub fn save_recent_searches(&self, recents: &RecentSearches) {
        match serde_json::to_string(recents) {
            Ok(json) => self.write(RECENTS_KEY, &json),
            Err(e) => warn!("Failed to serialize recent searches: {}", e),
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!(key, "Preference read failed: {}", e);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, "Preference write failed: {}", e);
        }
    }
}
