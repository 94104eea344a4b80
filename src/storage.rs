use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::models::FavoriteCity;

pub const LAST_SEARCHED_CITY_KEY: &str = "lastSearchedCity";
pub const SEARCH_HISTORY_KEY: &str = "searchHistory";
pub const FAVORITE_CITIES_KEY: &str = "favoriteCities";

const SEARCH_HISTORY_LIMIT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-per-key UTF-8 storage under a single directory.
///
/// Corrupt entries are recovered by discarding the value and clearing the
/// key; readers always get a usable default.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage rooted in the user's local data directory.
    pub fn default_location() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("weather-tracker"))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.root.join(key)) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read storage key {}: {}", key, e);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.root.join(key), value)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = fs::remove_file(self.root.join(key)) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove storage key {}: {}", key, e);
            }
        }
    }

    /// Favorites as persisted, or an empty set. Corrupt content is
    /// discarded and the key cleared.
    pub fn load_favorites(&self) -> Vec<FavoriteCity> {
        let Some(raw) = self.get(FAVORITE_CITIES_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<FavoriteCity>>(&raw) {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!("Discarding corrupt favorites entry: {}", e);
                self.remove(FAVORITE_CITIES_KEY);
                Vec::new()
            }
        }
    }

    pub fn save_favorites(&self, favorites: &[FavoriteCity]) -> Result<(), StorageError> {
        self.set(FAVORITE_CITIES_KEY, &serde_json::to_string(favorites)?)
    }

    pub fn load_last_city(&self) -> Option<String> {
        self.get(LAST_SEARCHED_CITY_KEY)
            .map(|city| city.trim().to_string())
            .filter(|city| !city.is_empty())
    }

    pub fn save_last_city(&self, city: &str) -> Result<(), StorageError> {
        self.set(LAST_SEARCHED_CITY_KEY, city)
    }

    /// Recent searches, most recent first. Corrupt content is discarded
    /// and the key cleared.
    pub fn load_search_history(&self) -> Vec<String> {
        let Some(raw) = self.get(SEARCH_HISTORY_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(history) => history,
            Err(e) => {
                warn!("Discarding corrupt search history entry: {}", e);
                self.remove(SEARCH_HISTORY_KEY);
                Vec::new()
            }
        }
    }

    /// Move `city` to the front of the history, keeping entries distinct
    /// and capped at the five most recent.
    pub fn record_search(&self, city: &str) -> Result<(), StorageError> {
        let mut history = self.load_search_history();
        history.retain(|entry| entry != city);
        history.insert(0, city.to_string());
        history.truncate(SEARCH_HISTORY_LIMIT);
        debug!("Search history now holds {} entries", history.len());
        self.set(SEARCH_HISTORY_KEY, &serde_json::to_string(&history)?)
    }
}
