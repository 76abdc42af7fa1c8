//! Typed user preferences.
//!
//! A thin layer over the host [`SettingsStore`]. Without a store every
//! getter returns its default and setters fail with
//! [`CoreError::CapabilityMissing`].

use crate::error::{CoreError, Result};
use bridge_traits::storage::SettingsStore;
use core_library::FolderExclusions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

const KEY_THEME: &str = "app_theme";
const KEY_LOAD_LOCAL_SONGS: &str = "load_local_songs";
const KEY_EXCLUDED_FOLDERS: &str = "excluded_folders";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppTheme {
    #[default]
    System,
    Light,
    Dark,
}

impl AppTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppTheme::System => "SYSTEM",
            AppTheme::Light => "LIGHT",
            AppTheme::Dark => "DARK",
        }
    }
}

impl fmt::Display for AppTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppTheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(AppTheme::System),
            "LIGHT" => Ok(AppTheme::Light),
            "DARK" => Ok(AppTheme::Dark),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct Preferences {
    store: Option<Arc<dyn SettingsStore>>,
}

impl Preferences {
    pub fn new(store: Option<Arc<dyn SettingsStore>>) -> Self {
        Self { store }
    }

    fn writable(&self) -> Result<&Arc<dyn SettingsStore>> {
        self.store.as_ref().ok_or_else(|| CoreError::CapabilityMissing {
            capability: "SettingsStore".to_string(),
            message: "Preferences cannot be saved without a SettingsStore".to_string(),
        })
    }

    /// Unknown stored values fall back to [`AppTheme::System`].
    pub async fn theme(&self) -> Result<AppTheme> {
        let Some(store) = &self.store else {
            return Ok(AppTheme::default());
        };
        let stored = store
            .get_string(KEY_THEME)
            .await
            .map_err(|e| CoreError::Preferences(e.to_string()))?;

        Ok(match stored {
            Some(value) => value.parse::<AppTheme>().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring stored theme");
                AppTheme::default()
            }),
            None => AppTheme::default(),
        })
    }

    pub async fn set_theme(&self, theme: AppTheme) -> Result<()> {
        self.writable()?
            .set_string(KEY_THEME, theme.as_str())
            .await
            .map_err(|e| CoreError::Preferences(e.to_string()))?;
        debug!(%theme, "Theme saved");
        Ok(())
    }

    /// Whether on-device songs are listed (default: `true`).
    pub async fn load_local_songs(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(true);
        };
        let stored = store
            .get_bool(KEY_LOAD_LOCAL_SONGS)
            .await
            .map_err(|e| CoreError::Preferences(e.to_string()))?;
        Ok(stored.unwrap_or(true))
    }

    pub async fn set_load_local_songs(&self, load: bool) -> Result<()> {
        self.writable()?
            .set_bool(KEY_LOAD_LOCAL_SONGS, load)
            .await
            .map_err(|e| CoreError::Preferences(e.to_string()))
    }

    /// Flips the local-songs switch and returns the new value.
    pub async fn toggle_load_local_songs(&self) -> Result<bool> {
        let next = !self.load_local_songs().await?;
        self.set_load_local_songs(next).await?;
        Ok(next)
    }

    /// Stored as a JSON array of paths. An unreadable value counts as empty.
    pub async fn excluded_folders(&self) -> Result<FolderExclusions> {
        let Some(store) = &self.store else {
            return Ok(FolderExclusions::new());
        };
        let stored = store
            .get_string(KEY_EXCLUDED_FOLDERS)
            .await
            .map_err(|e| CoreError::Preferences(e.to_string()))?;

        let Some(json) = stored else {
            return Ok(FolderExclusions::new());
        };
        Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable excluded folders");
            FolderExclusions::new()
        }))
    }

    pub async fn set_excluded_folders(&self, folders: &FolderExclusions) -> Result<()> {
        let json = serde_json::to_string(folders)
            .map_err(|e| CoreError::Preferences(e.to_string()))?;
        self.writable()?
            .set_string(KEY_EXCLUDED_FOLDERS, &json)
            .await
            .map_err(|e| CoreError::Preferences(e.to_string()))
    }

    pub async fn exclude_folder(&self, folder: impl Into<PathBuf>) -> Result<FolderExclusions> {
        let mut folders = self.excluded_folders().await?;
        if folders.insert(folder) {
            self.set_excluded_folders(&folders).await?;
        }
        Ok(folders)
    }

    pub async fn include_folder(&self, folder: &Path) -> Result<FolderExclusions> {
        let mut folders = self.excluded_folders().await?;
        if folders.remove(folder) {
            self.set_excluded_folders(&folders).await?;
        }
        Ok(folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemorySettings {
        strings: Mutex<HashMap<String, String>>,
        bools: Mutex<HashMap<String, bool>>,
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.strings
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.strings.lock().await.get(key).cloned())
        }

        async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
            self.bools.lock().await.insert(key.to_string(), value);
            Ok(())
        }

        async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
            Ok(self.bools.lock().await.get(key).copied())
        }

        async fn set_i64(&self, _key: &str, _value: i64) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_i64(&self, _key: &str) -> BridgeResult<Option<i64>> {
            Ok(None)
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.strings.lock().await.remove(key);
            self.bools.lock().await.remove(key);
            Ok(())
        }
    }

    fn prefs() -> (Preferences, Arc<MemorySettings>) {
        let store = Arc::new(MemorySettings::default());
        (Preferences::new(Some(store.clone())), store)
    }

    #[tokio::test]
    async fn test_defaults() {
        let (prefs, _) = prefs();
        assert_eq!(prefs.theme().await.unwrap(), AppTheme::System);
        assert!(prefs.load_local_songs().await.unwrap());
        assert!(prefs.excluded_folders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_theme_round_trip_and_bad_value() {
        let (prefs, store) = prefs();
        prefs.set_theme(AppTheme::Dark).await.unwrap();
        assert_eq!(
            store.get_string(KEY_THEME).await.unwrap().as_deref(),
            Some("DARK")
        );
        assert_eq!(prefs.theme().await.unwrap(), AppTheme::Dark);

        store.set_string(KEY_THEME, "NEON").await.unwrap();
        assert_eq!(prefs.theme().await.unwrap(), AppTheme::System);
    }

    #[tokio::test]
    async fn test_toggle_local_songs() {
        let (prefs, _) = prefs();
        assert!(!prefs.toggle_load_local_songs().await.unwrap());
        assert!(!prefs.load_local_songs().await.unwrap());
        assert!(prefs.toggle_load_local_songs().await.unwrap());
    }

    #[tokio::test]
    async fn test_excluded_folders() {
        let (prefs, store) = prefs();
        prefs.exclude_folder("/music/rock").await.unwrap();
        let folders = prefs.exclude_folder("/music/jazz").await.unwrap();
        assert_eq!(folders.iter().count(), 2);

        let folders = prefs.include_folder(Path::new("/music/rock")).await.unwrap();
        assert_eq!(
            folders.iter().collect::<Vec<_>>(),
            vec![Path::new("/music/jazz")]
        );
        assert_eq!(prefs.excluded_folders().await.unwrap(), folders);

        store
            .set_string(KEY_EXCLUDED_FOLDERS, "{not json")
            .await
            .unwrap();
        assert!(prefs.excluded_folders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_without_store() {
        let prefs = Preferences::new(None);
        assert_eq!(prefs.theme().await.unwrap(), AppTheme::System);
        assert!(prefs.load_local_songs().await.unwrap());
        assert!(matches!(
            prefs.set_theme(AppTheme::Light).await,
            Err(CoreError::CapabilityMissing { .. })
        ));
    }
}
