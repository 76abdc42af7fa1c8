//! Desktop bootstrap helpers.
//!
//! Fills a [`CoreConfigBuilder`] with the `bridge-desktop` implementations.
//! The host still supplies its catalog client and audio engine.

use crate::error::{CoreError, Result};
use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};
use bridge_traits::storage::FileSystemAccess;
use core_runtime::config::{CoreConfig, CoreConfigBuilder};
use std::path::PathBuf;
use std::sync::Arc;

const SETTINGS_FILE: &str = "settings.db";

/// Builder pre-populated with desktop bridges rooted at the platform data
/// directory, or at `data_dir` when given.
pub async fn desktop_config_builder(data_dir: Option<PathBuf>) -> Result<CoreConfigBuilder> {
    let file_system = match data_dir {
        Some(dir) => TokioFileSystem::with_data_directory(dir),
        None => TokioFileSystem::new(),
    };
    let root = file_system
        .get_data_directory()
        .await
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

    let http = ReqwestHttpClient::new()
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
    let settings = SqliteSettingsStore::new(root.join(SETTINGS_FILE))
        .await
        .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

    let builder = CoreConfig::builder()
        .http_client(Arc::new(http))
        .file_system(Arc::new(file_system))
        .settings_store(Arc::new(settings));

    #[cfg(feature = "secure-store")]
    let builder = builder.secure_store(Arc::new(bridge_desktop::KeyringSecureStore::new()));

    Ok(builder)
}
