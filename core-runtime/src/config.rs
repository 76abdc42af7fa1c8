//! # Core Configuration Module
//!
//! Holds the host bridges the playback core is built from.
//!
//! ## Overview
//!
//! [`CoreConfig`] is built once by the host and handed to the service
//! bootstrap. Nothing in the core reaches for a global accessor; every
//! component receives the bridges it needs at construction. The builder fails
//! fast with [`Error::CapabilityMissing`] when a required bridge is absent.
//!
//! ## Required Bridges
//!
//! - `HttpClient` - download transfers
//! - `FileSystemAccess` - download directory and completion record
//! - `CatalogClient` - remote stream URL resolution
//! - `PlaybackAdapter` - the host audio engine
//!
//! ## Optional Bridges
//!
//! - `SecureStore` - required only when the streaming account feature is on
//! - `SettingsStore` - preferences; defaults are used when absent
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .catalog(Arc::new(MyCatalog))
//!     .playback_adapter(Arc::new(MyEngine))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    CatalogClient, FileSystemAccess, HttpClient, PlaybackAdapter, SecureStore, SettingsStore,
};
use std::sync::Arc;

/// Bridges and switches for the playback core.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub catalog: Arc<dyn CatalogClient>,
    pub playback_adapter: Arc<dyn PlaybackAdapter>,
    pub secure_store: Option<Arc<dyn SecureStore>>,
    pub settings_store: Option<Arc<dyn SettingsStore>>,
    pub features: FeatureFlags,
    /// Per-subscriber backlog of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("secure_store", &self.secure_store.is_some())
            .field("settings_store", &self.settings_store.is_some())
            .field("features", &self.features)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish_non_exhaustive()
    }
}

/// Feature switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Offline downloads
    pub enable_downloads: bool,
    /// Streaming account sign-in (token kept in the secure store)
    pub enable_streaming_account: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_downloads: true,
            enable_streaming_account: false,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks that switches agree with the injected bridges.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_streaming_account && self.secure_store.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "SecureStore".to_string(),
                message: "Streaming account enabled but no SecureStore provided. \
                          Desktop: use bridge_desktop::KeyringSecureStore. \
                          Mobile: inject Keychain/Keystore-backed storage."
                    .to_string(),
            });
        }

        Ok(())
    }
}

fn missing(capability: &str, hint: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: hint.to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    catalog: Option<Arc<dyn CatalogClient>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    features: FeatureFlags,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogClient>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn enable_downloads(mut self, enabled: bool) -> Self {
        self.features.enable_downloads = enabled;
        self
    }

    pub fn enable_streaming_account(mut self, enabled: bool) -> Self {
        self.features.enable_streaming_account = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = self.http_client.ok_or_else(|| {
            missing(
                "HttpClient",
                "HttpClient is required for downloads. \
                 Desktop: use bridge_desktop::ReqwestHttpClient.",
            )
        })?;
        let file_system = self.file_system.ok_or_else(|| {
            missing(
                "FileSystemAccess",
                "FileSystemAccess is required for the download directory. \
                 Desktop: use bridge_desktop::TokioFileSystem.",
            )
        })?;
        let catalog = self.catalog.ok_or_else(|| {
            missing(
                "CatalogClient",
                "CatalogClient is required to resolve remote stream URLs.",
            )
        })?;
        let playback_adapter = self.playback_adapter.ok_or_else(|| {
            missing(
                "PlaybackAdapter",
                "PlaybackAdapter is required; inject the host audio engine.",
            )
        })?;

        let config = CoreConfig {
            http_client,
            file_system,
            catalog,
            playback_adapter,
            secure_store: self.secure_store,
            settings_store: self.settings_store,
            features: self.features,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };
        config.validate()?;
        Ok(config)
    }
}
