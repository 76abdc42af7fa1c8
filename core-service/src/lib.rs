//! # Core Service Façade
//!
//! Wires the injected host bridges into a running playback core.
//!
//! ## Overview
//!
//! ```text
//!  CoreConfig (bridges) ─┐
//!                        ├─► CoreService::bootstrap
//!  ServiceConfig ────────┘        │
//!                                 ├─ EventBus
//!                                 ├─ StreamResolver ─┬─ TransportEngine ─ SessionAdapter
//!                                 │                  └─ DownloadManager
//!                                 ├─ AuthSession (streaming account)
//!                                 └─ Preferences
//! ```
//!
//! Every component receives its dependencies at construction. There is no
//! global accessor; hosts keep the [`CoreService`] (it is cheap to clone)
//! and call [`CoreService::shutdown`] before exit.

pub mod config;
pub mod error;
pub mod preferences;

#[cfg(feature = "desktop-shims")]
pub mod desktop;

pub use config::ServiceConfig;
pub use error::{CoreError, Result};
pub use preferences::{AppTheme, Preferences};

use bridge_traits::playback::MediaSessionSink;
use core_async::task::JoinHandle;
use core_auth::{AuthSession, TokenStore};
use core_library::{filtered_snapshot, LibrarySource, Track};
use core_playback::{
    DownloadManager, FileRecordStore, QueueController, SessionAdapter, StreamResolver,
    TransportEngine, TransportHandle,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    events: EventBus,
    session: SessionAdapter,
    downloads: Option<DownloadManager>,
    auth: Option<AuthSession>,
    preferences: Preferences,
    library: Option<Arc<dyn LibrarySource>>,
}

impl CoreService {
    /// Builds every component and starts the transport actor.
    ///
    /// With downloads enabled the completion record is loaded and
    /// reconciled with the disk before this returns.
    #[instrument(skip_all)]
    pub async fn bootstrap(core: CoreConfig, config: ServiceConfig) -> Result<Self> {
        core.validate()?;
        config.validate().map_err(CoreError::InvalidConfig)?;

        let events = EventBus::new(core.event_buffer_size);
        let resolver = StreamResolver::new(core.catalog.clone(), config.resolver.clone());

        let downloads = if core.features.enable_downloads {
            let records = Arc::new(FileRecordStore::new(
                core.file_system.clone(),
                config.downloads.record_file.clone(),
            ));
            let manager = DownloadManager::new(
                config.downloads.clone(),
                core.http_client.clone(),
                core.file_system.clone(),
                resolver.clone(),
                records,
                Some(events.clone()),
            )?;
            manager.initialize().await?;
            Some(manager)
        } else {
            None
        };

        let auth = if core.features.enable_streaming_account {
            Some(Self::build_auth(&core, &config, &events)?)
        } else {
            None
        };

        let transport = TransportEngine::spawn(
            core.playback_adapter.clone(),
            resolver.clone(),
            QueueController::new(),
            config.transport.clone(),
            Some(events.clone()),
        )?;

        let mut session = SessionAdapter::new(transport, resolver, config.session.clone());
        if let Some(manager) = &downloads {
            session = session.with_downloads(manager.clone());
        }

        info!(
            downloads = downloads.is_some(),
            streaming_account = auth.is_some(),
            "Core service started"
        );

        Ok(Self {
            events,
            session,
            downloads,
            auth,
            preferences: Preferences::new(core.settings_store.clone()),
            library: None,
        })
    }

    fn build_auth(core: &CoreConfig, config: &ServiceConfig, events: &EventBus) -> Result<AuthSession> {
        let grant = config.auth.clone().ok_or_else(|| {
            CoreError::InvalidConfig(
                "auth: streaming account enabled without an auth section".to_string(),
            )
        })?;
        let secure_store = core.secure_store.clone().ok_or_else(|| CoreError::CapabilityMissing {
            capability: "SecureStore".to_string(),
            message: "Streaming account needs a SecureStore for the token".to_string(),
        })?;
        let settings = core.settings_store.clone().ok_or_else(|| CoreError::CapabilityMissing {
            capability: "SettingsStore".to_string(),
            message: "Streaming account needs a SettingsStore for its enabled flag".to_string(),
        })?;

        let store = TokenStore::new(secure_store, settings);
        Ok(AuthSession::new(grant, store, Some(events.clone()))?)
    }

    /// Sets the on-device library used by [`library_snapshot`](Self::library_snapshot).
    pub fn with_library(mut self, source: Arc<dyn LibrarySource>) -> Self {
        self.library = Some(source);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn session(&self) -> &SessionAdapter {
        &self.session
    }

    pub fn transport(&self) -> &TransportHandle {
        self.session.transport()
    }

    pub fn downloads(&self) -> Result<&DownloadManager> {
        self.downloads
            .as_ref()
            .ok_or(CoreError::FeatureDisabled("downloads"))
    }

    pub fn auth(&self) -> Result<&AuthSession> {
        self.auth
            .as_ref()
            .ok_or(CoreError::FeatureDisabled("streaming account"))
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Starts mirroring now-playing state into the host media session.
    pub fn attach_media_session(&self, sink: Arc<dyn MediaSessionSink>) -> JoinHandle<()> {
        self.session.spawn_now_playing_mirror(sink)
    }

    /// On-device tracks minus the excluded folders.
    ///
    /// Empty when local songs are switched off in the preferences or no
    /// library source was set.
    #[instrument(skip(self))]
    pub async fn library_snapshot(&self) -> Result<Vec<Track>> {
        let Some(source) = &self.library else {
            return Ok(Vec::new());
        };
        if !self.preferences.load_local_songs().await? {
            return Ok(Vec::new());
        }
        let exclusions = self.preferences.excluded_folders().await?;
        Ok(filtered_snapshot(source.as_ref(), &exclusions).await?)
    }

    /// Cancels in-flight downloads and stops the transport.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(manager) = &self.downloads {
            manager.shutdown().await;
        }
        if let Err(e) = self.transport().shutdown().await {
            warn!(error = %e, "Transport already stopped");
        }
        info!("Core service stopped");
        Ok(())
    }
}
