//! Service configuration.
//!
//! [`ServiceConfig`] gathers the tuning of every component. It is plain data
//! and deserializes with per-field defaults, so a host can load it from any
//! serde format and override only what it needs.

use core_auth::ImplicitGrantConfig;
use core_playback::{DownloadConfig, ResolverConfig, SessionConfig, TransportConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    /// Streaming account sign-in; required when the feature flag is on
    #[serde(default)]
    pub auth: Option<ImplicitGrantConfig>,
}

impl ServiceConfig {
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_downloads(mut self, downloads: DownloadConfig) -> Self {
        self.downloads = downloads;
        self
    }

    pub fn with_auth(mut self, auth: ImplicitGrantConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Validates every section, prefixing errors with the section name.
    pub fn validate(&self) -> Result<(), String> {
        self.resolver
            .validate()
            .map_err(|e| format!("resolver: {e}"))?;
        self.transport
            .validate()
            .map_err(|e| format!("transport: {e}"))?;
        self.session.validate().map_err(|e| format!("session: {e}"))?;
        self.downloads
            .validate()
            .map_err(|e| format!("downloads: {e}"))?;
        if let Some(auth) = &self.auth {
            auth.validate().map_err(|e| format!("auth: {e}"))?;
        }
        Ok(())
    }
}
