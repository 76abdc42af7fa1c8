//! # Stream Resolver
//!
//! Turns a remote catalog id into a directly playable URL, racing a deadline.
//!
//! ## Overview
//!
//! The catalog's wire protocol is opaque; the resolver only sees
//! [`CatalogClient::resolve_url`]. Each call is bounded by its own deadline and
//! yields a [`Resolution`]: a URL, a timeout, or a failure. None of these are
//! fatal. A caller that gets `TimedOut` or `Failed` keeps the item pointing at
//! its remote id and decides what to do with it.
//!
//! ```text
//!   resolve_all([a, b, c], 8s)
//!        │
//!        ├── spawn ── timeout(8s, catalog.resolve_url(a)) ──► Resolved(url)
//!        ├── spawn ── timeout(8s, catalog.resolve_url(b)) ──► TimedOut   (at 8s)
//!        └── spawn ── timeout(8s, catalog.resolve_url(c)) ──► Failed(..)
//!        │
//!        └── join in input order ──► [Resolved, TimedOut, Failed]
//! ```
//!
//! Batch latency is bounded by the slowest deadline, never by the sum.

use crate::config::ResolverConfig;
use crate::error::PlaybackError;
use bridge_traits::CatalogClient;
use core_async::task::{self, JoinHandle};
use core_async::time::{timeout, Duration};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of a single resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Direct playable URL.
    Resolved(String),
    /// The catalog did not answer within the deadline.
    TimedOut,
    /// The catalog answered with an error.
    Failed(String),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(url) => Some(url),
            _ => None,
        }
    }

    /// Converts into a `Result`, attaching the id and deadline to failures.
    pub fn into_result(
        self,
        remote_id: &str,
        deadline: Duration,
    ) -> std::result::Result<String, PlaybackError> {
        match self {
            Resolution::Resolved(url) => Ok(url),
            Resolution::TimedOut => Err(PlaybackError::ResolutionTimeout {
                remote_id: remote_id.to_string(),
                deadline_ms: deadline.as_millis() as u64,
            }),
            Resolution::Failed(reason) => Err(PlaybackError::ResolutionFailed {
                remote_id: remote_id.to_string(),
                reason,
            }),
        }
    }
}

/// Deadline-bounded stream URL resolution.
///
/// Cheap to clone; clones share the catalog client.
#[derive(Clone)]
pub struct StreamResolver {
    catalog: Arc<dyn CatalogClient>,
    config: ResolverConfig,
}

impl StreamResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>, config: ResolverConfig) -> Self {
        Self { catalog, config }
    }

    pub fn default_deadline(&self) -> Duration {
        self.config.default_deadline
    }

    /// Resolves one remote id, giving up after `deadline`.
    #[instrument(skip(self), fields(deadline_ms = deadline.as_millis() as u64))]
    pub async fn resolve(&self, remote_id: &str, deadline: Duration) -> Resolution {
        match timeout(deadline, self.catalog.resolve_url(remote_id)).await {
            Ok(Ok(url)) if url.trim().is_empty() => {
                warn!(remote_id, "Catalog returned an empty URL");
                Resolution::Failed("catalog returned an empty URL".to_string())
            }
            Ok(Ok(url)) => {
                debug!(remote_id, url = redact_url(&url), "Stream URL resolved");
                Resolution::Resolved(url)
            }
            Ok(Err(e)) => {
                warn!(remote_id, error = %e, "Stream URL resolution failed");
                Resolution::Failed(e.to_string())
            }
            Err(_) => {
                warn!(remote_id, "Stream URL resolution timed out");
                Resolution::TimedOut
            }
        }
    }

    /// Resolves with the configured default deadline.
    pub async fn resolve_default(&self, remote_id: &str) -> Resolution {
        self.resolve(remote_id, self.config.default_deadline).await
    }

    /// Resolves every id concurrently, each under its own `deadline`.
    ///
    /// Results come back in input order. One slow or failing id never delays
    /// or fails the others.
    #[instrument(skip(self, remote_ids), fields(count = remote_ids.len()))]
    pub async fn resolve_all(&self, remote_ids: &[String], deadline: Duration) -> Vec<Resolution> {
        let handles: Vec<JoinHandle<Resolution>> = remote_ids
            .iter()
            .map(|remote_id| {
                let resolver = self.clone();
                let remote_id = remote_id.clone();
                task::spawn(async move { resolver.resolve(&remote_id, deadline).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let resolution = handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "Resolver task aborted");
                Resolution::Failed(format!("resolver task aborted: {e}"))
            });
            results.push(resolution);
        }

        debug!(
            resolved = results.iter().filter(|r| r.is_resolved()).count(),
            "Batch resolution finished"
        );
        results
    }
}
