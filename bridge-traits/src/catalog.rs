//! Remote catalog client.
//!
//! The catalog's wire protocol is opaque to the core. The only thing the core
//! ever asks of it is a direct, playable URL for a remote track identifier.

use async_trait::async_trait;

use crate::error::Result;

/// Resolves remote track identifiers into direct stream URLs.
///
/// Implementations may take arbitrarily long or hang; callers always race the
/// call against their own deadline.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::CatalogClient;
///
/// async fn preview(catalog: &dyn CatalogClient) -> Result<String> {
///     catalog.resolve_url("dQw4w9WgXcQ").await
/// }
/// ```
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn resolve_url(&self, remote_id: &str) -> Result<String>;
}
