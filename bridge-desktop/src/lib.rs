//! # Desktop Bridge Implementations
//!
//! Host capabilities for desktop platforms (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs` under the platform data directory
//! - `SettingsStore` using an SQLite key-value table
//! - `SecureStore` using the `keyring` crate
//!
//! The audio engine and media-session surface are supplied by the host
//! application itself.
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http = Arc::new(ReqwestHttpClient::new()?);
//!     let fs = Arc::new(TokioFileSystem::new());
//!     let settings = Arc::new(SqliteSettingsStore::new("settings.db".into()).await?);
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod settings;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
