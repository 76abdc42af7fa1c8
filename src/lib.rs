//! Umbrella crate for the playback core.
//!
//! Re-exports [`core_service`] so a host can depend on one crate and pick
//! bridges through features:
//!
//! - `desktop-shims` (default): reqwest HTTP, tokio filesystem, SQLite settings
//! - `secure-store`: OS keychain token storage

pub use core_service::*;
