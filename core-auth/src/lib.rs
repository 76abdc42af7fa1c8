//! # Streaming Account Authentication
//!
//! Browser-redirect (implicit grant) sign-in for the streaming account.
//!
//! ## Overview
//!
//! ```text
//!  begin_sign_in() ──► authorize URL ──► host browser
//!                                              │
//!  complete_sign_in(redirect) ◄── ivormusic://spotify-callback#access_token=...
//!          │
//!          ▼
//!     TokenStore ──► SecureStore (token)
//!                └─► SettingsStore (enabled flag)
//! ```
//!
//! The token is only captured and stored here. Using it against the
//! account's API is up to the host.

pub mod error;
pub mod oauth;
pub mod session;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{parse_redirect, AuthorizeRequest, ImplicitGrantConfig};
pub use session::AuthSession;
pub use token_store::TokenStore;
pub use types::AccessToken;
