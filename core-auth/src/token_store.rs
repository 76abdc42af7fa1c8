//! Token Persistence
//!
//! The access token lives in the platform [`SecureStore`] as JSON. Whether
//! the streaming source is switched on is an ordinary setting in the
//! [`SettingsStore`] and survives sign-out.
//!
//! Token values are never logged.

use crate::error::{AuthError, Result};
use crate::types::AccessToken;
use bridge_traits::storage::{SecureStore, SettingsStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TOKEN_KEY: &str = "streaming.access_token";
const ENABLED_KEY: &str = "streaming.enabled";

#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    settings: Arc<dyn SettingsStore>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>, settings: Arc<dyn SettingsStore>) -> Self {
        debug!("Initializing TokenStore");
        Self {
            secure_store,
            settings,
        }
    }

    /// Stores `token`, replacing any previous one.
    pub async fn save_token(&self, token: &AccessToken) -> Result<()> {
        let json = serde_json::to_vec(token)
            .map_err(|e| AuthError::TokenCorrupted(format!("serialization: {e}")))?;

        self.secure_store
            .set_secret(TOKEN_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store token in secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(has_expiry = token.expires_at.is_some(), "Token stored securely");
        Ok(())
    }

    /// Reads the stored token.
    ///
    /// A value that no longer deserializes is deleted and reported as
    /// [`AuthError::TokenCorrupted`], so the next read starts clean.
    pub async fn token(&self) -> Result<Option<AccessToken>> {
        let data = self.secure_store.get_secret(TOKEN_KEY).await.map_err(|e| {
            warn!(error = %e, "Failed to read token from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!("No token in storage");
            return Ok(None);
        };

        match serde_json::from_slice::<AccessToken>(&data) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(error = %e, "Stored token is unreadable, deleting it");
                if let Err(delete_err) = self.secure_store.delete_secret(TOKEN_KEY).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token");
                }
                Err(AuthError::TokenCorrupted(e.to_string()))
            }
        }
    }

    /// Removes the token. Succeeds when there is none.
    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(TOKEN_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete token from secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;
        info!("Token cleared");
        Ok(())
    }

    /// `true` when a non-blank token is stored.
    pub async fn is_logged_in(&self) -> Result<bool> {
        Ok(self
            .token()
            .await?
            .map(|token| !token.is_blank())
            .unwrap_or(false))
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.settings
            .set_bool(ENABLED_KEY, enabled)
            .await
            .map_err(|e| AuthError::SettingsUnavailable(e.to_string()))?;
        debug!(enabled, "Streaming source toggled");
        Ok(())
    }

    /// Defaults to `false` when never set.
    pub async fn is_enabled(&self) -> Result<bool> {
        let value = self
            .settings
            .get_bool(ENABLED_KEY)
            .await
            .map_err(|e| AuthError::SettingsUnavailable(e.to_string()))?;
        Ok(value.unwrap_or(false))
    }
}
