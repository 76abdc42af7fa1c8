//! Sign-in flow state.
//!
//! [`AuthSession`] ties the redirect parser to the token store and reports
//! outcomes on the event bus as [`AuthEvent`]s.

use crate::error::{AuthError, Result};
use crate::oauth::{parse_redirect, AuthorizeRequest, ImplicitGrantConfig};
use crate::token_store::TokenStore;
use crate::types::AccessToken;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AuthSession {
    config: ImplicitGrantConfig,
    store: TokenStore,
    events: Option<EventBus>,
    /// State of the authorize URL handed out last, if any.
    pending_state: Arc<Mutex<Option<String>>>,
}

impl AuthSession {
    pub fn new(
        config: ImplicitGrantConfig,
        store: TokenStore,
        events: Option<EventBus>,
    ) -> Result<Self> {
        config.validate().map_err(AuthError::InvalidConfig)?;
        Ok(Self {
            config,
            store,
            events,
            pending_state: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &ImplicitGrantConfig {
        &self.config
    }

    /// Returns the URL the host should open in a browser.
    ///
    /// Starting again replaces the state of an earlier, unfinished attempt.
    #[instrument(skip(self))]
    pub fn begin_sign_in(&self) -> Result<String> {
        let request = AuthorizeRequest::build(&self.config)?;
        *self.pending_state.lock() = Some(request.state);
        info!("Sign-in started");
        Ok(request.url)
    }

    /// Finishes sign-in from the intercepted redirect URI.
    ///
    /// When [`begin_sign_in`](Self::begin_sign_in) ran in this process the
    /// redirect must carry its state. A redirect arriving after a restart is
    /// accepted without the check. On success the token is stored and the
    /// streaming source is switched on.
    #[instrument(skip(self, redirect))]
    pub async fn complete_sign_in(&self, redirect: &str) -> Result<AccessToken> {
        let expected = self.pending_state.lock().take();

        let token = match parse_redirect(&self.config, redirect, expected.as_deref()) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Sign-in redirect rejected");
                self.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if let Err(e) = self.persist(&token).await {
            self.emit(AuthEvent::AuthError {
                message: e.to_string(),
            });
            return Err(e);
        }

        info!("Signed in");
        self.emit(AuthEvent::SignedIn);
        Ok(token)
    }

    async fn persist(&self, token: &AccessToken) -> Result<()> {
        self.store.save_token(token).await?;
        self.store.set_enabled(true).await
    }

    /// Clears the token. The enabled flag is left as is.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        self.pending_state.lock().take();
        self.store.clear().await?;
        info!("Signed out");
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    pub async fn is_logged_in(&self) -> Result<bool> {
        self.store.is_logged_in().await
    }

    /// The stored token, if it is usable.
    ///
    /// Fails with [`AuthError::NotAuthenticated`] when there is no token,
    /// or it is blank or expired.
    pub async fn access_token(&self) -> Result<AccessToken> {
        match self.store.token().await? {
            Some(token) if !token.is_blank() && !token.is_expired() => Ok(token),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.store.set_enabled(enabled).await
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        self.store.is_enabled().await
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::storage::{SecureStore, SettingsStore};
    use std::collections::HashMap;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct MemoryStores {
        secrets: AsyncMutex<HashMap<String, Vec<u8>>>,
        flags: AsyncMutex<HashMap<String, bool>>,
    }

    #[async_trait]
    impl SecureStore for MemoryStores {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.secrets
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.secrets.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.secrets.lock().await.remove(key);
            Ok(())
        }
    }

    #[async_trait]
    impl SettingsStore for MemoryStores {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
            self.flags.lock().await.insert(key.to_string(), value);
            Ok(())
        }

        async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
            Ok(self.flags.lock().await.get(key).copied())
        }

        async fn set_i64(&self, _key: &str, _value: i64) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_i64(&self, _key: &str) -> BridgeResult<Option<i64>> {
            Ok(None)
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.flags.lock().await.remove(key);
            Ok(())
        }
    }

    fn session() -> (AuthSession, EventBus) {
        let stores = Arc::new(MemoryStores::default());
        let bus = EventBus::new(16);
        let session = AuthSession::new(
            ImplicitGrantConfig::new("client"),
            TokenStore::new(stores.clone(), stores),
            Some(bus.clone()),
        )
        .unwrap();
        (session, bus)
    }

    fn state_of(url: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_round_trip() {
        let (session, bus) = session();
        let mut events = bus.subscribe();
        assert!(!session.is_logged_in().await.unwrap());
        assert!(!session.is_enabled().await.unwrap());

        let url = session.begin_sign_in().unwrap();
        let redirect = format!(
            "ivormusic://spotify-callback#access_token=tok&expires_in=3600&state={}",
            state_of(&url)
        );
        session.complete_sign_in(&redirect).await.unwrap();

        assert!(session.is_logged_in().await.unwrap());
        assert!(session.is_enabled().await.unwrap());
        assert_eq!(session.access_token().await.unwrap().as_str(), "tok");
        assert_eq!(events.recv().await.unwrap(), CoreEvent::Auth(AuthEvent::SignedIn));
    }

    #[tokio::test]
    async fn test_wrong_state_is_rejected() {
        let (session, bus) = session();
        let mut events = bus.subscribe();
        session.begin_sign_in().unwrap();

        let err = session
            .complete_sign_in("ivormusic://spotify-callback#access_token=tok&state=forged")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::StateMismatch));
        assert!(!session.is_logged_in().await.unwrap());
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::AuthError { .. })
        ));
    }

    #[tokio::test]
    async fn test_redirect_without_pending_flow_is_accepted() {
        let (session, _bus) = session();
        session
            .complete_sign_in("ivormusic://spotify-callback#access_token=tok")
            .await
            .unwrap();
        assert!(session.is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_keeps_enabled_flag() {
        let (session, bus) = session();
        session
            .complete_sign_in("ivormusic://spotify-callback#access_token=tok")
            .await
            .unwrap();
        let mut events = bus.subscribe();

        session.sign_out().await.unwrap();

        assert!(!session.is_logged_in().await.unwrap());
        assert!(session.is_enabled().await.unwrap());
        assert!(matches!(
            session.access_token().await.unwrap_err(),
            AuthError::NotAuthenticated
        ));
        assert_eq!(events.recv().await.unwrap(), CoreEvent::Auth(AuthEvent::SignedOut));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let stores = Arc::new(MemoryStores::default());
        let result = AuthSession::new(
            ImplicitGrantConfig::new(""),
            TokenStore::new(stores.clone(), stores),
            None,
        );
        assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
    }
}
