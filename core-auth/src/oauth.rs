//! Implicit-grant authorization.
//!
//! The account provider redirects the browser to
//! `{redirect_uri}#access_token=...&token_type=Bearer&expires_in=3600&state=...`.
//! The host intercepts that navigation and hands the full URI to
//! [`parse_redirect`]. Nothing here talks to the network.
//!
//! A random `state` value goes out with every authorize URL and must come
//! back unchanged in the redirect.

use crate::error::{AuthError, Result};
use crate::types::{expiry_after, AccessToken};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::{form_urlencoded, Url};

const STATE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitGrantConfig {
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
}

impl ImplicitGrantConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            authorize_url: default_authorize_url(),
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("client_id cannot be empty".to_string());
        }
        if self.redirect_uri.trim().is_empty() {
            return Err("redirect_uri cannot be empty".to_string());
        }
        Url::parse(&self.authorize_url).map_err(|e| format!("authorize_url: {e}"))?;
        Ok(())
    }
}

fn default_redirect_uri() -> String {
    "ivormusic://spotify-callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "playlist-read-private".to_string(),
        "playlist-read-collaborative".to_string(),
        "user-library-read".to_string(),
    ]
}

fn default_authorize_url() -> String {
    "https://accounts.spotify.com/authorize".to_string()
}

/// URL to open in the browser, with the state it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
}

impl AuthorizeRequest {
    #[instrument(skip(config))]
    pub fn build(config: &ImplicitGrantConfig) -> Result<Self> {
        config.validate().map_err(AuthError::InvalidConfig)?;
        let state = generate_state();

        let mut url = Url::parse(&config.authorize_url)
            .map_err(|e| AuthError::InvalidConfig(format!("authorize_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("response_type", "token")
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("scope", &config.scopes.join(" "))
            .append_pair("state", &state);

        debug!(scopes = config.scopes.len(), "Built authorize URL");
        Ok(Self {
            url: url.to_string(),
            state,
        })
    }
}

fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// Extracts the token from a redirect URI.
///
/// `expected_state` is the state of the [`AuthorizeRequest`] that started
/// the flow. When given, the redirect must carry the same value.
pub fn parse_redirect(
    config: &ImplicitGrantConfig,
    redirect: &str,
    expected_state: Option<&str>,
) -> Result<AccessToken> {
    if !redirect.starts_with(&config.redirect_uri) {
        return Err(AuthError::InvalidRedirect(
            "URI does not match the registered redirect".to_string(),
        ));
    }

    let fragment = redirect
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .unwrap_or_default();

    let mut access_token = None;
    let mut expires_in = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "expires_in" => expires_in = value.parse::<i64>().ok(),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        warn!(error = %error, "Provider refused authorization");
        return Err(AuthError::AuthenticationFailed(error));
    }
    if let Some(expected) = expected_state {
        if state.as_deref() != Some(expected) {
            return Err(AuthError::StateMismatch);
        }
    }

    let token = access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AuthError::InvalidRedirect("no access_token in fragment".to_string()))?;

    if let Some(secs) = expires_in {
        if expiry_after(secs).is_none() {
            return Err(AuthError::InvalidRedirect(format!(
                "expires_in out of range: {secs}"
            )));
        }
    }

    debug!(expires_in = ?expires_in, "Access token captured from redirect");
    Ok(AccessToken::new(token, expires_in))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ImplicitGrantConfig {
        ImplicitGrantConfig::new("client-123")
    }

    #[test]
    fn test_authorize_url() {
        let request = AuthorizeRequest::build(&config()).unwrap();
        let url = &request.url;

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=token"));
        assert!(url.contains("redirect_uri=ivormusic%3A%2F%2Fspotify-callback"));
        assert!(
            url.contains(
                "scope=playlist-read-private+playlist-read-collaborative+user-library-read"
            ) || url.contains(
                "scope=playlist-read-private%20playlist-read-collaborative%20user-library-read"
            )
        );
        assert_eq!(request.state.len(), STATE_LEN);
        assert!(url.contains(&format!("state={}", request.state)));
    }

    #[test]
    fn test_each_request_gets_fresh_state() {
        let a = AuthorizeRequest::build(&config()).unwrap();
        let b = AuthorizeRequest::build(&config()).unwrap();
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = AuthorizeRequest::build(&ImplicitGrantConfig::new(" ")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));

        let bad_url = config().with_authorize_url("not a url");
        assert!(AuthorizeRequest::build(&bad_url).is_err());
    }

    #[test]
    fn test_parse_redirect() {
        let token = parse_redirect(
            &config(),
            "ivormusic://spotify-callback#access_token=BQD%2Bxyz&token_type=Bearer&expires_in=3600&state=s1",
            Some("s1"),
        )
        .unwrap();

        assert_eq!(token.as_str(), "BQD+xyz");
        assert!(token.expires_at.is_some());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_parse_redirect_without_expiry_or_state_check() {
        let token = parse_redirect(
            &config(),
            "ivormusic://spotify-callback#access_token=abc",
            None,
        )
        .unwrap();
        assert_eq!(token.as_str(), "abc");
        assert!(token.expires_at.is_none());
    }

    #[test]
    fn test_parse_redirect_errors() {
        let cfg = config();

        let err = parse_redirect(&cfg, "https://evil.example/#access_token=abc", None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidRedirect(_)));

        let err = parse_redirect(&cfg, "ivormusic://spotify-callback#token_type=Bearer", None)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRedirect(_)));

        let err = parse_redirect(&cfg, "ivormusic://spotify-callback#access_token=", None)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRedirect(_)));

        let err = parse_redirect(
            &cfg,
            "ivormusic://spotify-callback#error=access_denied&state=s1",
            Some("s1"),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed(reason) if reason == "access_denied"));

        let err = parse_redirect(
            &cfg,
            "ivormusic://spotify-callback#access_token=abc&state=other",
            Some("s1"),
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
    }

    #[test]
    fn test_parse_redirect_rejects_absurd_expiry() {
        let err = parse_redirect(
            &config(),
            "ivormusic://spotify-callback#access_token=abc&expires_in=99999999999999999",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRedirect(reason) if reason.contains("expires_in")));
    }

    #[test]
    fn test_config_defaults_from_json() {
        let cfg: ImplicitGrantConfig =
            serde_json::from_str(r#"{ "client_id": "abc" }"#).unwrap();
        assert_eq!(cfg.redirect_uri, "ivormusic://spotify-callback");
        assert_eq!(cfg.scopes.len(), 3);
        assert_eq!(cfg.authorize_url, "https://accounts.spotify.com/authorize");
    }
}
