use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer token captured from the sign-in redirect.
///
/// # Examples
///
/// ```
/// use core_auth::AccessToken;
///
/// let token = AccessToken::new("BQDx...", Some(3600));
/// assert!(!token.is_expired());
/// assert!(!format!("{token:?}").contains("BQDx"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// When the token stops working, if the provider said
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Creates a token expiring `expires_in` seconds from now.
    ///
    /// A lifetime too large to represent is treated as no expiry.
    pub fn new(access_token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: expires_in.and_then(expiry_after),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.access_token
    }

    pub fn is_blank(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    /// Tokens without a known expiry never count as expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(false)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = Utc::now();
        self.expires_at.filter(|at| *at > now).map(|at| at - now)
    }
}

/// `secs` from now, or `None` when that instant is out of range.
pub(crate) fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
