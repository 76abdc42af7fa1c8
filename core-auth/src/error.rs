use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid redirect: {0}")]
    InvalidRedirect(String),

    #[error("State mismatch in redirect (possible CSRF)")]
    StateMismatch,

    #[error("Invalid auth configuration: {0}")]
    InvalidConfig(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Settings storage unavailable: {0}")]
    SettingsUnavailable(String),

    #[error("Stored token is corrupted: {0}")]
    TokenCorrupted(String),

    #[error("Not authenticated")]
    NotAuthenticated,
}

pub type Result<T> = std::result::Result<T, AuthError>;
