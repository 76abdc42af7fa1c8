use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the error reports a missing file or key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Returns `true` for failures that happened on the wire rather than on
    /// local storage.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            BridgeError::Network(_) | BridgeError::HttpStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
