//! # Playback Configuration
//!
//! Configuration types for the resolver, transport and session components.
//! Download settings live in [`crate::downloads::DownloadConfig`].
//!
//! All structs deserialize with per-field defaults so a host can override a
//! single value without restating the rest.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Resolver
// ============================================================================

/// Stream resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Deadline applied when a caller does not pass its own.
    ///
    /// Default: 8 seconds.
    #[serde(default = "default_resolve_deadline")]
    pub default_deadline: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_deadline: default_resolve_deadline(),
        }
    }
}

impl ResolverConfig {
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_deadline.is_zero() {
            return Err("default_deadline must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Transport engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Automatic re-resolve + reattach attempts after a mid-playback network
    /// failure, before the item is put in ERROR.
    ///
    /// Default: 3.
    #[serde(default = "default_max_engine_retries")]
    pub max_engine_retries: u32,

    /// Delay before each reattach attempt, multiplied by the attempt number.
    ///
    /// Default: 500ms.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: Duration,

    /// Capacity of the command channel feeding the transport actor.
    ///
    /// Default: 64.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Skip-previous restarts the current track instead of moving back when
    /// playback is past this point.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_previous_restart_threshold")]
    pub previous_restart_threshold: Duration,

    /// Move on to the next item when the current one cannot be played.
    ///
    /// Default: false (the item stays in ERROR until the user acts).
    #[serde(default)]
    pub advance_on_error: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_engine_retries: default_max_engine_retries(),
            retry_backoff: default_retry_backoff(),
            command_buffer: default_command_buffer(),
            previous_restart_threshold: default_previous_restart_threshold(),
            advance_on_error: false,
        }
    }
}

impl TransportConfig {
    pub fn with_max_engine_retries(mut self, retries: u32) -> Self {
        self.max_engine_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    pub fn with_previous_restart_threshold(mut self, threshold: Duration) -> Self {
        self.previous_restart_threshold = threshold;
        self
    }

    pub fn with_advance_on_error(mut self, enabled: bool) -> Self {
        self.advance_on_error = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.command_buffer == 0 {
            return Err("command_buffer must be > 0".to_string());
        }
        if self.max_engine_retries > 10 {
            return Err("max_engine_retries must be <= 10".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

/// Session adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Deadline for each item of an "add items" batch.
    ///
    /// Default: 8 seconds.
    #[serde(default = "default_resolve_deadline")]
    pub batch_deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            batch_deadline: default_resolve_deadline(),
        }
    }
}

impl SessionConfig {
    pub fn with_batch_deadline(mut self, deadline: Duration) -> Self {
        self.batch_deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_deadline.is_zero() {
            return Err("batch_deadline must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

pub(crate) fn default_resolve_deadline() -> Duration {
    Duration::from_millis(8000)
}

fn default_max_engine_retries() -> u32 {
    3
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_command_buffer() -> usize {
    64
}

fn default_previous_restart_threshold() -> Duration {
    Duration::from_secs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(
            ResolverConfig::default().default_deadline,
            Duration::from_millis(8000)
        );

        let transport = TransportConfig::default();
        assert_eq!(transport.max_engine_retries, 3);
        assert_eq!(transport.retry_backoff, Duration::from_millis(500));
        assert_eq!(transport.command_buffer, 64);
        assert!(!transport.advance_on_error);
        assert!(transport.validate().is_ok());

        assert_eq!(
            SessionConfig::default().batch_deadline,
            Duration::from_millis(8000)
        );
    }

    #[test]
    fn test_validation() {
        assert!(TransportConfig::default()
            .with_command_buffer(0)
            .validate()
            .is_err());
        assert!(ResolverConfig::default()
            .with_default_deadline(Duration::ZERO)
            .validate()
            .is_err());
        assert!(SessionConfig::default()
            .with_batch_deadline(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config: TransportConfig =
            serde_json::from_str(r#"{ "advance_on_error": true }"#).unwrap();
        assert!(config.advance_on_error);
        assert_eq!(config.max_engine_retries, 3);
    }
}
