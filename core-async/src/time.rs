//! Time-related abstractions.
//!
//! [`Instant`] is the runtime's monotonic clock rather than `std::time::Instant`.
//! Deadline measurements therefore follow the runtime, which lets tests pause
//! and advance time deterministically.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{timeout, sleep, Duration};
//!
//! async fn example() {
//!     let result = timeout(Duration::from_millis(50), sleep(Duration::from_secs(1))).await;
//!     assert!(result.is_err());
//! }
//! ```

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
pub use tokio::time::error::Elapsed;
pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior, Sleep, Timeout,
};

/// Milliseconds since the Unix epoch, or `0` if the system clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Seconds since the Unix epoch, or `0` if the system clock is before it.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}
