//! Task spawning.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handles: Vec<_> = (0..3).map(|i| task::spawn(async move { i * 2 })).collect();
//!     for handle in handles {
//!         let _ = handle.await;
//!     }
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle, JoinSet};

/// Spawns a future onto the runtime.
///
/// The returned handle can be awaited for the output or aborted. Dropping the
/// handle detaches the task; it keeps running to completion.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}
