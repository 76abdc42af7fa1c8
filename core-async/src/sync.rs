//! Synchronization primitives.
//!
//! All primitives are async-aware and `Send + Sync`:
//!
//! - `mpsc` carries transport commands to the single playback owner
//! - `watch` publishes the latest playback state
//! - `broadcast` fans out core events and download progress
//! - [`Semaphore`] bounds download parallelism
//! - [`CancellationToken`] is the cooperative stop signal for download workers
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Semaphore};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let permits = Arc::new(Semaphore::new(2));
//!     let _permit = permits.clone().acquire_owned().await.unwrap();
//!     assert_eq!(permits.available_permits(), 1);
//!
//!     let token = CancellationToken::new();
//!     token.cancel();
//!     assert!(token.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Mutex, MutexGuard, Notify,
    OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
    TryAcquireError,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
