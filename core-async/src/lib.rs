//! Async runtime abstraction for the playback core.
//!
//! Every `core-*` crate depends on this crate instead of reaching for Tokio
//! directly. Keeping the runtime behind one facade means the transport actor,
//! the download workers and the resolver all agree on which clock, which
//! channels and which cancellation primitive they use.
//!
//! # Modules
//!
//! - `task`: task spawning and join handles
//! - `time`: sleeping, deadlines and the runtime clock
//! - `sync`: locks, semaphores, channels and [`sync::CancellationToken`]
//! - `io`: async read/write traits used by the file system bridge
//! - `runtime`: handle lookup and `block_on` for synchronous callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
