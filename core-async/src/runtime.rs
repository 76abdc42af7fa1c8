//! Runtime handles.
//!
//! Synchronous callers (tracing layers, drop paths) use these to reach the
//! ambient runtime or to drive a future to completion when none is running.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the future on a fresh current-thread runtime.
///
/// Fails only if the runtime cannot be constructed.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
