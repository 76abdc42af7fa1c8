//! Async I/O traits re-exported from the runtime.
//!
//! Download workers write chunks through [`AsyncWrite`] handles handed out by
//! the file system bridge, so the bridge and the core must name the same traits.

pub use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter,
};
