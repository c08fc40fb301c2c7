//! Runtime-agnostic async I/O primitives, plus the concrete tokio bindings the engine uses.
//!
//! The trait layer exists so the RTSP client can be driven against an in-memory duplex pair in
//! tests, without spinning up real sockets.

mod traits;

#[cfg(feature = "tokio-runtime")]
mod tokio_impl;

pub mod udp;

#[cfg(test)]
pub(crate) mod tests;

pub use traits::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Flush, Read, ReadExact, WriteAll,
};

#[cfg(feature = "tokio-runtime")]
pub use tokio_impl::*;

/// Boxed async read/write for type erasure.
pub type BoxedAsyncRW = Box<dyn AsyncReadWrite + Send + Unpin>;

/// Combined read/write trait.
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
