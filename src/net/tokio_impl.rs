//! Wires this crate's runtime-agnostic [`AsyncRead`]/[`AsyncWrite`] traits onto `tokio`'s real
//! `TcpStream`, the concrete type every [`crate::session::Session`]'s RTSP connection runs over.

use super::traits::{AsyncRead, AsyncWrite};
use std::io::Result;
use std::pin::Pin;
use std::task::{Context, Poll};

// Re-exported so callers elsewhere in the crate pull tokio's socket/timer types through this
// module rather than depending on `tokio` directly.
pub use tokio::net::TcpStream;
pub use tokio::net::UdpSocket;
pub use tokio::time::{sleep, timeout, Instant};

// Duration is not re-exported here to avoid shadowing std::time::Duration if both are imported;
// callers use std::time::Duration directly.

impl AsyncRead for TcpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize>> {
        let mut read_buf = tokio::io::ReadBuf::new(buf);
        match tokio::io::AsyncRead::poll_read(self, cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for TcpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize>> {
        tokio::io::AsyncWrite::poll_write(self, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        tokio::io::AsyncWrite::poll_flush(self, cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        tokio::io::AsyncWrite::poll_shutdown(self, cx)
    }
}

/// Open the RTSP TCP connection to a receiver's address string.
pub async fn connect_tcp(addr: &str) -> Result<TcpStream> {
    TcpStream::connect(addr).await
}

/// Spawn a per-session background task (e.g. a control/timing socket poller) on the tokio
/// runtime.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future)
}
