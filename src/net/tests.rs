use super::traits::{AsyncRead, AsyncWrite};
use std::io::{Cursor, Result};
use std::pin::Pin;
use std::task::{Context, Poll};

struct MockReader {
    data: Cursor<Vec<u8>>,
}

impl AsyncRead for MockReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize>> {
        use std::io::Read;
        Poll::Ready(self.data.read(buf))
    }
}

#[test]
fn mock_reader_reads_its_backing_buffer() {
    let mut reader = MockReader {
        data: Cursor::new(vec![1, 2, 3, 4]),
    };
    let _ = Pin::new(&mut reader);
}

/// An in-memory, in-process duplex stream implementing this crate's `AsyncRead`/`AsyncWrite`
/// traits, backed by a [`tokio::io::DuplexStream`] half.
pub struct DuplexStream(tokio::io::DuplexStream);

impl AsyncRead for DuplexStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<Result<usize>> {
        let mut read_buf = tokio::io::ReadBuf::new(buf);
        match tokio::io::AsyncRead::poll_read(Pin::new(&mut self.0), cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for DuplexStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize>> {
        tokio::io::AsyncWrite::poll_write(Pin::new(&mut self.0), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        tokio::io::AsyncWrite::poll_flush(Pin::new(&mut self.0), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        tokio::io::AsyncWrite::poll_shutdown(Pin::new(&mut self.0), cx)
    }
}

/// A connected pair of in-memory streams, for driving the RTSP client against a fake server
/// task instead of a real socket.
#[must_use]
pub fn duplex_pair() -> (DuplexStream, DuplexStream) {
    let (a, b) = tokio::io::duplex(8192);
    (DuplexStream(a), DuplexStream(b))
}

#[cfg(feature = "tokio-runtime")]
mod tokio_tests {
    use crate::net::tokio_impl::{connect_tcp, spawn};
    use std::time::Duration;

    #[tokio::test]
    async fn connect_to_an_invalid_address_fails() {
        let result = connect_tcp("invalid:99999").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn spawned_task_result_is_awaitable() {
        let handle = spawn(async { 42 });
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn tokio_timeout_surfaces_elapsed() {
        let result = tokio::time::timeout(
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(1)),
        )
        .await;
        assert!(result.is_err());
    }
}
