//! Byte-counting connection wrapper

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

pin_project! {
    /// Counts bytes read from the wrapped connection into a shared counter
    pub struct MeteredConnection<R> {
        #[pin]
        inner: R,
        bytes: Arc<AtomicU64>,
    }
}

impl<R> MeteredConnection<R> {
    /// Wrap a connection, adding to `bytes` on every read
    pub fn new(inner: R, bytes: Arc<AtomicU64>) -> Self {
        Self { inner, bytes }
    }

    /// Bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Borrow the wrapped connection
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: AsyncRead> AsyncRead for MeteredConnection<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();

        ready!(this.inner.poll_read(cx, buf))?;

        let read = (buf.filled().len() - before) as u64;
        this.bytes.fetch_add(read, Ordering::Relaxed);
        Poll::Ready(Ok(()))
    }
}
