//! Byte counting wrappers that report transfer progress to a listener

use bytes::Bytes;
use futures_util::Stream;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

/// Minimum time between two progress callbacks
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Receives `(transferred, total)` while bytes move through a transfer
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, transferred: u64, total: u64);

    fn progress_interval(&self) -> Duration {
        DEFAULT_PROGRESS_INTERVAL
    }
}

impl<F> ProgressListener for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, transferred: u64, total: u64) {
        self(transferred, total)
    }
}

/// Running byte count with rate limited notification
pub(crate) struct ProgressTracker {
    listener: Option<Arc<dyn ProgressListener>>,
    total: u64,
    transferred: u64,
    last_notify: Option<Instant>,
    closed: bool,
}

impl ProgressTracker {
    pub(crate) fn new(listener: Option<Arc<dyn ProgressListener>>, total: u64) -> Self {
        Self {
            listener,
            total,
            transferred: 0,
            last_notify: None,
            closed: false,
        }
    }

    pub(crate) fn transferred(&self) -> u64 {
        self.transferred
    }

    pub(crate) fn advance(&mut self, bytes: u64) {
        self.transferred += bytes;
        self.notify(true);
    }

    pub(crate) fn reset(&mut self) {
        self.transferred = 0;
        self.notify(true);
    }

    /// Final notification, ignores the interval and fires once
    pub(crate) fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.notify(false);
        }
    }

    fn notify(&mut self, check_interval: bool) {
        let Some(listener) = &self.listener else {
            return;
        };
        let now = Instant::now();
        let due = match self.last_notify {
            Some(last) => now.duration_since(last) >= listener.progress_interval(),
            None => true,
        };
        if !check_interval || due {
            self.last_notify = Some(now);
            listener.on_progress(self.transferred, self.total);
        }
    }
}

/// Counts bytes read from an upload source.
///
/// Seeking back to the start resets the count. Dropping the reader sends
/// the final notification.
pub struct ProgressReader<R> {
    inner: R,
    tracker: ProgressTracker,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, listener: Option<Arc<dyn ProgressListener>>, total: u64) -> Self {
        Self {
            inner,
            tracker: ProgressTracker::new(listener, total),
        }
    }

    pub fn transferred(&self) -> u64 {
        self.tracker.transferred()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let read = buf.filled().len() - before;
            if read > 0 {
                this.tracker.advance(read as u64);
            }
        }
        poll
    }
}

impl<R: AsyncSeek + Unpin> AsyncSeek for ProgressReader<R> {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.inner).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        let this = &mut *self;
        let poll = Pin::new(&mut this.inner).poll_complete(cx);
        if let Poll::Ready(Ok(0)) = &poll {
            if this.tracker.transferred() > 0 {
                this.tracker.reset();
            }
        }
        poll
    }
}

impl<R> Drop for ProgressReader<R> {
    fn drop(&mut self) {
        self.tracker.close();
    }
}

/// Counts bytes yielded by a download body
pub(crate) struct ProgressStream<S> {
    inner: S,
    tracker: ProgressTracker,
}

impl<S> ProgressStream<S> {
    /// `start` bytes are already counted, as when a download resumes
    pub(crate) fn new(
        inner: S,
        listener: Option<Arc<dyn ProgressListener>>,
        start: u64,
        total: u64,
    ) -> Self {
        let mut tracker = ProgressTracker::new(listener, total);
        tracker.transferred = start;
        Self { inner, tracker }
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let poll = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &poll {
            this.tracker.advance(chunk.len() as u64);
        }
        poll
    }
}

impl<S> Drop for ProgressStream<S> {
    fn drop(&mut self) {
        self.tracker.close();
    }
}
