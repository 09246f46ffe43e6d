//! Bounded per-connection outbound queue.
//!
//! Any number of producers push frames; exactly one [`QueueWriter`] drains
//! them onto the transport. Pushing never waits on I/O: when the budget is
//! exhausted the push fails with [`Error::QueueFull`] and the caller decides
//! what to do.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::QueueLimits;
use crate::error::{Error, Result};
use crate::frame::Frame;

#[derive(Debug, Default)]
struct QueueInner {
    frames: VecDeque<Frame>,
    bytes: usize,
    close_queued: bool,
    abandoned: bool,
}

/// Ordered outbound frames for one connection.
///
/// Admission rules:
/// - a Close frame bypasses the budget, so a going-away Close can always be
///   queued behind a full queue;
/// - after a Close, data frames and a second Close are refused;
/// - after [`abandon`](Self::abandon), everything is refused.
#[derive(Debug)]
pub struct WriteQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    limits: QueueLimits,
    writer_taken: AtomicBool,
}

impl WriteQueue {
    /// Create an empty queue with the given budget.
    #[must_use]
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            limits,
            writer_taken: AtomicBool::new(false),
        }
    }

    /// Append a frame to the tail.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the queue was abandoned, or if a
    ///   Close is already queued and `frame` is a data frame or another Close.
    /// - [`Error::QueueFull`] if a non-Close frame would exceed the budget.
    pub fn push(&self, frame: Frame) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.abandoned {
            return Err(Error::ConnectionClosed);
        }

        let is_close = frame.is_close();
        // Continuation counts as data here; it never gets past `Frame::validate` anyway.
        if inner.close_queued && (is_close || !frame.is_control()) {
            return Err(Error::ConnectionClosed);
        }

        let len = frame.payload_len();
        if !is_close && !self.limits.admits(inner.frames.len(), inner.bytes, len) {
            return Err(Error::QueueFull {
                frames: inner.frames.len(),
                bytes: inner.bytes,
            });
        }

        inner.bytes += len;
        inner.close_queued |= is_close;
        inner.frames.push_back(frame);
        drop(inner);

        self.notify.notify_one();
        Ok(())
    }

    /// Claim the single writer. Returns `None` while another writer is alive.
    #[must_use]
    pub fn writer(self: &Arc<Self>) -> Option<QueueWriter> {
        self.writer_taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| QueueWriter {
                queue: Arc::clone(self),
            })
    }

    /// Discard every queued frame and refuse further pushes.
    ///
    /// A writer waiting in [`QueueWriter::next`] wakes and sees the end of the queue.
    pub fn abandon(&self) {
        {
            let mut inner = self.inner.lock();
            inner.abandoned = true;
            inner.frames.clear();
            inner.bytes = 0;
        }
        self.notify.notify_one();
    }

    /// Number of queued frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    /// Payload bytes currently queued.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.inner.lock().bytes
    }

    /// Returns `true` once a Close frame has been accepted.
    #[must_use]
    pub fn is_close_queued(&self) -> bool {
        self.inner.lock().close_queued
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.inner.lock().abandoned
    }

    fn pop(&self) -> Option<Frame> {
        let mut inner = self.inner.lock();
        let frame = inner.frames.pop_front()?;
        inner.bytes -= frame.payload_len();
        Some(frame)
    }
}

/// Exclusive drain handle for a [`WriteQueue`].
///
/// Dropping it releases the writer slot.
#[derive(Debug)]
pub struct QueueWriter {
    queue: Arc<WriteQueue>,
}

impl QueueWriter {
    /// Wait for the next frame in FIFO order.
    ///
    /// Returns `None` once the queue has been abandoned.
    pub async fn next(&mut self) -> Option<Frame> {
        loop {
            let notified = self.queue.notify.notified();
            if let Some(frame) = self.queue.pop() {
                return Some(frame);
            }
            if self.queue.is_abandoned() {
                return None;
            }
            notified.await;
        }
    }

    /// Take the next frame without waiting.
    pub fn try_next(&mut self) -> Option<Frame> {
        self.queue.pop()
    }

    /// Returns `true` if nothing is waiting to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Drop for QueueWriter {
    fn drop(&mut self) {
        self.queue.writer_taken.store(false, Ordering::Release);
    }
}
