//! Process-level counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Atomic counters shared by the accept loop and every connection task.
#[derive(Debug)]
pub struct ServerStats {
    connections_accepted: AtomicU64,
    connections_active: AtomicUsize,
    handshakes_rejected: AtomicU64,
    drain_timeouts: AtomicU64,
    frames_received: AtomicU64,
    accept_errors: AtomicU64,
    start_time: Instant,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            connections_active: AtomicUsize::new(0),
            handshakes_rejected: AtomicU64::new(0),
            drain_timeouts: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drain_timeout(&self) {
        self.drain_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.start_time.elapsed(),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            drain_timeouts: self.drain_timeouts.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`].
///
/// Counters are read one at a time, so a snapshot taken under load is not
/// an atomic cut across all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    pub connections_accepted: u64,
    pub connections_active: usize,
    pub handshakes_rejected: u64,
    pub drain_timeouts: u64,
    pub frames_received: u64,
    pub accept_errors: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uptime={:.1}s accepted={} active={} rejected={} drain_timeouts={} frames={} accept_errors={}",
            self.uptime.as_secs_f64(),
            self.connections_accepted,
            self.connections_active,
            self.handshakes_rejected,
            self.drain_timeouts,
            self.frames_received,
            self.accept_errors
        )
    }
}
