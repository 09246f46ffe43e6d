//! Configuration and limits for the server engine.

use std::time::Duration;

use crate::error::{DecodeError, Error};

/// Inbound resource limits.
///
/// These limits prevent resource exhaustion attacks and ensure
/// bounded memory usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a complete message in bytes.
    ///
    /// This applies to the total size after reassembling all fragments.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the upgrade request head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Validate that a declared frame payload length is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::FrameTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), DecodeError> {
        if size > self.max_frame_size as u64 {
            Err(DecodeError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MessageTooLarge`] if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), DecodeError> {
        if size > self.max_message_size {
            Err(DecodeError::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::TooManyFragments`] if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), DecodeError> {
        if count > self.max_fragment_count {
            Err(DecodeError::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that the request head is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeRejected`] with status 431 if `size` exceeds the configured maximum.
    pub fn check_handshake_size(&self, size: usize) -> Result<(), Error> {
        if size > self.max_handshake_size {
            Err(Error::rejected(431, "Request Header Fields Too Large"))
        } else {
            Ok(())
        }
    }
}

/// Per-connection write queue budget.
///
/// A non-Close frame that would push the queue past either bound is
/// rejected with [`Error::QueueFull`](crate::Error::QueueFull).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Maximum payload bytes held in the queue.
    ///
    /// Default: 1 MB
    pub max_bytes: usize,

    /// Maximum number of frames held in the queue.
    ///
    /// Default: 1024
    pub max_frames: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            max_frames: 1024,
        }
    }
}

impl QueueLimits {
    /// Create a queue budget.
    #[must_use]
    pub const fn new(max_bytes: usize, max_frames: usize) -> Self {
        Self {
            max_bytes,
            max_frames,
        }
    }

    /// Returns `true` if one more frame of `len` bytes fits on top of the given usage.
    #[inline]
    #[must_use]
    pub const fn admits(&self, frames: usize, bytes: usize, len: usize) -> bool {
        frames < self.max_frames && bytes.saturating_add(len) <= self.max_bytes
    }
}

/// Server engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inbound resource limits.
    pub limits: Limits,

    /// Outbound queue budget per connection.
    pub queue: QueueLimits,

    /// How long a `Closing` connection may wait for the close handshake
    /// and queued writes before the transport is forced closed.
    ///
    /// Default: 5 seconds
    pub close_timeout: Duration,

    /// Maximum time to receive the complete upgrade request.
    ///
    /// Default: 10 seconds
    pub handshake_timeout: Duration,

    /// Dispatch Binary messages to the application.
    ///
    /// When `false`, a Binary message is an unsupported frame type and
    /// closes the connection with a protocol error.
    ///
    /// Default: false
    pub accept_binary: bool,

    /// Accept unmasked frames from clients.
    ///
    /// RFC 6455 requires clients to mask all frames. Setting this to `true`
    /// is only useful for testing.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            queue: QueueLimits::default(),
            close_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
            accept_binary: false,
            accept_unmasked_frames: false,
            read_buffer_size: 8192,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom inbound limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the write queue budget.
    #[must_use]
    pub const fn with_queue_limits(mut self, queue: QueueLimits) -> Self {
        self.queue = queue;
        self
    }

    /// Set the drain timeout for `Closing` connections.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enable or disable dispatch of Binary messages.
    #[must_use]
    pub const fn with_accept_binary(mut self, accept: bool) -> Self {
        self.accept_binary = accept;
        self
    }

    /// Accept unmasked client frames.
    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}
