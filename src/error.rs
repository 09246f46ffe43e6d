//! Error types for the WebSocket server engine.
//!
//! [`Error`] is the per-connection taxonomy: every variant is contained to the
//! connection that produced it. [`DecodeError`] covers malformed frame bytes
//! reported by the codec layer.

use thiserror::Error;

use crate::connection::{ConnectionId, ConnectionState};
use crate::frame::CloseCode;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Frame-level decode failures. Always fatal to the connection, never to the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Opcode outside the 4-bit range.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Control frame with FIN cleared.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload above 125 bytes.
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked frame from a client.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked frame from a server.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Fragment count so far.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Text message is not valid UTF-8.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Close payload of one byte, or a reason that is not UTF-8.
    #[error("Invalid close payload: {0}")]
    InvalidClosePayload(&'static str),

    /// Close code that must not appear on the wire.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// New data frame while a fragmented message is in progress.
    #[error("Expected continuation frame")]
    ExpectedContinuation,
}

/// Errors produced by connections, the handshake and the server loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Upgrade request rejected; the connection never reached `Open`.
    #[error("Handshake rejected: {status} {reason}")]
    HandshakeRejected {
        /// HTTP status code sent back to the client.
        status: u16,
        /// Human-readable reason.
        reason: String,
    },

    /// Malformed frame bytes.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Frame kind the application does not handle.
    #[error("Unsupported frame type: {0}")]
    UnsupportedFrameType(&'static str),

    /// Write queue budget exhausted.
    #[error("Write queue full: {frames} frames, {bytes} bytes queued")]
    QueueFull {
        /// Frames queued at the time of rejection.
        frames: usize,
        /// Bytes queued at the time of rejection.
        bytes: usize,
    },

    /// I/O failure on the transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Application dispatcher returned an error or panicked.
    #[error("Dispatcher failure: {0}")]
    DispatcherFailure(String),

    /// The connection no longer accepts outbound frames.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires an `Open` connection.
    #[error("Connection not open (state: {0})")]
    NotOpen(ConnectionState),

    /// Backward or otherwise illegal state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },

    /// Close code that must not be sent.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Outbound frame violates framing rules.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// No registered connection with this id.
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

impl Error {
    /// Close code sent to the peer when this error ends an `Open` connection.
    ///
    /// `None` means the connection goes straight to `Closed` without a Close frame.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::UnsupportedFrameType(_) => Some(CloseCode::ProtocolError),
            Error::QueueFull { .. } => Some(CloseCode::GoingAway),
            Error::DispatcherFailure(_) => Some(CloseCode::InternalError),
            _ => None,
        }
    }

    /// Returns `true` if this error ends the connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::HandshakeRejected { .. }
                | Error::Decode(_)
                | Error::UnsupportedFrameType(_)
                | Error::QueueFull { .. }
                | Error::Transport(_)
                | Error::DispatcherFailure(_)
        )
    }

    pub(crate) fn rejected(status: u16, reason: impl Into<String>) -> Self {
        Error::HandshakeRejected {
            status,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
