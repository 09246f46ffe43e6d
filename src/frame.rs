//! Decoded WebSocket frames and close codes as defined in RFC 6455.
//!
//! A [`Frame`] is one protocol unit after reassembly: data frames carry the
//! whole message, control frames carry at most 125 bytes.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Maximum close reason length: control payload minus the 2-byte code.
pub const MAX_CLOSE_REASON: usize = MAX_CONTROL_PAYLOAD - 2;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001). Server shutdown or a peer that cannot keep up.
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Invalid payload (1007).
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011). The server hit an unexpected condition.
    InternalError,
    /// Any other code (1012-1014 registered, 3000-4999 applications).
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Check if this close code may appear in a Close frame.
    ///
    /// Valid: 1000-1003, 1007-1014, 3000-4999.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Close frame body: status code and optional reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason (UTF-8, max 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    /// Create a new close frame with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Check code validity and reason length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCloseCode`] for codes that must not be sent and
    /// [`Error::InvalidFrame`] for an over-long reason.
    pub fn validate(&self) -> Result<()> {
        if !self.code.is_valid() {
            return Err(Error::InvalidCloseCode(self.code.as_u16()));
        }
        if self.reason.len() > MAX_CLOSE_REASON {
            return Err(Error::InvalidFrame(format!(
                "close reason too long: {} bytes (max: {})",
                self.reason.len(),
                MAX_CLOSE_REASON
            )));
        }
        Ok(())
    }
}

/// One discrete WebSocket frame, after reassembly of any fragmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text message (valid UTF-8).
    Text(String),
    /// Binary message.
    Binary(Bytes),
    /// Ping (payload <= 125 bytes).
    Ping(Bytes),
    /// Pong (payload <= 125 bytes).
    Pong(Bytes),
    /// Close, with an optional status code and reason.
    Close(Option<CloseFrame>),
    /// Continuation fragment that reached the engine unassembled.
    Continuation(Bytes),
}

impl Frame {
    /// Create a text frame.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Frame::Text(s.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Frame::Binary(data.into())
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Frame::Ping(data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Frame::Pong(data.into())
    }

    /// Create a close frame with status code and reason.
    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Frame::Close(Some(CloseFrame::new(code, reason)))
    }

    /// Get the frame kind name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "Text",
            Frame::Binary(_) => "Binary",
            Frame::Ping(_) => "Ping",
            Frame::Pong(_) => "Pong",
            Frame::Close(_) => "Close",
            Frame::Continuation(_) => "Continuation",
        }
    }

    /// Returns `true` for Ping, Pong and Close.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Frame::Ping(_) | Frame::Pong(_) | Frame::Close(_))
    }

    /// Returns `true` if this is a Close frame.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Frame::Close(_))
    }

    /// Payload length on the wire.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) | Frame::Ping(b) | Frame::Pong(b) | Frame::Continuation(b) => b.len(),
            Frame::Close(None) => 0,
            Frame::Close(Some(close)) => 2 + close.reason.len(),
        }
    }

    /// Check outbound framing rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] for oversized control payloads and for
    /// a bare continuation (outbound messages are never fragmented), and
    /// [`Error::InvalidCloseCode`] for close codes that must not be sent.
    pub fn validate(&self) -> Result<()> {
        match self {
            Frame::Close(Some(close)) => close.validate(),
            Frame::Continuation(_) => Err(Error::InvalidFrame(
                "continuation frame without a message in progress".into(),
            )),
            Frame::Ping(b) | Frame::Pong(b) if b.len() > MAX_CONTROL_PAYLOAD => {
                Err(Error::InvalidFrame(format!(
                    "control payload too large: {} bytes (max: {})",
                    b.len(),
                    MAX_CONTROL_PAYLOAD
                )))
            }
            _ => Ok(()),
        }
    }
}

impl From<Payload> for Frame {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(s) => Frame::Text(s),
            Payload::Binary(b) => Frame::Binary(b),
        }
    }
}

/// Application payload handed to a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text message.
    Text(String),
    /// Binary message.
    Binary(Bytes),
}

impl Payload {
    /// Borrow the text content, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Binary(_) => None,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
