//! Message reassembly for inbound WebSocket frames (RFC 6455 Section 5.4).
//!
//! Turns a stream of [`RawFrame`]s into decoded [`Frame`]s. Control frames
//! may interleave with a fragmented message and are passed through at once.

use bytes::{Bytes, BytesMut};

use crate::config::Limits;
use crate::error::DecodeError;
use crate::frame::{CloseCode, CloseFrame, Frame};
use crate::protocol::OpCode;
use crate::protocol::wire::RawFrame;

/// Reassembles fragmented messages and decodes control payloads.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragment_count: usize,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler bound by `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragment_count: 0,
            limits,
        }
    }

    /// Feed one raw frame.
    ///
    /// Returns `Some(frame)` for every control frame and for the final
    /// fragment of a data message, `None` while a message is incomplete.
    /// A continuation frame with no message in progress is passed through
    /// as [`Frame::Continuation`] for the connection to reject.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for size and fragment limit violations,
    /// invalid UTF-8 text, malformed close payloads, and a new data frame
    /// arriving mid-message.
    pub fn push(&mut self, raw: RawFrame) -> Result<Option<Frame>, DecodeError> {
        match raw.opcode {
            OpCode::Ping => return Ok(Some(Frame::Ping(raw.payload))),
            OpCode::Pong => return Ok(Some(Frame::Pong(raw.payload))),
            OpCode::Close => return parse_close_payload(&raw.payload).map(|c| Some(Frame::Close(c))),
            OpCode::Continuation if self.opcode.is_none() => {
                return Ok(Some(Frame::Continuation(raw.payload)));
            }
            OpCode::Continuation => {}
            OpCode::Text | OpCode::Binary => {
                if self.opcode.is_some() {
                    return Err(DecodeError::ExpectedContinuation);
                }
                if raw.fin {
                    self.limits.check_message_size(raw.payload.len())?;
                    return finish(raw.opcode, raw.payload).map(Some);
                }
                self.opcode = Some(raw.opcode);
            }
        }

        self.fragment_count += 1;
        self.limits.check_fragment_count(self.fragment_count)?;
        self.limits
            .check_message_size(self.buffer.len() + raw.payload.len())?;
        self.buffer.extend_from_slice(&raw.payload);

        if !raw.fin {
            return Ok(None);
        }

        let payload = self.buffer.split().freeze();
        let opcode = self.opcode.take().unwrap_or(OpCode::Binary);
        self.fragment_count = 0;
        finish(opcode, payload).map(Some)
    }

    /// Returns `true` while a fragmented message is in progress.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }
}

fn finish(opcode: OpCode, payload: Bytes) -> Result<Frame, DecodeError> {
    match opcode {
        OpCode::Text => String::from_utf8(payload.to_vec())
            .map(Frame::Text)
            .map_err(|_| DecodeError::InvalidUtf8),
        _ => Ok(Frame::Binary(payload)),
    }
}

/// Decode a Close payload: empty, or a 2-byte code followed by a UTF-8 reason.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidClosePayload`] for a 1-byte payload or a
/// non-UTF-8 reason, and [`DecodeError::InvalidCloseCode`] for codes that
/// must not appear on the wire.
pub fn parse_close_payload(payload: &[u8]) -> Result<Option<CloseFrame>, DecodeError> {
    match payload.len() {
        0 => Ok(None),
        1 => Err(DecodeError::InvalidClosePayload("one-byte payload")),
        _ => {
            let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
            if !code.is_valid() {
                return Err(DecodeError::InvalidCloseCode(code.as_u16()));
            }
            let reason = std::str::from_utf8(&payload[2..])
                .map_err(|_| DecodeError::InvalidClosePayload("reason is not UTF-8"))?;
            Ok(Some(CloseFrame::new(code, reason)))
        }
    }
}
