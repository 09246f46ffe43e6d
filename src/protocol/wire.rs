//! Frame header decoding and encoding (RFC 6455 Section 5.2).
//!
//! Decoding is incremental: [`decode`] consumes one complete frame from the
//! front of a buffer, or returns `Ok(None)` and leaves the buffer untouched
//! when more bytes are needed. Header-level violations are reported as soon as
//! the header bytes are available, before the payload arrives.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::Config;
use crate::connection::Role;
use crate::error::DecodeError;
use crate::frame::{Frame, MAX_CONTROL_PAYLOAD};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// A single frame as it appeared on the wire, payload unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// FIN bit.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Unmasked payload.
    pub payload: Bytes,
}

impl RawFrame {
    /// Create a raw frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }
}

/// Validation rules for inbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRules {
    /// Role of the receiving endpoint.
    pub role: Role,
    /// Accept unmasked frames even when the role expects masking.
    pub accept_unmasked: bool,
    /// Maximum declared payload length.
    pub max_frame_size: usize,
}

impl DecodeRules {
    /// Rules for the receiving side with the given role.
    #[must_use]
    pub fn new(role: Role, config: &Config) -> Self {
        Self {
            role,
            accept_unmasked: config.accept_unmasked_frames,
            max_frame_size: config.limits.max_frame_size,
        }
    }
}

/// Decode one frame from the front of `buf`.
///
/// # Errors
///
/// Returns a [`DecodeError`] for reserved bits or opcodes, masking violations,
/// fragmented or oversized control frames, and frames above `max_frame_size`.
pub fn decode(buf: &mut BytesMut, rules: &DecodeRules) -> Result<Option<RawFrame>, DecodeError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    if byte0 & 0x70 != 0 {
        return Err(DecodeError::ReservedBitsSet);
    }
    let fin = byte0 & 0x80 != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = byte1 & 0x80 != 0;
    if rules.role.expects_masked() && !masked && !rules.accept_unmasked {
        return Err(DecodeError::UnmaskedClientFrame);
    }
    if !rules.role.expects_masked() && masked {
        return Err(DecodeError::MaskedServerFrame);
    }

    if opcode.is_control() && !fin {
        return Err(DecodeError::FragmentedControlFrame);
    }

    let (len, mut header_len) = match byte1 & 0x7F {
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(raw), 10)
        }
        n => (u64::from(n), 2),
    };

    if opcode.is_control() && len > MAX_CONTROL_PAYLOAD as u64 {
        return Err(DecodeError::ControlFrameTooLarge(
            usize::try_from(len).unwrap_or(usize::MAX),
        ));
    }
    if len > rules.max_frame_size as u64 {
        return Err(DecodeError::FrameTooLarge {
            size: len,
            max: rules.max_frame_size,
        });
    }
    // Bounded by max_frame_size above.
    let len = len as usize;

    let mask = if masked {
        if buf.len() < header_len + 4 {
            return Ok(None);
        }
        let key = [
            buf[header_len],
            buf[header_len + 1],
            buf[header_len + 2],
            buf[header_len + 3],
        ];
        header_len += 4;
        Some(key)
    } else {
        None
    };

    if buf.len() < header_len + len {
        buf.reserve(header_len + len - buf.len());
        return Ok(None);
    }

    buf.advance(header_len);
    let mut payload = buf.split_to(len);
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok(Some(RawFrame {
        fin,
        opcode,
        payload: payload.freeze(),
    }))
}

/// Total encoded size of a frame with the given payload length.
#[must_use]
pub const fn wire_size(payload_len: usize, masked: bool) -> usize {
    let header = match payload_len {
        0..=125 => 2,
        126..=65535 => 4,
        _ => 10,
    };
    let mask_len = if masked { 4 } else { 0 };
    header + mask_len + payload_len
}

/// Append one frame header and payload to `dst`, masking if `mask` is set.
pub fn encode(fin: bool, opcode: OpCode, payload: &[u8], mask: Option<[u8; 4]>, dst: &mut BytesMut) {
    dst.reserve(wire_size(payload.len(), mask.is_some()));

    let fin_bit = if fin { 0x80 } else { 0x00 };
    dst.put_u8(fin_bit | opcode.as_u8());

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    match payload.len() {
        len @ 0..=125 => dst.put_u8(mask_bit | len as u8),
        len @ 126..=65535 => {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(len as u16);
        }
        len => {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(len as u64);
        }
    }

    match mask {
        Some(key) => {
            dst.put_slice(&key);
            let start = dst.len();
            dst.put_slice(payload);
            apply_mask(&mut dst[start..], key);
        }
        None => dst.put_slice(payload),
    }
}

/// Encode a decoded [`Frame`] as a single unfragmented wire frame.
pub fn encode_frame(frame: &Frame, mask: Option<[u8; 4]>, dst: &mut BytesMut) {
    match frame {
        Frame::Text(s) => encode(true, OpCode::Text, s.as_bytes(), mask, dst),
        Frame::Binary(b) => encode(true, OpCode::Binary, b, mask, dst),
        Frame::Ping(b) => encode(true, OpCode::Ping, b, mask, dst),
        Frame::Pong(b) => encode(true, OpCode::Pong, b, mask, dst),
        Frame::Continuation(b) => encode(true, OpCode::Continuation, b, mask, dst),
        Frame::Close(None) => encode(true, OpCode::Close, &[], mask, dst),
        Frame::Close(Some(close)) => {
            let mut body = Vec::with_capacity(2 + close.reason.len());
            body.extend_from_slice(&close.code.as_u16().to_be_bytes());
            body.extend_from_slice(close.reason.as_bytes());
            encode(true, OpCode::Close, &body, mask, dst);
        }
    }
}
