//! Wire protocol (RFC 6455): framing, reassembly and the opening handshake.
//!
//! Nothing in here knows about connection state; the engine consumes decoded
//! [`Frame`](crate::Frame)s and a [`HandshakeResult`].

pub mod assembler;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod wire;

pub use assembler::{MessageAssembler, parse_close_payload};
pub use handshake::{
    HandshakeResponse, HandshakeResult, UpgradeRequest, WS_GUID, attempt_upgrade,
    compute_accept_key,
};
pub use mask::apply_mask;
pub use opcode::OpCode;
pub use wire::{DecodeRules, RawFrame};
