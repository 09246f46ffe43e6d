use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::{Config, Limits};
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::protocol::handshake::find_head_end;
use crate::protocol::wire::{self, DecodeRules};
use crate::protocol::MessageAssembler;

/// Seed for the client-role mask generator. Server-role writers never mask.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Read an HTTP request head from `io`.
///
/// Bytes already in `buf` are examined first. On success the head is split
/// off and returned; anything the peer sent after it stays in `buf`.
///
/// # Errors
///
/// [`Error::HandshakeRejected`] with status 431 once the head exceeds
/// `limits.max_handshake_size`, [`Error::Transport`] on EOF or I/O failure.
pub async fn read_http_head<R>(io: &mut R, buf: &mut BytesMut, limits: &Limits) -> Result<BytesMut>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(end) = find_head_end(buf) {
            limits.check_handshake_size(end)?;
            return Ok(buf.split_to(end));
        }
        limits.check_handshake_size(buf.len())?;

        buf.reserve(1024);
        if io.read_buf(buf).await? == 0 {
            return Err(Error::Transport("connection closed during handshake".into()));
        }
    }
}

/// Decodes frames from the read half of a transport.
pub struct FrameReader<R> {
    io: R,
    buf: BytesMut,
    rules: DecodeRules,
    assembler: MessageAssembler,
    read_size: usize,
}

impl<R> FrameReader<R> {
    /// Create a reader for an endpoint with the given role.
    #[must_use]
    pub fn new(io: R, role: Role, config: &Config) -> Self {
        Self::with_buffer(io, role, config, BytesMut::with_capacity(config.read_buffer_size))
    }

    /// Create a reader that starts with bytes already read from the transport.
    #[must_use]
    pub fn with_buffer(io: R, role: Role, config: &Config, buf: BytesMut) -> Self {
        Self {
            io,
            buf,
            rules: DecodeRules::new(role, config),
            assembler: MessageAssembler::new(config.limits.clone()),
            read_size: config.read_buffer_size.max(64),
        }
    }

    /// Bytes buffered but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` on a clean EOF between frames. Cancel-safe: if the
    /// future is dropped, no buffered bytes are lost.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] for malformed frames, [`Error::Transport`] for I/O
    /// failures and for EOF in the middle of a frame or message.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            while let Some(raw) = wire::decode(&mut self.buf, &self.rules)? {
                if let Some(frame) = self.assembler.push(raw)? {
                    return Ok(Some(frame));
                }
            }

            if self.buf.capacity() - self.buf.len() < self.read_size / 2 {
                self.buf.reserve(self.read_size);
            }
            if self.io.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() && !self.assembler.is_assembling() {
                    return Ok(None);
                }
                return Err(Error::Transport("connection closed mid-frame".into()));
            }
        }
    }
}

/// Encodes frames onto the write half of a transport.
pub struct FrameWriter<W> {
    io: W,
    buf: BytesMut,
    role: Role,
    mask_counter: u32,
}

impl<W> FrameWriter<W> {
    /// Create a writer for an endpoint with the given role.
    ///
    /// Client writers mask every frame.
    #[must_use]
    pub fn new(io: W, role: Role) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(8192),
            role,
            mask_counter: random_mask_seed(),
        }
    }

    fn generate_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let a = self.mask_counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.io
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Encode and write one frame. Does not flush.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the write fails.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.generate_mask());
        self.buf.clear();
        wire::encode_frame(frame, mask, &mut self.buf);
        self.io.write_all(&self.buf).await?;
        Ok(())
    }

    /// Write raw bytes, used for the handshake response.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the write fails.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.io.write_all(bytes).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }

    /// Flush and shut down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
