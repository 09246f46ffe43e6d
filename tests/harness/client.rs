//! WebSocket test client.
//!
//! Speaks the client side of the handshake and sends masked frames. Works over
//! a `TcpStream` or a `tokio::io::duplex` half.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use wsengine::codec::{FrameReader, FrameWriter, read_http_head};
use wsengine::{CloseCode, Config, Frame, Limits, Result, Role, compute_accept_key};

/// Sample nonce from RFC 6455 section 1.3.
pub const TEST_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A well-formed upgrade request for `key`.
pub fn upgrade_request(key: &str) -> String {
    format!(
        "GET /chat HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    )
}

/// Send raw bytes and read until the server closes the transport.
pub async fn raw_exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(RECV_TIMEOUT, stream.read_to_end(&mut response))
        .await
        .expect("server did not close the transport")
        .unwrap();
    String::from_utf8(response).unwrap()
}

pub struct TestClient<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
}

impl TestClient<TcpStream> {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream).await
    }
}

impl<S: AsyncRead + AsyncWrite> TestClient<S> {
    /// Perform the opening handshake and check the accept key.
    pub async fn handshake(stream: S) -> Result<Self> {
        let (mut rd, mut wr) = tokio::io::split(stream);
        wr.write_all(upgrade_request(TEST_KEY).as_bytes()).await?;
        wr.flush().await?;

        let mut buf = BytesMut::new();
        let head = read_http_head(&mut rd, &mut buf, &Limits::default()).await?;
        let head = String::from_utf8_lossy(&head);
        assert!(head.starts_with("HTTP/1.1 101 "), "unexpected response: {head}");
        assert!(
            head.contains(&format!("Sec-WebSocket-Accept: {}", compute_accept_key(TEST_KEY))),
            "bad accept key: {head}"
        );

        Ok(Self {
            reader: FrameReader::with_buffer(rd, Role::Client, &Config::default(), buf),
            writer: FrameWriter::new(wr, Role::Client),
        })
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame).await?;
        self.writer.flush().await
    }

    /// Write bytes as-is, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_raw(bytes).await?;
        self.writer.flush().await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(&Frame::text(text)).await
    }

    /// Next frame, or `None` once the server closed the transport.
    ///
    /// Panics if nothing arrives within five seconds.
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        tokio::time::timeout(RECV_TIMEOUT, self.reader.read_frame())
            .await
            .expect("timed out waiting for a frame")
    }

    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        match self.recv().await? {
            Some(Frame::Text(text)) => Ok(Some(text)),
            Some(other) => panic!("expected text, got {other:?}"),
            None => Ok(None),
        }
    }

    /// Start a normal close and return the server's Close frame.
    pub async fn close(&mut self) -> Result<Option<Frame>> {
        self.send(&Frame::close(CloseCode::Normal, "")).await?;
        self.recv_close().await
    }

    /// Skip frames until a Close arrives.
    pub async fn recv_close(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.recv().await? {
                Some(frame @ Frame::Close(_)) => return Ok(Some(frame)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }
}
