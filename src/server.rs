//! Accept loop and per-connection tasks.
//!
//! Each connection runs on two tasks: the reader (the task that called
//! [`Server::serve_connection`]) decodes frames and drives the
//! [`Connection`] state machine, and a spawned writer owns the single
//! [`QueueWriter`] and is the only code that writes to the transport.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use crate::codec::{FrameReader, FrameWriter, read_http_head};
use crate::config::Config;
use crate::connection::{Connection, ConnectionId, ConnectionState, QueueWriter, Role};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::frame::CloseCode;
use crate::protocol::{HandshakeResult, UpgradeRequest, attempt_upgrade};
use crate::registry::Registry;
use crate::stats::ServerStats;

/// Back-off after a failed `accept`, so a persistent error (EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A WebSocket server: configuration, registry, dispatcher and counters.
///
/// Cheap to clone; clones share the same registry and stats.
#[derive(Clone)]
pub struct Server {
    config: Arc<Config>,
    registry: Arc<Registry>,
    dispatcher: Arc<dyn Dispatcher>,
    stats: Arc<ServerStats>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("connections", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Server {
    #[must_use]
    pub fn new(config: Config, dispatcher: impl Dispatcher) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(Registry::new()),
            dispatcher: Arc::new(dispatcher),
            stats: Arc::new(ServerStats::new()),
        }
    }

    /// Registry of this server's open connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// On shutdown every open connection is closed with 1001 and the call
    /// waits up to `close_timeout` for them to finish.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and retried; this only fails if the
    /// listener's address cannot be read.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        info!(%addr, "listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            debug!(%peer, error = %err, "set_nodelay failed");
                        }
                        info!(%peer, "accepted connection");
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(err) = server.serve_connection(stream).await {
                                debug!(%peer, error = %err, "connection ended with error");
                            }
                        });
                    }
                    Err(err) => {
                        error!(error = %err, "accept failed");
                        self.stats.accept_error();
                        sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close every open connection with 1001 and wait for them to drain.
    pub async fn shutdown(&self) {
        info!(open = self.registry.len(), "shutting down");
        self.registry.for_each(|conn| {
            if let Err(err) = conn.close(CloseCode::GoingAway, "server shutting down") {
                debug!(conn = %conn.id(), error = %err, "close on shutdown failed");
            }
        });

        let deadline = Instant::now() + self.config.close_timeout;
        while !self.registry.is_empty() && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Run one connection to completion over any byte transport.
    ///
    /// Returns the connection once it is `Closed`.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeRejected`] after an error response has been written,
    /// or [`Error::Transport`] if the transport fails before the upgrade
    /// completes. Failures after the upgrade are not errors: they end in
    /// `Closed` like any other connection.
    pub async fn serve_connection<S>(&self, stream: S) -> Result<Arc<Connection>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.stats.connection_opened();
        let result = self.run_connection(stream).await;
        self.stats.connection_closed();
        result
    }

    async fn run_connection<S>(&self, stream: S) -> Result<Arc<Connection>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut rd, wr) = tokio::io::split(stream);
        let mut writer = FrameWriter::new(wr, Role::Server);
        let conn = Connection::new(ConnectionId::next(), &self.config, Arc::clone(&self.registry));
        let queue = conn
            .take_writer()
            .ok_or_else(|| Error::Transport("write queue already claimed".into()))?;

        let mut buf = BytesMut::with_capacity(self.config.read_buffer_size);
        let head = match timeout(
            self.config.handshake_timeout,
            read_http_head(&mut rd, &mut buf, &self.config.limits),
        )
        .await
        {
            Ok(Ok(head)) => head,
            Ok(Err(Error::HandshakeRejected { status, reason })) => {
                return Err(self.reject(&conn, &mut writer, status, reason).await);
            }
            Ok(Err(err)) => {
                debug!(conn = %conn.id(), error = %err, "transport failed during handshake");
                conn.fail_handshake();
                return Err(err);
            }
            Err(_) => {
                return Err(self.reject(&conn, &mut writer, 408, "handshake timed out".into()).await);
            }
        };

        let request = match UpgradeRequest::parse(&head) {
            Ok(request) => request,
            Err(Error::HandshakeRejected { status, reason }) => {
                return Err(self.reject(&conn, &mut writer, status, reason).await);
            }
            Err(err) => {
                return Err(self.reject(&conn, &mut writer, 400, err.to_string()).await);
            }
        };
        let response = match attempt_upgrade(&request) {
            HandshakeResult::Accepted(response) => response,
            HandshakeResult::Rejected { status, reason } => {
                return Err(self.reject(&conn, &mut writer, status, reason).await);
            }
        };

        conn.open()?;
        let written = async {
            writer.write_raw(&response.to_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = written {
            conn.abort(&err);
            return Err(err);
        }
        info!(conn = %conn.id(), path = request.path(), "connection upgraded");

        let mut write_task = tokio::spawn(write_loop(Arc::clone(&conn), queue, writer));
        let mut reader = FrameReader::with_buffer(rd, Role::Server, &self.config, buf);
        let timed_out = self.read_loop(&conn, &mut reader).await;

        if timed_out {
            write_task.abort();
        } else if timeout(self.config.close_timeout, &mut write_task).await.is_err() {
            debug!(conn = %conn.id(), "writer did not finish, cancelling");
            write_task.abort();
        }
        debug!(conn = %conn.id(), initiator = %conn.close_initiator(), "connection closed");
        Ok(conn)
    }

    /// Feed frames into `conn` until it is `Closed`.
    ///
    /// The drain timer is armed the first time `Closing` is observed.
    /// Returns `true` if the timer fired.
    async fn read_loop<R>(&self, conn: &Connection, reader: &mut FrameReader<R>) -> bool
    where
        R: AsyncRead + Unpin,
    {
        let mut state_rx = conn.subscribe();
        let mut drain_deadline: Option<Instant> = None;

        loop {
            match *state_rx.borrow_and_update() {
                ConnectionState::Closed => return false,
                ConnectionState::Closing if drain_deadline.is_none() => {
                    drain_deadline = Some(Instant::now() + self.config.close_timeout);
                }
                _ => {}
            }

            tokio::select! {
                read = reader.read_frame() => match read {
                    Ok(Some(frame)) => {
                        self.stats.frame_received();
                        if let Err(err) = conn.receive(frame, &*self.dispatcher) {
                            debug!(conn = %conn.id(), error = %err, "frame handling closed the connection");
                        }
                    }
                    Ok(None) => conn.abort(&Error::Transport("peer closed the transport".into())),
                    Err(err) => {
                        debug!(conn = %conn.id(), error = %err, "read failed");
                        conn.abort(&err);
                    }
                },
                _ = state_rx.changed() => {}
                () = sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() => {
                    warn!(conn = %conn.id(), timeout = ?self.config.close_timeout, "close handshake timed out");
                    self.stats.drain_timeout();
                    conn.abort(&Error::Transport("close handshake timed out".into()));
                    return true;
                }
            }
        }
    }

    /// Write an HTTP error response, then move `conn` to `Closed`.
    async fn reject<W>(
        &self,
        conn: &Connection,
        writer: &mut FrameWriter<W>,
        status: u16,
        reason: String,
    ) -> Error
    where
        W: AsyncWrite + Unpin,
    {
        debug!(conn = %conn.id(), status, reason = %reason, "upgrade rejected");
        self.stats.handshake_rejected();
        conn.fail_handshake();

        let response = HandshakeResult::rejected(status, reason.clone()).to_bytes();
        let written = async {
            writer.write_raw(&response).await?;
            writer.shutdown().await
        }
        .await;
        if let Err(err) = written {
            debug!(conn = %conn.id(), error = %err, "failed to write rejection");
        }
        Error::HandshakeRejected { status, reason }
    }
}

/// Drain the queue onto the transport until it is abandoned.
async fn write_loop<W>(conn: Arc<Connection>, mut queue: QueueWriter, mut writer: FrameWriter<W>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.next().await {
        let is_close = frame.is_close();
        let written = async {
            writer.write_frame(&frame).await?;
            if is_close || queue.is_empty() {
                writer.flush().await?;
            }
            Ok::<_, Error>(())
        }
        .await;

        if let Err(err) = written {
            debug!(conn = %conn.id(), error = %err, "write failed");
            conn.abort(&err);
            break;
        }
        if is_close {
            conn.on_close_sent();
        }
    }

    if let Err(err) = writer.shutdown().await {
        debug!(conn = %conn.id(), error = %err, "shutdown failed");
    }
}
