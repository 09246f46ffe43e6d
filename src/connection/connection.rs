use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::Config;
use crate::connection::queue::{QueueWriter, WriteQueue};
use crate::connection::{CloseInitiator, ConnectionId, ConnectionState};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::frame::{CloseCode, CloseFrame, Frame, Payload};
use crate::registry::Registry;

#[derive(Debug, Default)]
struct Lifecycle {
    state: ConnectionState,
    initiator: CloseInitiator,
    close_sent: bool,
    close_received: bool,
    peer_close: Option<CloseFrame>,
}

/// One client session: lifecycle state machine plus its outbound queue.
///
/// A `Connection` never touches the transport. The reader task feeds it
/// decoded frames through [`receive`](Self::receive); the writer task drains
/// its queue and reports a sent Close back through `on_close_sent`.
///
/// Lock order is lifecycle, then queue, then registry. The lifecycle lock is
/// never held while the dispatcher runs.
///
/// ## Example
///
/// ```rust,ignore
/// let conn = registry.get(id).ok_or(Error::UnknownConnection(id))?;
/// conn.enqueue(Frame::text("hello"))?;
/// conn.close(CloseCode::Normal, "bye")?;
/// ```
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    lifecycle: Mutex<Lifecycle>,
    queue: Arc<WriteQueue>,
    state_tx: watch::Sender<ConnectionState>,
    registry: Arc<Registry>,
    accept_binary: bool,
}

impl Connection {
    /// Create a connection in `Connecting`.
    #[must_use]
    pub fn new(id: ConnectionId, config: &Config, registry: Arc<Registry>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Arc::new(Self {
            id,
            lifecycle: Mutex::new(Lifecycle::default()),
            queue: Arc::new(WriteQueue::new(config.queue)),
            state_tx,
            registry,
            accept_binary: config.accept_binary,
        })
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().state
    }

    /// Which side sent the first Close frame.
    #[must_use]
    pub fn close_initiator(&self) -> CloseInitiator {
        self.lifecycle.lock().initiator
    }

    /// The Close frame received from the peer, if any.
    #[must_use]
    pub fn peer_close(&self) -> Option<CloseFrame> {
        self.lifecycle.lock().peer_close.clone()
    }

    /// Watch state changes. The current state is marked seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.queue.queued_bytes()
    }

    /// Claim the single writer for this connection's queue.
    #[must_use]
    pub fn take_writer(&self) -> Option<QueueWriter> {
        self.queue.writer()
    }

    /// Queue a frame for transmission.
    ///
    /// A Close frame is the same as calling [`close`](Self::close); a Close
    /// without a body closes with 1000.
    ///
    /// # Errors
    ///
    /// - [`Error::NotOpen`] unless the connection is `Open`.
    /// - [`Error::InvalidFrame`] / [`Error::InvalidCloseCode`] for frames that break framing rules.
    /// - [`Error::QueueFull`] when the budget is exhausted. The connection has
    ///   already begun closing with 1001 when this is returned.
    pub fn enqueue(&self, frame: Frame) -> Result<()> {
        if let Frame::Close(close) = frame {
            let close = close.unwrap_or_else(|| CloseFrame::new(CloseCode::Normal, ""));
            return self.close(close.code, close.reason);
        }
        frame.validate()?;

        let mut lc = self.lifecycle.lock();
        if lc.state != ConnectionState::Open {
            return Err(Error::NotOpen(lc.state));
        }
        self.enqueue_locked(&mut lc, frame)
    }

    /// Start the close handshake from this side.
    ///
    /// No-op once the connection is `Closing` or `Closed`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCloseCode`] for codes that must not be sent,
    /// [`Error::NotOpen`] while still `Connecting`.
    pub fn close(&self, code: CloseCode, reason: impl Into<String>) -> Result<()> {
        let close = CloseFrame::new(code, reason);
        close.validate()?;

        let mut lc = self.lifecycle.lock();
        match lc.state {
            ConnectionState::Open => {
                self.begin_close_locked(&mut lc, close);
                Ok(())
            }
            ConnectionState::Closing | ConnectionState::Closed => Ok(()),
            ConnectionState::Connecting => Err(Error::NotOpen(lc.state)),
        }
    }

    /// `Connecting -> Open`, then register.
    pub(crate) fn open(self: &Arc<Self>) -> Result<()> {
        let mut lc = self.lifecycle.lock();
        self.transition_locked(&mut lc, ConnectionState::Open)?;
        self.registry.register(self);
        Ok(())
    }

    /// `Connecting -> Closed` after a rejected upgrade. Never registered.
    pub(crate) fn fail_handshake(&self) {
        let mut lc = self.lifecycle.lock();
        if lc.state == ConnectionState::Connecting {
            self.finish_locked(&mut lc);
        }
    }

    /// Drive the state machine with one inbound frame.
    ///
    /// Control frames are answered before the dispatcher sees anything.
    /// Returns `Err` only for connection-fatal conditions, in which case the
    /// connection has already begun closing.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFrameType`], [`Error::QueueFull`] and
    /// [`Error::DispatcherFailure`]; [`Error::NotOpen`] while `Connecting`.
    pub(crate) fn receive(&self, frame: Frame, dispatcher: &dyn Dispatcher) -> Result<()> {
        let payload = {
            let mut lc = self.lifecycle.lock();
            match lc.state {
                ConnectionState::Open => {}
                ConnectionState::Closing => {
                    if let Frame::Close(close) = frame {
                        self.on_peer_close_locked(&mut lc, close);
                    }
                    return Ok(());
                }
                ConnectionState::Closed => return Ok(()),
                ConnectionState::Connecting => return Err(Error::NotOpen(lc.state)),
            }

            match frame {
                Frame::Ping(data) => return self.enqueue_locked(&mut lc, Frame::Pong(data)),
                Frame::Pong(_) => return Ok(()),
                Frame::Close(close) => {
                    self.on_peer_close_locked(&mut lc, close);
                    return Ok(());
                }
                Frame::Text(text) => Payload::Text(text),
                Frame::Binary(data) if self.accept_binary => Payload::Binary(data),
                other => {
                    let err = Error::UnsupportedFrameType(other.kind());
                    warn!(conn = %self.id, kind = other.kind(), "unsupported frame type");
                    self.begin_close_locked(
                        &mut lc,
                        CloseFrame::new(CloseCode::ProtocolError, "unsupported frame type"),
                    );
                    return Err(err);
                }
            }
        };

        self.dispatch(payload, dispatcher)
    }

    /// Record that the writer put our Close on the wire.
    pub(crate) fn on_close_sent(&self) {
        let mut lc = self.lifecycle.lock();
        lc.close_sent = true;
        if lc.state == ConnectionState::Closing && lc.close_received {
            self.finish_locked(&mut lc);
        }
    }

    /// Any state to `Closed` without a close handshake. Queued frames are discarded.
    pub(crate) fn abort(&self, reason: &Error) {
        let mut lc = self.lifecycle.lock();
        if lc.state == ConnectionState::Closed {
            return;
        }
        debug!(conn = %self.id, state = %lc.state, error = %reason, "aborting connection");
        self.finish_locked(&mut lc);
    }

    fn dispatch(&self, payload: Payload, dispatcher: &dyn Dispatcher) -> Result<()> {
        let frames = match catch_unwind(AssertUnwindSafe(|| dispatcher.on_message(self, payload))) {
            Ok(Ok(frames)) => frames,
            Ok(Err(err)) => return Err(self.fail_dispatch(err.to_string())),
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "dispatcher panicked".to_string());
                return Err(self.fail_dispatch(msg));
            }
        };

        for frame in frames {
            match self.enqueue(frame) {
                Ok(()) => {}
                // The dispatcher closed the connection itself.
                Err(Error::NotOpen(_)) => break,
                // Already closing with 1001.
                Err(err @ Error::QueueFull { .. }) => return Err(err),
                Err(err) => return Err(self.fail_dispatch(format!("invalid reply frame: {err}"))),
            }
        }
        Ok(())
    }

    fn fail_dispatch(&self, msg: String) -> Error {
        warn!(conn = %self.id, error = %msg, "dispatcher failure");
        let mut lc = self.lifecycle.lock();
        if lc.state == ConnectionState::Open {
            self.begin_close_locked(
                &mut lc,
                CloseFrame::new(CloseCode::InternalError, "internal error"),
            );
        }
        Error::DispatcherFailure(msg)
    }

    fn enqueue_locked(&self, lc: &mut Lifecycle, frame: Frame) -> Result<()> {
        match self.queue.push(frame) {
            Err(err @ Error::QueueFull { .. }) => {
                warn!(conn = %self.id, error = %err, "slow consumer, closing");
                self.begin_close_locked(lc, CloseFrame::new(CloseCode::GoingAway, "write queue full"));
                Err(err)
            }
            other => other,
        }
    }

    /// `Open -> Closing` with our Close queued.
    fn begin_close_locked(&self, lc: &mut Lifecycle, close: CloseFrame) {
        if self.transition_locked(lc, ConnectionState::Closing).is_err() {
            return;
        }
        lc.initiator = CloseInitiator::Local;
        if self.queue.push(Frame::Close(Some(close))).is_err() {
            self.finish_locked(lc);
        }
    }

    fn on_peer_close_locked(&self, lc: &mut Lifecycle, close: Option<CloseFrame>) {
        lc.close_received = true;
        lc.peer_close.clone_from(&close);

        if lc.state == ConnectionState::Open {
            debug!(conn = %self.id, code = ?close.as_ref().map(|c| c.code.as_u16()), "peer initiated close");
            lc.initiator = CloseInitiator::Remote;
            let _ = self.transition_locked(lc, ConnectionState::Closing);
            if self.queue.push(Frame::Close(close)).is_err() {
                self.finish_locked(lc);
            }
        } else if lc.close_sent {
            self.finish_locked(lc);
        }
    }

    fn transition_locked(&self, lc: &mut Lifecycle, next: ConnectionState) -> Result<()> {
        if !lc.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: lc.state,
                to: next,
            });
        }
        debug!(conn = %self.id, from = %lc.state, to = %next, "state transition");
        lc.state = next;
        self.state_tx.send_replace(next);
        Ok(())
    }

    /// Enter `Closed`: drop the queue, leave the registry, notify watchers.
    fn finish_locked(&self, lc: &mut Lifecycle) {
        if self.transition_locked(lc, ConnectionState::Closed).is_ok() {
            self.queue.abandon();
            self.registry.unregister(self.id);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueLimits;
    use crate::dispatcher::{DispatchError, EchoDispatcher, from_fn};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn open_conn(config: &Config) -> (Arc<Connection>, Arc<Registry>) {
        let registry = Arc::new(Registry::new());
        let conn = Connection::new(ConnectionId::next(), config, Arc::clone(&registry));
        conn.open().unwrap();
        (conn, registry)
    }

    fn drain(writer: &mut QueueWriter) -> Vec<Frame> {
        std::iter::from_fn(|| writer.try_next()).collect()
    }

    struct Counting(AtomicUsize);

    impl Dispatcher for Counting {
        fn on_message(&self, _: &Connection, _: Payload) -> std::result::Result<Vec<Frame>, DispatchError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_open_registers() {
        let (conn, registry) = open_conn(&Config::default());
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(registry.get(conn.id()).is_some());
        assert!(matches!(
            conn.open(),
            Err(Error::InvalidTransition { from: ConnectionState::Open, .. })
        ));
    }

    #[test]
    fn test_failed_handshake_never_registers() {
        let registry = Arc::new(Registry::new());
        let conn = Connection::new(ConnectionId::next(), &Config::default(), Arc::clone(&registry));
        conn.fail_handshake();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(registry.is_empty());
        assert!(conn.open().is_err());
    }

    #[test]
    fn test_frames_rejected_while_connecting() {
        let registry = Arc::new(Registry::new());
        let conn = Connection::new(ConnectionId::next(), &Config::default(), registry);
        let echo = EchoDispatcher::with_marker("m");
        assert_eq!(
            conn.receive(Frame::text("early"), &echo),
            Err(Error::NotOpen(ConnectionState::Connecting))
        );
        assert_eq!(
            conn.enqueue(Frame::text("early")),
            Err(Error::NotOpen(ConnectionState::Connecting))
        );
    }

    #[test]
    fn test_ping_answered_without_dispatch() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let counting = Counting(AtomicUsize::new(0));

        conn.receive(Frame::ping(Bytes::from_static(b"abc")), &counting)
            .unwrap();
        conn.receive(Frame::pong(Bytes::from_static(b"ignored")), &counting)
            .unwrap();

        assert_eq!(drain(&mut writer), vec![Frame::pong(Bytes::from_static(b"abc"))]);
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_echo_reply() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        conn.receive(Frame::text("ping-me"), &EchoDispatcher::with_marker("srv"))
            .unwrap();
        assert_eq!(drain(&mut writer), vec![Frame::text("ping-me,srv")]);
    }

    #[test]
    fn test_ping_flood_over_budget() {
        let config = Config::default().with_queue_limits(QueueLimits::new(1 << 20, 100));
        let (conn, registry) = open_conn(&config);
        let mut writer = conn.take_writer().unwrap();
        let counting = Counting(AtomicUsize::new(0));

        let mut results = Vec::new();
        for i in 0..1000u32 {
            results.push(conn.receive(Frame::ping(Bytes::from(i.to_be_bytes().to_vec())), &counting));
        }

        assert!(results[..100].iter().all(Result::is_ok));
        assert!(matches!(results[100], Err(Error::QueueFull { frames: 100, .. })));
        assert!(results[101..].iter().all(Result::is_ok));
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(conn.close_initiator(), CloseInitiator::Local);

        let frames = drain(&mut writer);
        assert_eq!(frames.len(), 101);
        for (i, frame) in frames[..100].iter().enumerate() {
            assert_eq!(*frame, Frame::pong(Bytes::from((i as u32).to_be_bytes().to_vec())));
        }
        assert_eq!(frames[100], Frame::close(CloseCode::GoingAway, "write queue full"));
        assert!(registry.get(conn.id()).is_some());
    }

    #[test]
    fn test_remote_close_handshake() {
        let (conn, registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let echo = EchoDispatcher::with_marker("m");

        conn.receive(Frame::close(CloseCode::Normal, "bye"), &echo)
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(conn.close_initiator(), CloseInitiator::Remote);
        assert_eq!(conn.peer_close(), Some(CloseFrame::new(CloseCode::Normal, "bye")));

        // Nothing but Close is processed while closing.
        conn.receive(Frame::text("late"), &echo).unwrap();
        conn.receive(Frame::ping(Bytes::new()), &echo).unwrap();

        assert_eq!(drain(&mut writer), vec![Frame::close(CloseCode::Normal, "bye")]);
        conn.on_close_sent();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(registry.get(conn.id()).is_none());
    }

    #[test]
    fn test_remote_close_without_code_echoes_empty_close() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        conn.receive(Frame::Close(None), &EchoDispatcher::with_marker("m"))
            .unwrap();
        assert_eq!(drain(&mut writer), vec![Frame::Close(None)]);
    }

    #[test]
    fn test_local_close_handshake() {
        let (conn, registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let echo = EchoDispatcher::with_marker("m");

        conn.close(CloseCode::Normal, "done").unwrap();
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(conn.close_initiator(), CloseInitiator::Local);
        assert_eq!(
            conn.enqueue(Frame::text("after close")),
            Err(Error::NotOpen(ConnectionState::Closing))
        );
        // Second close is a no-op.
        conn.close(CloseCode::GoingAway, "").unwrap();

        assert_eq!(drain(&mut writer), vec![Frame::close(CloseCode::Normal, "done")]);
        conn.on_close_sent();
        assert_eq!(conn.state(), ConnectionState::Closing);

        conn.receive(Frame::close(CloseCode::Normal, ""), &echo)
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.close_initiator(), CloseInitiator::Local);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_peer_close_before_ours_is_sent() {
        let (conn, _registry) = open_conn(&Config::default());
        let _writer = conn.take_writer().unwrap();
        conn.close(CloseCode::Normal, "").unwrap();
        conn.receive(Frame::close(CloseCode::Normal, ""), &EchoDispatcher::with_marker("m"))
            .unwrap();
        assert_eq!(conn.state(), ConnectionState::Closing);
        conn.on_close_sent();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_binary_unsupported_by_default() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let counting = Counting(AtomicUsize::new(0));

        assert_eq!(
            conn.receive(Frame::binary(vec![1, 2, 3]), &counting),
            Err(Error::UnsupportedFrameType("Binary"))
        );
        assert_eq!(conn.state(), ConnectionState::Closing);
        conn.receive(Frame::text("ignored"), &counting).unwrap();
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);

        assert_eq!(
            drain(&mut writer),
            vec![Frame::close(CloseCode::ProtocolError, "unsupported frame type")]
        );
    }

    #[test]
    fn test_binary_dispatched_when_enabled() {
        let (conn, _registry) = open_conn(&Config::default().with_accept_binary(true));
        let mut writer = conn.take_writer().unwrap();
        conn.receive(Frame::binary(vec![9, 9]), &EchoDispatcher::with_marker("m"))
            .unwrap();
        assert_eq!(drain(&mut writer), vec![Frame::binary(vec![9, 9])]);
    }

    #[test]
    fn test_stray_continuation_unsupported() {
        let (conn, _registry) = open_conn(&Config::default().with_accept_binary(true));
        assert_eq!(
            conn.receive(Frame::Continuation(Bytes::new()), &EchoDispatcher::with_marker("m")),
            Err(Error::UnsupportedFrameType("Continuation"))
        );
    }

    #[test]
    fn test_dispatcher_error_closes_with_internal_error() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let failing = from_fn(|_conn: &Connection, _payload: Payload| Err("boom".into()));

        assert_eq!(
            conn.receive(Frame::text("x"), &failing),
            Err(Error::DispatcherFailure("boom".into()))
        );
        assert_eq!(
            drain(&mut writer),
            vec![Frame::close(CloseCode::InternalError, "internal error")]
        );
    }

    #[test]
    fn test_dispatcher_panic_is_contained() {
        let (conn, _registry) = open_conn(&Config::default());
        let panicking = from_fn(|_conn: &Connection, _payload: Payload| -> std::result::Result<Vec<Frame>, DispatchError> {
            panic!("handler exploded")
        });

        assert_eq!(
            conn.receive(Frame::text("x"), &panicking),
            Err(Error::DispatcherFailure("handler exploded".into()))
        );
        assert_eq!(conn.state(), ConnectionState::Closing);
    }

    #[test]
    fn test_dispatcher_may_close_mid_reply() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let closing = from_fn(|conn: &Connection, _payload: Payload| {
            conn.close(CloseCode::Normal, "enough")?;
            Ok(vec![Frame::text("dropped")])
        });

        conn.receive(Frame::text("x"), &closing).unwrap();
        assert_eq!(drain(&mut writer), vec![Frame::close(CloseCode::Normal, "enough")]);
    }

    #[test]
    fn test_invalid_reply_frame_closes_with_internal_error() {
        let (conn, _registry) = open_conn(&Config::default());
        let mut writer = conn.take_writer().unwrap();
        let oversized = from_fn(|_conn: &Connection, _payload: Payload| {
            Ok(vec![Frame::ping(vec![0u8; 200]), Frame::text("second")])
        });

        assert!(matches!(
            conn.receive(Frame::text("x"), &oversized),
            Err(Error::DispatcherFailure(msg)) if msg.contains("control payload too large")
        ));
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(conn.close_initiator(), CloseInitiator::Local);
        assert_eq!(
            drain(&mut writer),
            vec![Frame::close(CloseCode::InternalError, "internal error")]
        );
    }

    #[test]
    fn test_enqueue_rejects_continuation() {
        let (conn, _registry) = open_conn(&Config::default());
        assert!(matches!(
            conn.enqueue(Frame::Continuation(Bytes::from_static(b"zz"))),
            Err(Error::InvalidFrame(_))
        ));
        assert_eq!(conn.queued_frames(), 0);
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn test_abort_discards_queue() {
        let (conn, registry) = open_conn(&Config::default());
        conn.enqueue(Frame::text("a")).unwrap();
        conn.enqueue(Frame::text("b")).unwrap();
        let mut state_rx = conn.subscribe();

        conn.abort(&Error::Transport("reset".into()));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.queued_frames(), 0);
        assert!(registry.is_empty());
        assert!(state_rx.has_changed().unwrap());
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Closed);

        // Terminal: nothing moves it back.
        assert!(conn.open().is_err());
        conn.close(CloseCode::Normal, "").unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_invalid_close_code_rejected() {
        let (conn, _registry) = open_conn(&Config::default());
        assert_eq!(
            conn.close(CloseCode::Other(1005), ""),
            Err(Error::InvalidCloseCode(1005))
        );
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn test_enqueue_close_frame_closes() {
        let (conn, _registry) = open_conn(&Config::default());
        conn.enqueue(Frame::Close(None)).unwrap();
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert_eq!(conn.close_initiator(), CloseInitiator::Local);
    }

    #[test]
    fn test_drop_unregisters() {
        let (conn, registry) = open_conn(&Config::default());
        assert_eq!(registry.len(), 1);
        drop(conn);
        assert!(registry.is_empty());
    }
}
