//! Application callback boundary.
//!
//! The engine hands every inbound application message to a [`Dispatcher`]
//! and queues whatever frames it returns, in order. Errors and panics raised
//! by the dispatcher are contained by the connection that called it and
//! close only that connection (code 1011).

use std::fmt;

use crate::connection::Connection;
use crate::frame::{Frame, Payload};

/// Error type a dispatcher may return.
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Handles application messages for every connection of a server.
///
/// `on_message` runs on the connection's read task. It may call
/// [`Connection::enqueue`] or [`Connection::close`] on `conn` directly;
/// frames in the returned vector are queued after any it enqueued itself.
pub trait Dispatcher: Send + Sync + 'static {
    /// Handle one Text (or accepted Binary) message.
    ///
    /// # Errors
    ///
    /// Any error closes the connection with 1011.
    fn on_message(&self, conn: &Connection, payload: Payload) -> Result<Vec<Frame>, DispatchError>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for std::sync::Arc<D> {
    fn on_message(&self, conn: &Connection, payload: Payload) -> Result<Vec<Frame>, DispatchError> {
        (**self).on_message(conn, payload)
    }
}

/// Dispatcher built from a closure. See [`from_fn`].
#[derive(Clone)]
pub struct FnDispatcher<F> {
    f: F,
}

impl<F> fmt::Debug for FnDispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDispatcher").finish_non_exhaustive()
    }
}

impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(&Connection, Payload) -> Result<Vec<Frame>, DispatchError> + Send + Sync + 'static,
{
    fn on_message(&self, conn: &Connection, payload: Payload) -> Result<Vec<Frame>, DispatchError> {
        (self.f)(conn, payload)
    }
}

/// Wrap a closure as a [`Dispatcher`].
///
/// ```rust
/// use wsengine::{Frame, Payload, from_fn};
///
/// let upper = from_fn(|_conn, payload: Payload| {
///     Ok(payload
///         .as_text()
///         .map(|s| vec![Frame::text(s.to_uppercase())])
///         .unwrap_or_default())
/// });
/// # let _ = upper;
/// ```
pub fn from_fn<F>(f: F) -> FnDispatcher<F>
where
    F: Fn(&Connection, Payload) -> Result<Vec<Frame>, DispatchError> + Send + Sync + 'static,
{
    FnDispatcher { f }
}

#[derive(Debug, Clone)]
enum Marker {
    Fixed(String),
    Timestamp,
}

/// Echoes each message back to its sender.
///
/// Text comes back as `"<text>,<marker>"`. The marker defaults to the local
/// server time (`server time: 2024-01-31 12:00:00`); [`with_marker`](Self::with_marker)
/// pins it to a fixed string. Binary is echoed unchanged.
#[derive(Debug, Clone)]
pub struct EchoDispatcher {
    marker: Marker,
}

impl EchoDispatcher {
    /// Echo with a server timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self {
            marker: Marker::Timestamp,
        }
    }

    /// Echo with a fixed suffix.
    #[must_use]
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: Marker::Fixed(marker.into()),
        }
    }

    fn marker(&self) -> String {
        match &self.marker {
            Marker::Fixed(s) => s.clone(),
            Marker::Timestamp => format!(
                "server time: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
}

impl Default for EchoDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for EchoDispatcher {
    fn on_message(&self, _conn: &Connection, payload: Payload) -> Result<Vec<Frame>, DispatchError> {
        let reply = match payload {
            Payload::Text(text) => Frame::Text(format!("{text},{}", self.marker())),
            Payload::Binary(data) => Frame::Binary(data),
        };
        Ok(vec![reply])
    }
}
