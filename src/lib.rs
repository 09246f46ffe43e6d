//! # wsengine - WebSocket server engine
//!
//! A connection state machine, a bounded single-writer write queue per
//! connection, and a registry of open connections, wired to an RFC 6455
//! codec and an accept loop.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: `Connecting -> Open -> Closing -> Closed`, with a
//!   drain timer on `Closing`
//! - **Backpressure**: enqueue never blocks; a slow consumer gets `QueueFull`
//!   and a 1001 Close
//! - **Pluggable application**: a [`Dispatcher`] turns inbound messages into
//!   outbound frames; its errors and panics close only its own connection
//! - **Registry**: lookup, lazy snapshot iteration and broadcast
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsengine::{Config, EchoDispatcher, Server};
//!
//! let server = Server::new(Config::default(), EchoDispatcher::new());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! server.serve(listener, async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use config::{Config, Limits, QueueLimits};
pub use connection::{
    CloseInitiator, Connection, ConnectionId, ConnectionState, QueueWriter, Role, WriteQueue,
};
pub use dispatcher::{DispatchError, Dispatcher, EchoDispatcher, FnDispatcher, from_fn};
pub use error::{DecodeError, Error, Result};
pub use frame::{CloseCode, CloseFrame, Frame, Payload};
pub use protocol::{
    HandshakeResponse, HandshakeResult, OpCode, UpgradeRequest, WS_GUID, attempt_upgrade,
    compute_accept_key,
};
pub use registry::{BroadcastResult, Registry};
pub use server::Server;
pub use stats::{ServerStats, StatsSnapshot};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Frame>();
        assert_send::<CloseFrame>();
        assert_send::<ConnectionState>();
        assert_send::<Connection>();
        assert_send::<Registry>();
        assert_send::<Server>();
        assert_send::<QueueWriter>();
    }

    #[test]
    fn test_public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Frame>();
        assert_sync::<Connection>();
        assert_sync::<Registry>();
        assert_sync::<Server>();
        assert_sync::<WriteQueue>();
    }
}
