//! Connection lifecycle, write queue and identity.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - upgrade request being read and checked
//! 2. **Open** - registered, frames flow both ways
//! 3. **Closing** - a Close is queued or received; waiting for the other one
//! 4. **Closed** - queue discarded, unregistered, terminal
//!
//! A decode or transport error jumps straight to **Closed**.

mod id;
mod queue;
mod role;
mod state;

pub use id::ConnectionId;
pub use queue::{QueueWriter, WriteQueue};
pub use role::Role;
pub use state::{CloseInitiator, ConnectionState};

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
