//! Index of open connections.
//!
//! The registry holds weak references only: dropping every other handle to a
//! connection removes it. Registration happens at `Connecting -> Open` and
//! removal at `-> Closed`, both driven by [`Connection`] itself.

use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::connection::{Connection, ConnectionId};
use crate::error::{Error, Result};
use crate::frame::{CloseCode, Frame};

/// Concurrent lookup index from [`ConnectionId`] to [`Connection`].
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<ConnectionId, Weak<Connection>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, conn: &Arc<Connection>) {
        self.entries.insert(conn.id(), Arc::downgrade(conn));
    }

    /// Remove `id`. Returns `false` if it was not registered, so a second
    /// call is a no-op.
    pub(crate) fn unregister(&self, id: ConnectionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Look up a live connection.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.entries.get(&id).and_then(|entry| entry.upgrade())
    }

    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lazy snapshot of the registered connections.
    ///
    /// The set of ids is fixed when this is called. Each connection is looked
    /// up again when visited, so one that was unregistered in between is
    /// skipped; none is visited twice.
    #[must_use]
    pub fn iter(&self) -> Snapshot<'_> {
        let ids: Vec<ConnectionId> = self.entries.iter().map(|entry| *entry.key()).collect();
        Snapshot {
            registry: self,
            ids: ids.into_iter(),
        }
    }

    /// Visit every connection in a snapshot.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for conn in self.iter() {
            visitor(&conn);
        }
    }

    /// Enqueue `frame` on every connection registered at the time of the call.
    ///
    /// A connection that fails (queue full, no longer open) does not stop the
    /// broadcast; it is reported in [`BroadcastResult::failed`].
    pub fn broadcast(&self, frame: &Frame) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        for conn in self.iter() {
            match conn.enqueue(frame.clone()) {
                Ok(()) => result.delivered += 1,
                Err(err) => result.failed.push((conn.id(), err)),
            }
        }
        result
    }

    /// Close one connection by id.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConnection`] if `id` is not registered, otherwise
    /// whatever [`Connection::close`] returns.
    pub fn close(&self, id: ConnectionId, code: CloseCode, reason: impl Into<String>) -> Result<()> {
        self.get(id)
            .ok_or(Error::UnknownConnection(id))?
            .close(code, reason)
    }
}

/// Iterator returned by [`Registry::iter`].
#[derive(Debug)]
pub struct Snapshot<'a> {
    registry: &'a Registry,
    ids: std::vec::IntoIter<ConnectionId>,
}

impl Iterator for Snapshot<'_> {
    type Item = Arc<Connection>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.by_ref().find_map(|id| self.registry.get(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

/// Outcome of [`Registry::broadcast`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Connections the frame was queued on.
    pub delivered: usize,
    /// Connections that refused the frame.
    pub failed: Vec<(ConnectionId, Error)>,
}

impl BroadcastResult {
    #[must_use]
    pub fn total_attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
