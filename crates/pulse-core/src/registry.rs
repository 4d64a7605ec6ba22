//! Registry of live dashboard connections.
//!
//! Each `WebSocket` client owns an unbounded channel; the registry
//! holds the sending half keyed by a monotonic connection id. The
//! broadcast loop sweeps the registry once per tick and pushes the
//! serialized message into every channel. Sends are in-memory channel
//! writes, never socket I/O (the socket write happens in each
//! connection's own forwarding task), so the guard is held only for
//! membership mutation and the sweep itself and one slow peer cannot
//! stall delivery to the rest.
//!
//! A failed send means the receiving half is gone (the client
//! disconnected or its task died); the entry is evicted during the
//! same sweep.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Identifier for one registered live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Process-wide set of live connection handles.
///
/// Constructed once at startup, shared between the accept path (which
/// registers and unregisters) and the broadcast loop (which sweeps).
/// Membership carries no ordering guarantee.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Mutex<BTreeMap<ConnectionId, UnboundedSender<String>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and return its id.
    pub fn register(&self, sender: UnboundedSender<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, sender);
        debug!(%id, "live connection registered");
        id
    }

    /// Remove a connection. Returns whether it was present.
    ///
    /// Safe to call for an id already evicted by a failed broadcast
    /// delivery.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(%id, "live connection unregistered");
        }
        removed
    }

    /// Deliver a message to every registered connection.
    ///
    /// Connections whose channel is closed are evicted; the failure
    /// never propagates to other connections. Returns the number of
    /// successful deliveries.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut connections = self.lock();
        let mut delivered: usize = 0;
        let mut dropped = Vec::new();
        for (id, sender) in connections.iter() {
            if sender.send(message.to_owned()).is_ok() {
                delivered = delivered.saturating_add(1);
            } else {
                dropped.push(*id);
            }
        }
        for id in dropped {
            connections.remove(&id);
            debug!(%id, "live connection dropped (delivery failed)");
        }
        delivered
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, UnboundedSender<String>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn register_then_unregister_leaves_registry_empty() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = registry.register(tx);
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(id));
        assert!(registry.is_empty());

        // A second unregister of the same id is a no-op.
        assert!(!registry.unregister(id));
    }

    #[test]
    fn broadcast_delivers_to_all_connections() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(tx_a);
        registry.register(tx_b);

        let delivered = registry.broadcast("hello");
        assert_eq!(delivered, 2);
        assert_eq!(rx_a.try_recv().unwrap(), "hello");
        assert_eq!(rx_b.try_recv().unwrap(), "hello");
    }

    #[test]
    fn failed_delivery_evicts_only_the_broken_connection() {
        let registry = ConnectionRegistry::new();
        let (tx_broken, rx_broken) = mpsc::unbounded_channel();
        let (tx_healthy, mut rx_healthy) = mpsc::unbounded_channel();
        registry.register(tx_broken);
        registry.register(tx_healthy);

        // Simulate a disconnected peer: its receiving half is gone.
        drop(rx_broken);

        let delivered = registry.broadcast("tick");
        assert_eq!(delivered, 1);
        assert_eq!(rx_healthy.try_recv().unwrap(), "tick");
        assert_eq!(registry.len(), 1);

        // The healthy connection keeps receiving on later sweeps.
        let delivered = registry.broadcast("tick-2");
        assert_eq!(delivered, 1);
        assert_eq!(rx_healthy.try_recv().unwrap(), "tick-2");
    }
}
