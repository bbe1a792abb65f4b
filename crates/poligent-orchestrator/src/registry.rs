//! Registry of connected router peers

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use poligent_core::{ConnectionId, ManagementClient, PeerId, PeerIdentity};

/// A connected router peer
///
/// Lives exactly as long as its connection is registered.
pub struct PeerRecord {
    /// Registry key
    pub id: PeerId,
    /// Connection this record belongs to
    pub connection_id: ConnectionId,
    /// Identity the peer declared
    pub identity: PeerIdentity,
    /// Handle for issuing management operations
    pub client: Arc<dyn ManagementClient>,
    /// When the peer was registered
    pub connected_at: Instant,
    /// Held for the duration of a sync cycle
    pub(crate) sync_lock: Mutex<()>,
}

impl PeerRecord {
    /// Create a new record
    pub fn new(
        identity: PeerIdentity,
        connection_id: ConnectionId,
        client: Arc<dyn ManagementClient>,
    ) -> Self {
        Self {
            id: identity.peer_id(),
            connection_id,
            identity,
            client,
            connected_at: Instant::now(),
            sync_lock: Mutex::new(()),
        }
    }
}

impl std::fmt::Debug for PeerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerRecord")
            .field("id", &self.id)
            .field("connection_id", &self.connection_id)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Set of live peers, keyed by peer id
pub struct PeerRegistry {
    peers: DashMap<PeerId, Arc<PeerRecord>>,
}

impl PeerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Register a connected peer, replacing any stale record under its id
    pub fn register(
        &self,
        identity: PeerIdentity,
        connection_id: ConnectionId,
        client: Arc<dyn ManagementClient>,
    ) -> Arc<PeerRecord> {
        let record = Arc::new(PeerRecord::new(identity, connection_id, client));
        if let Some(previous) = self.peers.insert(record.id.clone(), Arc::clone(&record)) {
            tracing::warn!(
                "Peer {} re-registered on {} while still registered on {}",
                record.id,
                connection_id,
                previous.connection_id
            );
        }
        record
    }

    /// Remove a peer unconditionally
    pub fn unregister(&self, peer_id: &PeerId) -> Option<Arc<PeerRecord>> {
        self.peers.remove(peer_id).map(|(_, record)| record)
    }

    /// Remove a peer only if it is still registered on `connection_id`
    ///
    /// A late disconnect from an old connection must not evict the record
    /// of a newer connection under the same peer id.
    pub fn unregister_connection(
        &self,
        peer_id: &PeerId,
        connection_id: ConnectionId,
    ) -> Option<Arc<PeerRecord>> {
        self.peers
            .remove_if(peer_id, |_, record| record.connection_id == connection_id)
            .map(|(_, record)| record)
    }

    /// Whether `record` is the live registration for its peer id
    pub fn is_current(&self, record: &Arc<PeerRecord>) -> bool {
        self.peers
            .get(&record.id)
            .map(|r| Arc::ptr_eq(&r, record))
            .unwrap_or(false)
    }

    /// List all peers
    pub fn list(&self) -> Vec<Arc<PeerRecord>> {
        self.peers.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
