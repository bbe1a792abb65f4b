//! Top-level coordination of desired-state loads and peer connections
//!
//! The `Orchestrator` owns the desired-state store, the peer registry and
//! the engine. It is driven through three entry points:
//!
//! - `on_desired_state_loaded`: swap the desired state and sync every
//!   registered peer
//! - `on_peer_connected`: register a router and sync it alone
//! - `on_peer_disconnected`: drop the peer's registration
//!
//! Registry and store mutations happen synchronously inside the entry
//! point, so callers that process events in order get a registry that
//! reflects that order. The sync cycles themselves run on spawned tasks
//! and interleave freely across peers.
//!
//! # Per-peer serialization
//!
//! A peer runs at most one cycle at a time. A cycle waits for the previous
//! one on the same peer, then reads the desired state, so a queued cycle
//! always works toward the newest desired state. A cycle whose peer was
//! unregistered or replaced while it waited ends with `SyncError::PeerGone`.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;

use poligent_core::config::OrchestratorConfig;
use poligent_core::{
    ConnectionId, DesiredState, ManagementClient, PeerId, PeerIdentity, SyncError,
};

use crate::engine::{ReconciliationEngine, SyncOutcome};
use crate::registry::{PeerRecord, PeerRegistry};
use crate::store::DesiredStateStore;

/// Result of one peer's cycle in a fan-out
#[derive(Debug)]
pub struct PeerSyncReport {
    pub peer_id: PeerId,
    pub result: Result<SyncOutcome, SyncError>,
}

/// Coordinates desired state, connected peers and sync cycles
pub struct Orchestrator {
    /// Product a peer must declare to be synced
    expected_product: String,
    desired: DesiredStateStore,
    registry: PeerRegistry,
    engine: ReconciliationEngine,
}

impl Orchestrator {
    /// Create an orchestrator from configuration
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self::with_engine(
            config.expected_product.clone(),
            ReconciliationEngine::with_max_passes(config.max_sync_passes),
        )
    }

    /// Create an orchestrator with an explicit engine
    pub fn with_engine(expected_product: impl Into<String>, engine: ReconciliationEngine) -> Self {
        Self {
            expected_product: expected_product.into(),
            desired: DesiredStateStore::new(),
            registry: PeerRegistry::new(),
            engine,
        }
    }

    /// Get the desired-state store
    pub fn desired_state(&self) -> &DesiredStateStore {
        &self.desired
    }

    /// Get the peer registry
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Replace the desired state and sync every registered peer.
    ///
    /// The returned task resolves once every peer's cycle has finished; one
    /// peer failing does not affect the others.
    pub fn on_desired_state_loaded(
        self: &Arc<Self>,
        desired: DesiredState,
    ) -> JoinHandle<Vec<PeerSyncReport>> {
        let desired = self.desired.replace(desired);
        tracing::info!("Policy updated: {}", desired.to_json());

        let this = Arc::clone(self);
        tokio::spawn(async move { this.sync_all().await })
    }

    /// Register a newly connected peer and sync it.
    ///
    /// Peers declaring another product are ignored and `None` is returned.
    pub fn on_peer_connected(
        self: &Arc<Self>,
        identity: PeerIdentity,
        connection_id: ConnectionId,
        client: Arc<dyn ManagementClient>,
    ) -> Option<JoinHandle<Result<SyncOutcome, SyncError>>> {
        if !identity.is_product(&self.expected_product) {
            tracing::debug!(
                "Ignoring {} on {}: product {:?} is not {}",
                identity.container_id,
                connection_id,
                identity.product,
                self.expected_product
            );
            return None;
        }

        let peer = self.registry.register(identity, connection_id, client);
        tracing::info!("Router connected from {}", peer.id);

        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.sync_peer(peer).await }))
    }

    /// Unregister a peer whose connection closed.
    ///
    /// Returns whether a registration was removed. A disconnect from a
    /// connection that has since been superseded removes nothing.
    pub fn on_peer_disconnected(&self, peer_id: &PeerId, connection_id: ConnectionId) -> bool {
        match self.registry.unregister_connection(peer_id, connection_id) {
            Some(peer) => {
                tracing::info!(
                    "Router {} disconnected after {:?}",
                    peer_id,
                    peer.connected_at.elapsed()
                );
                true
            }
            None => {
                tracing::debug!("No registration for {} on {}", peer_id, connection_id);
                false
            }
        }
    }

    /// Sync every registered peer concurrently
    pub async fn sync_all(&self) -> Vec<PeerSyncReport> {
        let peers = self.registry.list();
        let results = join_all(peers.into_iter().map(|peer| async move {
            let peer_id = peer.id.clone();
            let result = self.sync_peer(peer).await;
            PeerSyncReport { peer_id, result }
        }))
        .await;

        if !results.is_empty() && results.iter().all(|r| r.result.is_ok()) {
            tracing::info!("All routers synced");
        }
        results
    }

    /// Run one cycle for `peer` against the current desired state
    pub async fn sync_peer(&self, peer: Arc<PeerRecord>) -> Result<SyncOutcome, SyncError> {
        let _guard = peer.sync_lock.lock().await;

        let result = self.run_cycle(&peer).await;
        match &result {
            Ok(outcome) if outcome.was_in_sync() => {
                tracing::info!("Policy already in sync on {}", peer.id)
            }
            Ok(outcome) => tracing::info!(
                "Policy synced on {} ({} changes over {} passes)",
                peer.id,
                outcome.applied,
                outcome.passes
            ),
            Err(SyncError::NoDesiredState) => {
                tracing::info!("No desired state loaded yet, deferring sync of {}", peer.id)
            }
            Err(e) => tracing::warn!("Sync failed on {}: {}", peer.id, e),
        }
        result
    }

    async fn run_cycle(&self, peer: &Arc<PeerRecord>) -> Result<SyncOutcome, SyncError> {
        if !self.registry.is_current(peer) {
            return Err(SyncError::PeerGone(peer.id.clone()));
        }
        let desired = self.desired.current().ok_or(SyncError::NoDesiredState)?;
        self.engine.sync(&desired, peer).await
    }
}
