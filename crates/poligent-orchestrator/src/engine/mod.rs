//! Reconciliation engine
//!
//! A sync cycle against one peer repeats a pass of
//! fetch → diff → apply until a fetch shows nothing left to do:
//!
//! 1. Fetch the peer's full unit snapshot and index it by name
//! 2. Diff it against the desired state (create / update / delete)
//! 3. If nothing is scheduled, the peer has converged
//! 4. Otherwise issue every change at once and wait for all of them; the
//!    first failure fails the cycle
//! 5. Go back to 1 rather than trusting the writes, since a router may
//!    normalize or partially reject what it was sent
//!
//! The snapshot is never cached between passes.

mod diff;

pub use diff::{index_by_name, plan, ActualState, Change, ChangeKind};

use futures::future::try_join_all;
use serde_json::Value;

use poligent_core::{DesiredState, ManagementClient, SyncError};

use crate::registry::PeerRecord;

/// Result of a converged sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Passes that applied changes (0 when already in sync)
    pub passes: u32,
    /// Changes applied across all passes
    pub applied: usize,
}

impl SyncOutcome {
    /// Whether the peer was already in sync
    pub fn was_in_sync(&self) -> bool {
        self.passes == 0
    }
}

/// Drives peers toward a desired state
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    max_passes: Option<u32>,
}

impl ReconciliationEngine {
    /// Engine that rechecks until the peer converges, however long it takes
    pub fn new() -> Self {
        Self { max_passes: None }
    }

    /// Engine giving up after `max_passes` passes with work still pending
    pub fn with_max_passes(max_passes: Option<u32>) -> Self {
        Self { max_passes }
    }

    /// Run one sync cycle against `peer`
    pub async fn sync(
        &self,
        desired: &DesiredState,
        peer: &PeerRecord,
    ) -> Result<SyncOutcome, SyncError> {
        let client = peer.client.as_ref();
        let mut outcome = SyncOutcome {
            passes: 0,
            applied: 0,
        };

        loop {
            let records = client.list_units().await.map_err(SyncError::Fetch)?;
            if tracing::enabled!(tracing::Level::DEBUG) {
                let snapshot = Value::Array(records.iter().cloned().map(Value::Object).collect());
                tracing::debug!("Retrieved units from {}: {}", peer.id, snapshot);
            }

            let actual = index_by_name(records);
            let changes = plan(desired, &actual);
            if changes.is_empty() {
                return Ok(outcome);
            }

            if let Some(max) = self.max_passes {
                if outcome.passes >= max {
                    return Err(SyncError::NotConverged {
                        passes: outcome.passes,
                    });
                }
            }

            for change in &changes {
                tracing::info!("{} {} on {}", change.kind, change.name, peer.id);
            }

            try_join_all(changes.iter().map(|change| apply(client, change))).await?;

            outcome.passes += 1;
            outcome.applied += changes.len();
            tracing::info!("Updates complete on {}, rechecking...", peer.id);
        }
    }
}

async fn apply(client: &dyn ManagementClient, change: &Change) -> Result<(), SyncError> {
    let result = match change.kind {
        ChangeKind::Create => client.create(&change.unit).await,
        ChangeKind::Update => client.update(&change.unit).await,
        ChangeKind::Delete => client.delete(&change.unit).await,
    };

    result.map_err(|source| SyncError::Apply {
        operation: change.kind.operation(),
        unit: change.name.clone(),
        source,
    })
}
