//! Management client trait

use async_trait::async_trait;

use crate::error::ManagementError;
use crate::types::Unit;

/// Remote configuration operations against one connected peer.
///
/// Each method is one round trip. Mutations may fail independently of each
/// other; callers decide what a failure means for the enclosing cycle.
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Full snapshot of every unit currently configured on the peer
    async fn list_units(&self) -> Result<Vec<Unit>, ManagementError>;

    /// Create a unit from its specification
    async fn create(&self, spec: &Unit) -> Result<(), ManagementError>;

    /// Update an existing unit to match its specification
    async fn update(&self, spec: &Unit) -> Result<(), ManagementError>;

    /// Delete an observed unit
    async fn delete(&self, record: &Unit) -> Result<(), ManagementError>;
}
