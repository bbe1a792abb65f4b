//! poligent-orchestrator: Policy reconciliation daemon for router peers
//!
//! Routers connect to the orchestrator and are kept in sync with a desired
//! set of units loaded from a JSON document. Each connected router is
//! brought to the desired state by repeatedly fetching its units, applying
//! the difference and checking again until nothing is left to change.

pub mod engine;
pub mod orchestrator;
pub mod registry;
pub mod server;
pub mod store;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use engine::{ReconciliationEngine, SyncOutcome};
pub use orchestrator::{Orchestrator, PeerSyncReport};
pub use registry::{PeerRecord, PeerRegistry};
pub use store::DesiredStateStore;
pub use watcher::DesiredStateWatcher;
