//! poligent-core: Core abstractions and configuration for poligent
//!
//! This crate provides the unit model, the partial-match comparator, the
//! desired-state document, configuration structures and the management
//! client trait consumed by the reconciliation engine.

pub mod compare;
pub mod config;
pub mod desired;
pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

pub use compare::{as_expected, fields_match};
pub use desired::DesiredState;
pub use error::{ConnectionError, DesiredStateError, ManagementError, SyncError};
pub use identity::ProcessIdentity;
pub use traits::ManagementClient;
pub use types::{ConnectionId, PeerId, PeerIdentity, Unit};
