//! Router-facing server

mod channel;
mod handler;
mod listener;

pub use channel::{ManagementChannel, ManagementReply, ManagementRequest, PeerCommand};
pub use handler::{serve_connection, ConnectionSettings, PeerEvent};
pub use listener::PeerListener;
