//! poligent-protocol: Management wire protocol for router peers
//!
//! Router peers connect to poligent over TCP and exchange newline-delimited
//! JSON frames. The first frame in each direction is an `open` carrying the
//! sender's identity; after that poligent issues management requests and
//! the peer answers them, matched by correlation id.

pub mod codec;
pub mod correlation;
pub mod error;
pub mod message;
pub mod query;

pub use codec::{JsonLinesCodec, MAX_FRAME_SIZE};
pub use correlation::CorrelationId;
pub use error::ProtocolError;
pub use message::{is_success, product_of, Frame, Operation, Properties, PRODUCT_PROPERTY};
pub use query::{records_from_body, QueryResult};
