//! Host-Side Components
//!
//! Transport collaborators that carry request documents to the execution
//! service and bring responses back.

pub mod transport;

pub use transport::{CommandConfig, CommandTransport, MockTransport, Transport, TransportError};
