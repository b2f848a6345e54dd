//! Hostcall - typed parameter marshaling for remote host program calls
//!
//! This crate describes the parameter list of a program on a remote host,
//! encodes it into the byte-exact layout that program expects, ships it
//! through a pluggable transport as a JSON request document, and decodes
//! the response back into typed values.

pub mod call;
pub mod config;
pub mod error;
pub mod host;
pub mod manifest;
pub mod mock;
pub mod param;
pub mod request;
pub mod response;
pub mod structure;

pub use hostcall_protocol;

pub use call::{
    CallError, CallPhase, CallResult, Caller, CallerSettings, Disposition, FailureKind, Fetched,
    Outputs, RemoteFailure,
};
pub use error::{ProtocolError, ValidationError};
pub use host::{CommandConfig, CommandTransport, MockTransport, Transport, TransportError};
pub use manifest::{CallManifest, ManifestError};
pub use param::{ByteOrder, IoDirection, ParameterDescriptor, ParameterKind, Value, Varying};
pub use request::{build_request, CallOptions, CallRequest};
pub use response::{parse_response, CallResponse};
pub use structure::{DataStructure, ErrorPolicy, Member};
