//! Hostcall Protocol Types
//!
//! Defines the JSON request/response documents exchanged with the program
//! execution service.

pub mod error;
pub mod request;
pub mod response;
pub mod shape;

pub use error::DocumentError;
pub use request::{ParamEntry, RequestDocument};
pub use response::ResponseDocument;
pub use shape::{ByteOrder, IoDirection, Shape, Varying};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: i32 = 1;

/// Returns true if `exception_id` means "no exception".
///
/// The service reports success either with an empty id or with an id made
/// only of `'0'` characters (for example `0000000`).
pub fn is_sentinel_exception(exception_id: &str) -> bool {
    exception_id.trim().chars().all(|c| c == '0')
}
