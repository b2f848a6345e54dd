//! Parameter type system
//!
//! Kinds, descriptors, values, and the byte-exact encodings that move them
//! across the wire.

pub mod codec;
pub mod decimal;
mod descriptor;
mod kind;
mod value;

pub use descriptor::{dimension_from_i64, ParameterDescriptor};
pub use kind::{ByteOrder, IntWidth, IoDirection, ParameterKind, Varying, MAX_DECIMAL_DIGITS};
pub use value::Value;
