//! Error taxonomy for descriptor construction and response decoding.
//!
//! Transport failures live with the transport (`host::TransportError`) and
//! remote failures with the orchestrator (`call::RemoteFailure`).

/// A descriptor's declared shape or value is impossible.
///
/// Raised at construction or build time, before any wire interaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Integer width {bits} is not one of 8, 16, 32, 64")]
    IntegerWidth { bits: u8 },

    #[error("Decimal length {length} must be in [1, 31]")]
    DecimalLength { length: u8 },

    #[error("Decimal scale {scale} exceeds length {length}")]
    DecimalScale { length: u8, scale: u8 },

    #[error("Value for '{name}' does not fit: {reason}")]
    ValueOutOfRange { name: String, reason: String },

    #[error("Value for '{name}' is not valid: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Option '{option}' is only valid on {allowed} parameters ('{name}')")]
    OptionNotAllowed {
        name: String,
        option: &'static str,
        allowed: &'static str,
    },

    #[error("Raw hex transfer and code-page conversion are mutually exclusive ('{0}')")]
    RawHexWithEncoding(String),

    #[error("Dimension must not be negative ('{name}': {dimension})")]
    NegativeDimension { name: String, dimension: i64 },

    #[error("Duplicate name '{name}' in {scope}")]
    DuplicateName { name: String, scope: String },

    #[error("Name must not be empty in {0}")]
    EmptyName(String),

    #[error("Invalid object name '{0}'")]
    ObjectName(String),

    #[error("Unknown length label '{label}' referenced by '{name}'")]
    UnknownLengthLabel { name: String, label: String },
}

/// A response was received but does not match the declared shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Declared output '{0}' is missing from the response")]
    MissingOutput(String),

    #[error("Malformed field '{name}': {reason}")]
    MalformedField { name: String, reason: String },

    #[error("Field '{name}' is {actual} bytes; declared layout needs {expected}")]
    WidthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Response request_id '{actual}' does not match request '{expected}'")]
    RequestIdMismatch { expected: String, actual: String },

    #[error("Response protocol version {actual} does not match request version {expected}")]
    VersionMismatch { expected: i32, actual: i32 },
}
