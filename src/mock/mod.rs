//! Mock Host Implementation
//!
//! An in-process stand-in for the remote execution service, used by the
//! test suite and by `MockTransport`.
//!
//! # Behavior
//!
//! - Programs are registered per (collection, program, entry point)
//! - An empty collection resolves through the configured library list
//! - Program exceptions are captured into the program's error-code
//!   structure when the caller provided bytes for it, otherwise escalated
//! - Unknown programs escalate with `MCH3401`

mod failure;
mod host;

pub use failure::{FailureConfig, FailureInjector};
pub use host::{
    HostException, MockHost, MockProgram, ProgramCall, PARAMETER_MISMATCH, UNRESOLVED_PROGRAM,
    UNSUPPORTED_VERSION,
};
