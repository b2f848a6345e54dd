//! Call Orchestrator
//!
//! The single public "invoke a remote procedure" operation:
//! `Idle → Building → Dispatched → {Succeeded | RemoteFailure | TransportFailure}`.
//! Dispatch is the only suspension point and blocks until the transport
//! returns. Nothing is retried here.

use std::collections::BTreeMap;
use std::sync::Arc;

use bigdecimal::{BigDecimal, ToPrimitive};
use hostcall_protocol::PROTOCOL_VERSION;
use tracing::{debug, warn};

use crate::error::{ProtocolError, ValidationError};
use crate::host::{Transport, TransportError};
use crate::param::Value;
use crate::request::{build_request, CallOptions, CallRequest};
use crate::response::{parse_response, CallResponse};
use crate::structure::Member;

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerSettings {
    /// Protocol version written into every request
    pub protocol_version: i32,
    /// Collection used when a call names none; empty defers to the library list
    pub default_collection: String,
    /// Session token used when the call options carry none
    pub session: Option<String>,
}

impl Default for CallerSettings {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            default_collection: String::new(),
            session: None,
        }
    }
}

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Building,
    Dispatched,
    Succeeded,
    RemoteFailure,
    TransportFailure,
}

impl std::fmt::Display for CallPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallPhase::Idle => "idle",
            CallPhase::Building => "building",
            CallPhase::Dispatched => "dispatched",
            CallPhase::Succeeded => "succeeded",
            CallPhase::RemoteFailure => "remote_failure",
            CallPhase::TransportFailure => "transport_failure",
        };
        f.write_str(name)
    }
}

/// Failure kind for exit code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Descriptor or call construction defects (exit code 10)
    Validation = 10,
    /// Channel failures (exit code 20)
    Transport = 20,
    /// Response did not match the declared layout (exit code 30)
    Protocol = 30,
    /// The remote procedure reported an exception (exit code 40)
    Remote = 40,
}

/// How a remote failure reached the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Written into the error-code structure; outputs were still returned
    Captured(Outputs),
    /// The call terminated; only the job log came back
    Escalated { joblog: Vec<String> },
}

/// The remote procedure ran and reported an exception
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFailure {
    pub exception_id: String,
    pub message: String,
    pub disposition: Disposition,
}

impl RemoteFailure {
    pub fn is_escalated(&self) -> bool {
        matches!(self.disposition, Disposition::Escalated { .. })
    }
}

/// Call errors
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Remote failure {}: {}", .0.exception_id, .0.message)]
    Remote(RemoteFailure),

    #[error("Output '{name}' is {actual}, expected {expected}")]
    OutputType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl CallError {
    /// Phase the call ended in
    pub fn phase(&self) -> CallPhase {
        match self {
            CallError::Validation(_) => CallPhase::Building,
            CallError::Transport(_) => CallPhase::TransportFailure,
            CallError::Protocol(_) | CallError::OutputType { .. } => CallPhase::Dispatched,
            CallError::Remote(_) => CallPhase::RemoteFailure,
        }
    }

    /// Map error to failure kind for exit code
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            CallError::Validation(_) => FailureKind::Validation,
            CallError::Transport(_) => FailureKind::Transport,
            CallError::Protocol(_) | CallError::OutputType { .. } => FailureKind::Protocol,
            CallError::Remote(_) => FailureKind::Remote,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }
}

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Result of reading a length-prefixed output
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// The data field, cut to the returned length
    Data(Value),
    /// The length field decoded to zero
    EmptyResult,
}

/// Name-keyed view of decoded `out`/`both` values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs(BTreeMap<String, Value>);

impl Outputs {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Value of `name`; absence means the response did not match the declaration
    pub fn require(&self, name: &str) -> CallResult<&Value> {
        self.0
            .get(name)
            .ok_or_else(|| ProtocolError::MissingOutput(name.to_string()).into())
    }

    pub fn text(&self, name: &str) -> CallResult<&str> {
        let value = self.require(name)?;
        value.as_text().ok_or_else(|| type_error(name, "text", value))
    }

    pub fn int(&self, name: &str) -> CallResult<i64> {
        let value = self.require(name)?;
        value.as_i64().ok_or_else(|| type_error(name, "int", value))
    }

    pub fn uint(&self, name: &str) -> CallResult<u64> {
        let value = self.require(name)?;
        value.as_u64().ok_or_else(|| type_error(name, "uint", value))
    }

    pub fn float(&self, name: &str) -> CallResult<f64> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| type_error(name, "float", value))
    }

    pub fn decimal(&self, name: &str) -> CallResult<BigDecimal> {
        let value = self.require(name)?;
        value.as_decimal().ok_or_else(|| type_error(name, "decimal", value))
    }

    pub fn bytes(&self, name: &str) -> CallResult<&[u8]> {
        let value = self.require(name)?;
        value.as_bytes().ok_or_else(|| type_error(name, "bytes", value))
    }

    pub fn record(&self, name: &str) -> CallResult<&BTreeMap<String, Value>> {
        let value = self.require(name)?;
        value.as_record().ok_or_else(|| type_error(name, "record", value))
    }

    /// Read `data_field` cut to the byte count held in `length_field`.
    ///
    /// A zero length is a legitimate empty outcome, not a missing output.
    pub fn fetch_sized(&self, length_field: &str, data_field: &str) -> CallResult<Fetched> {
        let length = self.require(length_field)?;
        let length = match length {
            Value::Decimal(d) => d.to_i64(),
            other => other.as_i64(),
        }
        .ok_or_else(|| type_error(length_field, "int", length))?;

        if length == 0 {
            return Ok(Fetched::EmptyResult);
        }
        let length = usize::try_from(length).map_err(|_| ProtocolError::MalformedField {
            name: length_field.to_string(),
            reason: format!("negative length {}", length),
        })?;

        let data = match self.require(data_field)? {
            Value::Text(s) => {
                // Counted in bytes; fixed fields arrive with trailing blanks trimmed.
                let cut = &s.as_bytes()[..length.min(s.len())];
                let text = std::str::from_utf8(cut).map_err(|_| ProtocolError::MalformedField {
                    name: data_field.to_string(),
                    reason: format!("length {} splits a character", length),
                })?;
                Value::Text(text.to_string())
            }
            Value::Bytes(b) => Value::Bytes(b[..length.min(b.len())].to_vec()),
            other => other.clone(),
        };
        Ok(Fetched::Data(data))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// JSON object of all values
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}

impl From<CallResponse> for Outputs {
    fn from(response: CallResponse) -> Self {
        Self(response.outputs)
    }
}

fn type_error(name: &str, expected: &'static str, value: &Value) -> CallError {
    CallError::OutputType {
        name: name.to_string(),
        expected,
        actual: value.type_name(),
    }
}

/// Call orchestrator over a transport collaborator
pub struct Caller {
    transport: Arc<dyn Transport>,
    settings: CallerSettings,
}

impl Caller {
    /// Create a caller with default settings
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_settings(transport, CallerSettings::default())
    }

    pub fn with_settings(transport: Arc<dyn Transport>, settings: CallerSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &CallerSettings {
        &self.settings
    }

    fn next_request_id(&self) -> String {
        ulid::Ulid::new().to_string().to_lowercase()
    }

    /// Invoke `target` in `collection` (empty uses the default collection)
    pub fn invoke(
        &self,
        target: &str,
        collection: &str,
        params: Vec<Member>,
        options: CallOptions,
    ) -> CallResult<CallResponse> {
        let collection = if collection.trim().is_empty() {
            self.settings.default_collection.as_str()
        } else {
            collection
        };
        let request = CallRequest::new(target, collection, params)?.with_options(options);
        self.invoke_request(&request)
    }

    /// Invoke and return only the decoded outputs
    pub fn call(
        &self,
        target: &str,
        collection: &str,
        params: Vec<Member>,
        options: CallOptions,
    ) -> CallResult<Outputs> {
        self.invoke(target, collection, params, options).map(Outputs::from)
    }

    /// Run one prepared request through build, dispatch, parse and classify
    pub fn invoke_request(&self, request: &CallRequest) -> CallResult<CallResponse> {
        let request_id = self.next_request_id();
        debug!(request_id = %request_id, program = request.target(), phase = %CallPhase::Building, "Building request");

        let mut document = build_request(request, &request_id, self.settings.protocol_version)?;
        if document.session.is_none() {
            document.session = self.settings.session.clone();
        }

        debug!(request_id = %request_id, phase = %CallPhase::Dispatched, "Dispatching request");
        let response = self.transport.dispatch(&document).map_err(|e| {
            warn!(request_id = %request_id, phase = %CallPhase::TransportFailure, "Transport failed: {}", e);
            CallError::Transport(e)
        })?;

        if response.protocol_version != document.protocol_version {
            return Err(ProtocolError::VersionMismatch {
                expected: document.protocol_version,
                actual: response.protocol_version,
            }
            .into());
        }
        if response.request_id != request_id {
            return Err(ProtocolError::RequestIdMismatch {
                expected: request_id,
                actual: response.request_id,
            }
            .into());
        }

        let parsed = parse_response(request.params(), &response)?;
        if parsed.succeeded {
            debug!(request_id = %request_id, phase = %CallPhase::Succeeded, "Call succeeded");
            return Ok(parsed);
        }

        warn!(
            request_id = %request_id,
            phase = %CallPhase::RemoteFailure,
            exception_id = %parsed.exception_id,
            escalated = parsed.escalated,
            "Remote procedure failed: {}",
            parsed.exception_message
        );
        let disposition = if parsed.escalated {
            Disposition::Escalated {
                joblog: parsed.joblog,
            }
        } else {
            Disposition::Captured(Outputs(parsed.outputs))
        };
        Err(CallError::Remote(RemoteFailure {
            exception_id: parsed.exception_id,
            message: parsed.exception_message,
            disposition,
        }))
    }
}
