//! Simulated execution service.
//!
//! Rebuilds the parameter layout from the request entries, decodes inputs,
//! runs a registered handler and encodes the outputs back, applying the
//! same capture-or-escalate rules as the real service.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use hostcall_protocol::{RequestDocument, ResponseDocument, PROTOCOL_VERSION};
use tracing::{debug, warn};

use crate::param::Value;
use crate::structure::templates::ERROR_CODE_CAPTURE_BYTES;
use crate::structure::{decode_member, encode_member, Member};

use super::failure::{FailureConfig, FailureInjector};

/// Program or procedure could not be resolved
pub const UNRESOLVED_PROGRAM: &str = "MCH3401";
/// Parameter data did not match the declared layout
pub const PARAMETER_MISMATCH: &str = "MCH0802";
/// Request used an unsupported protocol version
pub const UNSUPPORTED_VERSION: &str = "CPF3CF1";

/// Exception signaled by a simulated program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostException {
    pub id: String,
    pub message: String,
}

impl HostException {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Inputs of one simulated call
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramCall {
    pub program: String,
    /// Collection the program was resolved in
    pub collection: String,
    pub entry_point: Option<String>,
    /// Decoded input values keyed by top-level name (holes excluded)
    pub inputs: BTreeMap<String, Value>,
}

impl ProgramCall {
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }
}

type Handler = dyn Fn(&ProgramCall) -> Result<BTreeMap<String, Value>, HostException> + Send + Sync;

/// A registered program
#[derive(Clone)]
pub struct MockProgram {
    handler: Arc<Handler>,
    error_param: Option<String>,
}

impl MockProgram {
    /// Program whose outputs come from `handler`.
    ///
    /// Outputs the handler omits fall back to the input value, then zero.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ProgramCall) -> Result<BTreeMap<String, Value>, HostException> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            error_param: None,
        }
    }

    /// Program that echoes its inputs
    pub fn echo() -> Self {
        Self::new(|_| Ok(BTreeMap::new()))
    }

    /// Name the error-code structure parameter of this program
    pub fn with_error_code(mut self, name: impl Into<String>) -> Self {
        self.error_param = Some(name.into());
        self
    }
}

impl std::fmt::Debug for MockProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProgram")
            .field("error_param", &self.error_param)
            .finish_non_exhaustive()
    }
}

/// (collection, program, entry point); entry is empty for the default entry
type ProgramKey = (String, String, String);

fn key(collection: &str, program: &str, entry_point: Option<&str>) -> ProgramKey {
    (
        collection.to_ascii_uppercase(),
        program.to_ascii_uppercase(),
        entry_point.unwrap_or_default().to_string(),
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Configurable in-process host
#[derive(Clone, Default)]
pub struct MockHost {
    programs: Arc<Mutex<HashMap<ProgramKey, MockProgram>>>,
    /// Search order for unqualified calls
    library_list: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<FailureInjector>>,
    /// Every request seen, in arrival order
    requests: Arc<Mutex<Vec<RequestDocument>>>,
}

impl MockHost {
    /// Create a host with an empty library list
    pub fn new() -> Self {
        Self::default()
    }

    // === Public API for test configuration ===

    /// Register a program in `collection`
    pub fn register(
        &self,
        collection: &str,
        program: &str,
        entry_point: Option<&str>,
        definition: MockProgram,
    ) {
        lock(&self.programs).insert(key(collection, program, entry_point), definition);
    }

    /// Set the library list used to resolve an empty collection
    pub fn set_library_list<I, S>(&self, libraries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        *lock(&self.library_list) = libraries
            .into_iter()
            .map(|l| l.as_ref().to_ascii_uppercase())
            .collect();
    }

    /// Make `program` signal an exception instead of running
    pub fn inject_exception(&self, program: &str, exception_id: &str, message: &str) {
        lock(&self.failures).inject_exception(program, exception_id, message);
    }

    /// Inject a failure configuration for a program
    pub fn inject_failure(&self, program: &str, config: FailureConfig) {
        lock(&self.failures).inject(program, config);
    }

    /// Clear all injected failures
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RequestDocument> {
        lock(&self.requests).clone()
    }

    // === Request handling ===

    /// Execute one request document
    pub fn handle_request(&self, request: &RequestDocument) -> ResponseDocument {
        lock(&self.requests).push(request.clone());

        if request.protocol_version != PROTOCOL_VERSION {
            return ResponseDocument::escalation(
                request.protocol_version,
                &request.request_id,
                UNSUPPORTED_VERSION,
                format!("Protocol version {} is not supported", request.protocol_version),
            );
        }

        let escalate = |id: &str, message: String| {
            warn!(request_id = %request.request_id, exception_id = id, "Mock host escalating: {}", message);
            ResponseDocument::escalation(request.protocol_version, &request.request_id, id, message)
        };

        let (collection, definition) = match self.resolve(request) {
            Some(found) => found,
            None => {
                return escalate(
                    UNRESOLVED_PROGRAM,
                    format!("Cannot resolve to object {}", request.program),
                )
            }
        };

        let (members, inputs) = match decode_inputs(request) {
            Ok(decoded) => decoded,
            Err(reason) => return escalate(PARAMETER_MISMATCH, reason),
        };

        let call = ProgramCall {
            program: request.program.to_ascii_uppercase(),
            collection,
            entry_point: request.entry_point.clone(),
            inputs,
        };
        debug!(program = %call.program, collection = %call.collection, "Mock host running program");

        let injected = lock(&self.failures).check(&call.program).cloned();
        let result = match injected {
            Some(failure) => Err(HostException::new(failure.exception_id, failure.message)),
            None => (definition.handler)(&call),
        };

        match result {
            Ok(values) => match encode_outputs(&members, &call.inputs, &values) {
                Ok(outputs) => ResponseDocument::success(
                    request.protocol_version,
                    &request.request_id,
                    outputs,
                ),
                Err(reason) => escalate(PARAMETER_MISMATCH, reason),
            },
            Err(exception) => {
                let capture = definition
                    .error_param
                    .as_deref()
                    .and_then(|name| capture_record(&call.inputs, name, &exception));
                match capture {
                    Some((name, record)) => {
                        let mut values = BTreeMap::new();
                        values.insert(name, record);
                        match encode_outputs(&members, &call.inputs, &values) {
                            Ok(outputs) => ResponseDocument::success(
                                request.protocol_version,
                                &request.request_id,
                                outputs,
                            ),
                            Err(reason) => escalate(PARAMETER_MISMATCH, reason),
                        }
                    }
                    None => escalate(&exception.id, exception.message),
                }
            }
        }
    }

    /// Find the program, searching the library list for an empty collection
    fn resolve(&self, request: &RequestDocument) -> Option<(String, MockProgram)> {
        let programs = lock(&self.programs);
        let entry = request.entry_point.as_deref();
        if !request.collection.is_empty() {
            let collection = request.collection.to_ascii_uppercase();
            return programs
                .get(&key(&collection, &request.program, entry))
                .map(|p| (collection, p.clone()));
        }
        let libraries = lock(&self.library_list);
        libraries.iter().find_map(|library| {
            programs
                .get(&key(library, &request.program, entry))
                .map(|p| (library.clone(), p.clone()))
        })
    }
}

/// Rebuild the layout and decode every input-bearing entry
fn decode_inputs(
    request: &RequestDocument,
) -> Result<(Vec<Member>, BTreeMap<String, Value>), String> {
    let mut members = Vec::with_capacity(request.params.len());
    let mut inputs = BTreeMap::new();
    for entry in &request.params {
        let member = Member::from_entry(entry).map_err(|e| e.to_string())?;
        if !member.is_hole() {
            let value = match (&entry.data, member.io().is_input()) {
                (Some(data), true) => {
                    let bytes = hex::decode(data)
                        .map_err(|e| format!("Parameter '{}' has bad hex: {}", entry.name, e))?;
                    decode_member(&member, &bytes).map_err(|e| e.to_string())?
                }
                _ => member.zero_value(),
            };
            inputs.insert(entry.name.clone(), value);
        }
        members.push(member);
    }
    Ok((members, inputs))
}

/// Encode `out`/`both` members: handler value, else input, else zero
fn encode_outputs(
    members: &[Member],
    inputs: &BTreeMap<String, Value>,
    values: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, String>, String> {
    let mut outputs = BTreeMap::new();
    for member in members.iter().filter(|m| m.io().is_output()) {
        let name = member.name();
        let zero = member.zero_value();
        let value = values
            .get(name)
            .or_else(|| inputs.get(name))
            .unwrap_or(&zero);
        let mut bytes = Vec::with_capacity(member.byte_width());
        encode_member(member, value, &mut bytes).map_err(|e| e.to_string())?;
        outputs.insert(name.to_string(), hex::encode(bytes));
    }
    Ok(outputs)
}

/// Error-code record describing `exception`, when the caller provided room
fn capture_record(
    inputs: &BTreeMap<String, Value>,
    name: &str,
    exception: &HostException,
) -> Option<(String, Value)> {
    let provided = inputs.get(name)?.field("bytes_provided")?.as_i64()?;
    if provided <= 0 {
        return None;
    }

    let mut record = inputs.get(name)?.as_record()?.clone();
    let data = truncate_bytes(&exception.message, EXCEPTION_DATA_BYTES);
    let available = (16 + data.len() as i64).min(ERROR_CODE_CAPTURE_BYTES as i64);
    record.insert("bytes_available".to_string(), Value::Int(available));
    record.insert(
        "exception_id".to_string(),
        Value::Text(truncate_bytes(&exception.id, EXCEPTION_ID_BYTES).to_string()),
    );
    record.insert("exception_data".to_string(), Value::Text(data.to_string()));
    Some((name.to_string(), Value::Record(record)))
}

const EXCEPTION_ID_BYTES: usize = 7;
const EXCEPTION_DATA_BYTES: usize = 128;

/// Longest prefix of `text` within `max` bytes that ends on a char boundary
fn truncate_bytes(text: &str, max: usize) -> &str {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
