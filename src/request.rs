//! Request Builder
//!
//! Serializes a call into a [`RequestDocument`]. Parameter order is kept
//! exactly; every input-bearing top-level entry carries the hex of its full
//! encoded bytes.

use std::sync::OnceLock;

use hostcall_protocol::RequestDocument;
use regex_lite::Regex;
use tracing::debug;

use crate::error::ValidationError;
use crate::structure::{check_parameter_list, collect_length_labels, encode_member, Member};

/// Host object names: 1 to 10 characters, not starting with a digit
const OBJECT_NAME_PATTERN: &str = r"^[A-Z$#@][A-Z0-9$#@_.]{0,9}$";

fn object_name_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(OBJECT_NAME_PATTERN).ok()).as_ref()
}

/// Check and upper-case a host object name
pub fn normalize_object_name(name: &str) -> Result<String, ValidationError> {
    let upper = name.trim().to_ascii_uppercase();
    match object_name_regex() {
        Some(re) if re.is_match(&upper) => Ok(upper),
        _ => Err(ValidationError::ObjectName(name.to_string())),
    }
}

/// Per-call options threaded into the request document untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Named entry inside a multi-entry module
    pub entry_point: Option<String>,
    /// Opaque hint for the transport collaborator
    pub transport_hint: Option<String>,
    /// Session correlation token owned by the session collaborator
    pub session: Option<String>,
}

impl CallOptions {
    pub fn entry_point(entry: impl Into<String>) -> Self {
        Self {
            entry_point: Some(entry.into()),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    pub fn with_transport_hint(mut self, hint: impl Into<String>) -> Self {
        self.transport_hint = Some(hint.into());
        self
    }
}

/// One program call, built fresh and never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    target: String,
    collection: String,
    params: Vec<Member>,
    options: CallOptions,
}

impl CallRequest {
    /// Validate names and build the call.
    ///
    /// An empty `collection` leaves resolution to the host's library list.
    pub fn new(
        target: &str,
        collection: &str,
        params: Vec<Member>,
    ) -> Result<Self, ValidationError> {
        let target = normalize_object_name(target)?;
        let collection = if collection.trim().is_empty() {
            String::new()
        } else {
            normalize_object_name(collection)?
        };
        check_parameter_list(&params)?;
        Ok(Self {
            target,
            collection,
            params,
            options: CallOptions::default(),
        })
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn params(&self) -> &[Member] {
        &self.params
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }
}

/// Serialize `request` into a wire document
pub fn build_request(
    request: &CallRequest,
    request_id: &str,
    protocol_version: i32,
) -> Result<RequestDocument, ValidationError> {
    let labels = collect_length_labels(request.params())?;

    let mut params = Vec::with_capacity(request.params().len());
    for member in request.params() {
        let mut entry = member.to_entry();
        if member.io().is_input() {
            let value = member.input_value(&labels)?;
            let mut bytes = Vec::with_capacity(member.byte_width());
            encode_member(member, &value, &mut bytes)?;
            entry.data = Some(hex::encode(bytes));
        }
        params.push(entry);
    }

    let options = request.options();
    let entry_point = options.entry_point.clone().filter(|e| !e.trim().is_empty());

    debug!(
        request_id,
        program = request.target(),
        collection = request.collection(),
        params = params.len(),
        "Built request document"
    );

    Ok(RequestDocument {
        protocol_version,
        request_id: request_id.to_string(),
        program: request.target().to_string(),
        collection: request.collection().to_string(),
        entry_point,
        transport_hint: options.transport_hint.clone(),
        session: options.session.clone(),
        params,
    })
}
