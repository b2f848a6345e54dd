//! Response document types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Response document.
///
/// `outputs` maps parameter names to the hex of their encoded bytes. Fields
/// the caller did not declare are ignored by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDocument {
    /// Protocol version echoed from the request
    pub protocol_version: i32,
    /// Request ID echoed from the request
    pub request_id: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Top-level exception identifier; empty or all zeros on success
    #[serde(default)]
    pub exception_id: String,
    #[serde(default)]
    pub exception_message: String,
    /// True when the failure was not captured and terminated the call
    #[serde(default)]
    pub escalated: bool,
    /// Job log lines collected for an escalated failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joblog: Vec<String>,
}

impl ResponseDocument {
    /// Create a successful response with the given outputs
    pub fn success(
        protocol_version: i32,
        request_id: impl Into<String>,
        outputs: BTreeMap<String, String>,
    ) -> Self {
        Self {
            protocol_version,
            request_id: request_id.into(),
            outputs,
            ..Self::default()
        }
    }

    /// Create an escalated failure carrying no outputs
    pub fn escalation(
        protocol_version: i32,
        request_id: impl Into<String>,
        exception_id: impl Into<String>,
        exception_message: impl Into<String>,
    ) -> Self {
        let exception_id = exception_id.into();
        let exception_message = exception_message.into();
        Self {
            protocol_version,
            request_id: request_id.into(),
            joblog: vec![format!("{}: {}", exception_id, exception_message)],
            exception_id,
            exception_message,
            escalated: true,
            ..Self::default()
        }
    }

    /// Parse a response document
    pub fn from_json(json: &[u8]) -> Result<Self, DocumentError> {
        Ok(serde_json::from_slice(json)?)
    }

    /// Serialize as a single JSON line
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }
}
