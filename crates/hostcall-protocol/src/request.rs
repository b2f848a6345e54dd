//! Request document types.

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::shape::{IoDirection, Shape};
use crate::PROTOCOL_VERSION;

/// Request document.
///
/// One document describes exactly one program call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDocument {
    /// Protocol version
    pub protocol_version: i32,
    /// Caller-chosen request ID, echoed by the response
    pub request_id: String,
    /// Program (or service program) name
    pub program: String,
    /// Owning collection; empty means "resolve through the library list"
    #[serde(default)]
    pub collection: String,
    /// Named entry inside a multi-entry module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Opaque hint for the transport collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_hint: Option<String>,
    /// Opaque session correlation token, never inspected here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Parameters in declaration order
    #[serde(default)]
    pub params: Vec<ParamEntry>,
}

impl RequestDocument {
    /// Parse a request document, rejecting other protocol versions
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let document: RequestDocument = serde_json::from_str(json)?;
        if document.protocol_version != PROTOCOL_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                version: document.protocol_version,
                expected: PROTOCOL_VERSION,
            });
        }
        Ok(document)
    }

    /// Serialize as a single JSON line
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One parameter or structure entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    pub io: IoDirection,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Repeat count; 0 is a single occurrence
    #[serde(default)]
    pub dim: u32,
    pub shape: Shape,
    /// Hex of the encoded bytes, present for input-bearing top-level entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let json = r#"{
            "protocol_version": 1,
            "request_id": "req-001",
            "program": "QSNDDTAQ",
            "collection": "QSYS",
            "params": [
                {"name": "queue", "io": "in", "shape": {"type": "char", "size": 10}, "data": "4d5951202020202020"}
            ]
        }"#;

        let req = RequestDocument::from_json(json).unwrap();
        assert_eq!(req.program, "QSNDDTAQ");
        assert_eq!(req.params.len(), 1);
        assert_eq!(req.params[0].io, IoDirection::In);
        assert!(req.entry_point.is_none());
    }

    #[test]
    fn test_missing_collection_defaults_to_empty() {
        let json = r#"{"protocol_version":1,"request_id":"r","program":"PGM"}"#;
        let req = RequestDocument::from_json(json).unwrap();
        assert_eq!(req.collection, "");
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let json = r#"{"protocol_version":2,"request_id":"r","program":"PGM"}"#;
        let err = RequestDocument::from_json(json).unwrap_err();
        assert!(err.to_string().contains("protocol version 2"));
    }

    #[test]
    fn test_struct_entry_nests_members() {
        let entry: ParamEntry = serde_json::from_value(json!({
            "name": "error_code",
            "io": "both",
            "shape": {
                "type": "struct",
                "members": [
                    {"name": "bytes_provided", "io": "in", "shape": {"type": "int", "bits": 32, "signed": true}}
                ]
            }
        }))
        .unwrap();

        match entry.shape {
            Shape::Struct { members, length_label } => {
                assert_eq!(members.len(), 1);
                assert!(length_label.is_none());
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }
}
