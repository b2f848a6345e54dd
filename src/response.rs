//! Response Parser
//!
//! Decodes a [`ResponseDocument`] against the declared parameter list.
//! Correlation is strictly by declared name; response field order and
//! undeclared fields have no effect.

use std::collections::BTreeMap;

use hostcall_protocol::{is_sentinel_exception, ResponseDocument};
use tracing::debug;

use crate::error::ProtocolError;
use crate::param::Value;
use crate::structure::{decode_member, Member};

/// Exception id reported for an escalation that named no exception
pub const UNIDENTIFIED_ESCALATION: &str = "CPF9999";

/// Decoded outcome of one call
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    /// Decoded `out`/`both` values keyed by name; holes never appear
    pub outputs: BTreeMap<String, Value>,
    pub exception_id: String,
    pub exception_message: String,
    /// True iff the call was not escalated and `exception_id` is the no-exception sentinel
    pub succeeded: bool,
    /// The failure terminated the call instead of being captured
    pub escalated: bool,
    pub joblog: Vec<String>,
}

/// Decode `doc` against the outbound parameter list
pub fn parse_response(
    params: &[Member],
    doc: &ResponseDocument,
) -> Result<CallResponse, ProtocolError> {
    let mut outputs = BTreeMap::new();

    // An escalated call returned no parameters.
    if !doc.escalated {
        for member in params.iter().filter(|m| m.io().is_output() && !m.is_hole()) {
            let name = member.name();
            let hex_data = doc
                .outputs
                .get(name)
                .ok_or_else(|| ProtocolError::MissingOutput(name.to_string()))?;
            let bytes = hex::decode(hex_data.trim()).map_err(|e| ProtocolError::MalformedField {
                name: name.to_string(),
                reason: format!("bad hex: {}", e),
            })?;
            outputs.insert(name.to_string(), decode_member(member, &bytes)?);
        }
    }

    let mut exception_id = doc.exception_id.trim().to_string();
    let mut exception_message = doc.exception_message.trim().to_string();
    if is_sentinel_exception(&exception_id) {
        if let Some((id, data)) = captured_exception(params, &outputs) {
            exception_id = id;
            exception_message = data;
        }
    }
    // An escalated call always failed, whatever id came with it.
    if doc.escalated && is_sentinel_exception(&exception_id) {
        exception_id = UNIDENTIFIED_ESCALATION.to_string();
        if exception_message.is_empty() {
            exception_message = "Call escalated without an exception id".to_string();
        }
    }
    let succeeded = !doc.escalated && is_sentinel_exception(&exception_id);

    debug!(
        request_id = %doc.request_id,
        outputs = outputs.len(),
        succeeded,
        escalated = doc.escalated,
        "Parsed response document"
    );

    Ok(CallResponse {
        outputs,
        exception_id,
        exception_message,
        succeeded,
        escalated: doc.escalated,
        joblog: doc.joblog.clone(),
    })
}

/// Exception written into a capturing error structure, if any
fn captured_exception(
    params: &[Member],
    outputs: &BTreeMap<String, Value>,
) -> Option<(String, String)> {
    params.iter().find_map(|member| match member {
        Member::Structure(ds) if ds.captures_errors() => {
            let record = outputs.get(ds.name())?;
            let id = record.field("exception_id")?.as_text()?.trim();
            if is_sentinel_exception(id) {
                return None;
            }
            let data = record
                .field("exception_data")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .trim();
            Some((id.to_string(), data.to_string()))
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{IoDirection, ParameterDescriptor};
    use crate::structure::templates::error_structure_capture;
    use hostcall_protocol::PROTOCOL_VERSION;

    fn params() -> Vec<Member> {
        vec![
            ParameterDescriptor::char(IoDirection::In, "queue", 4, "Q1").unwrap().into(),
            ParameterDescriptor::signed(IoDirection::Out, "count", 16, 0).unwrap().into(),
            ParameterDescriptor::hole("gap", 2).into(),
            ParameterDescriptor::char(IoDirection::Both, "text", 3, "").unwrap().into(),
        ]
    }

    fn outputs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decodes_declared_outputs_only() {
        let doc = ResponseDocument::success(
            PROTOCOL_VERSION,
            "r",
            outputs(&[("count", "002a"), ("text", "414243"), ("gap", "0000"), ("extra", "zz")]),
        );
        let response = parse_response(&params(), &doc).unwrap();

        assert!(response.succeeded);
        assert_eq!(response.outputs.len(), 2);
        assert_eq!(response.outputs["count"], Value::Int(42));
        assert_eq!(response.outputs["text"], Value::Text("ABC".to_string()));
        assert!(!response.outputs.contains_key("gap"));
        assert!(!response.outputs.contains_key("queue"));
    }

    #[test]
    fn test_missing_output_is_protocol_error() {
        let doc = ResponseDocument::success(PROTOCOL_VERSION, "r", outputs(&[("count", "0001")]));
        let err = parse_response(&params(), &doc).unwrap_err();
        assert_eq!(err, ProtocolError::MissingOutput("text".to_string()));
    }

    #[test]
    fn test_bad_hex_is_malformed() {
        let doc = ResponseDocument::success(
            PROTOCOL_VERSION,
            "r",
            outputs(&[("count", "00zz"), ("text", "414243")]),
        );
        let err = parse_response(&params(), &doc).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedField { ref name, .. } if name == "count"));
    }

    #[test]
    fn test_short_field_is_width_mismatch() {
        let doc = ResponseDocument::success(
            PROTOCOL_VERSION,
            "r",
            outputs(&[("count", "2a"), ("text", "414243")]),
        );
        let err = parse_response(&params(), &doc).unwrap_err();
        assert!(matches!(err, ProtocolError::WidthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_sentinel_exception_ids() {
        for id in ["", "0000000", "  "] {
            let mut doc = ResponseDocument::success(
                PROTOCOL_VERSION,
                "r",
                outputs(&[("count", "0000"), ("text", "202020")]),
            );
            doc.exception_id = id.to_string();
            assert!(parse_response(&params(), &doc).unwrap().succeeded, "id {:?}", id);
        }

        let mut doc = ResponseDocument::success(
            PROTOCOL_VERSION,
            "r",
            outputs(&[("count", "0000"), ("text", "202020")]),
        );
        doc.exception_id = "CPF9801".to_string();
        doc.exception_message = "Object not found".to_string();
        let response = parse_response(&params(), &doc).unwrap();
        assert!(!response.succeeded);
        assert_eq!(response.exception_id, "CPF9801");
        // Outputs are still decoded for a captured failure
        assert_eq!(response.outputs["count"], Value::Int(0));
    }

    #[test]
    fn test_escalated_response_skips_outputs() {
        let doc = ResponseDocument::escalation(PROTOCOL_VERSION, "r", "MCH3601", "Pointer not set");
        let response = parse_response(&params(), &doc).unwrap();
        assert!(!response.succeeded);
        assert!(response.escalated);
        assert!(response.outputs.is_empty());
        assert_eq!(response.joblog, vec!["MCH3601: Pointer not set".to_string()]);
    }

    #[test]
    fn test_captured_exception_surfaces() {
        let params: Vec<Member> = vec![error_structure_capture().into()];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&144i32.to_be_bytes());
        bytes.extend_from_slice(&20i32.to_be_bytes());
        bytes.extend_from_slice(b"CPF2105");
        bytes.push(0);
        let mut data = b"Object not found".to_vec();
        data.resize(128, b' ');
        bytes.extend_from_slice(&data);

        let blob = hex::encode(&bytes);
        let doc = ResponseDocument::success(
            PROTOCOL_VERSION,
            "r",
            outputs(&[("error_code", blob.as_str())]),
        );
        let response = parse_response(&params, &doc).unwrap();
        assert!(!response.succeeded);
        assert_eq!(response.exception_id, "CPF2105");
        assert_eq!(response.exception_message, "Object not found");

        let record = &response.outputs["error_code"];
        assert!(record.field("reserved").is_none());
        assert_eq!(record.field("bytes_available"), Some(&Value::Int(20)));
    }

    #[test]
    fn test_escalation_without_exception_id_is_failure() {
        for id in ["", "0000000"] {
            let doc = ResponseDocument::escalation(PROTOCOL_VERSION, "r", id, "");
            let response = parse_response(&params(), &doc).unwrap();

            assert!(!response.succeeded, "escalation with id {:?} must fail", id);
            assert!(response.escalated);
            assert_eq!(response.exception_id, UNIDENTIFIED_ESCALATION);
            assert!(!response.exception_message.is_empty());
            assert!(response.outputs.is_empty());
        }
    }
}
