//! Fixed structure templates reused by list-style and error-reporting calls.
//!
//! Every function returns a fresh value; the layouts are constants.

use serde::{Deserialize, Serialize};

use crate::param::{IoDirection, ParameterDescriptor};

use super::{DataStructure, Member};

/// Name of the error-code structure in a parameter list
pub const ERROR_CODE_NAME: &str = "error_code";

/// Byte width of the capturing error structure
pub const ERROR_CODE_CAPTURE_BYTES: i32 = 144;

/// Label carried by the dummy receiver structure
pub const RECEIVER_LABEL: &str = "receiver";

/// How a remote failure is reported back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Exception id and data are written into the error structure
    #[default]
    Capture,
    /// The remote call fails loudly instead
    Escalate,
}

impl ErrorPolicy {
    pub fn structure(self) -> DataStructure {
        match self {
            ErrorPolicy::Capture => error_structure_capture(),
            ErrorPolicy::Escalate => error_structure_zero(),
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Capture => write!(f, "capture"),
            ErrorPolicy::Escalate => write!(f, "escalate"),
        }
    }
}

/// Error structure with room for the exception id and data
pub fn error_structure_capture() -> DataStructure {
    DataStructure::fixed(
        ERROR_CODE_NAME,
        vec![
            ParameterDescriptor::int32(IoDirection::In, "bytes_provided", ERROR_CODE_CAPTURE_BYTES)
                .into(),
            ParameterDescriptor::int32(IoDirection::Out, "bytes_available", 0).into(),
            ParameterDescriptor::blank(IoDirection::Out, "exception_id", 7).into(),
            ParameterDescriptor::hole("reserved", 1).into(),
            ParameterDescriptor::blank(IoDirection::Out, "exception_data", 128).into(),
        ],
    )
    .capturing_errors()
}

/// Error structure with zero bytes provided; failures escalate
pub fn error_structure_zero() -> DataStructure {
    DataStructure::fixed(
        ERROR_CODE_NAME,
        vec![ParameterDescriptor::int32(IoDirection::In, "bytes_provided", 0).into()],
    )
}

/// Generic list information header, 80 bytes
pub fn list_information() -> DataStructure {
    let out = |name: &str| -> Member { ParameterDescriptor::int32(IoDirection::Out, name, 0).into() };
    DataStructure::fixed(
        "list_info",
        vec![
            out("total_records"),
            out("records_returned"),
            ParameterDescriptor::zero_binary(IoDirection::Out, "request_handle", 4).into(),
            out("record_length"),
            ParameterDescriptor::blank(IoDirection::Out, "info_complete", 1).into(),
            ParameterDescriptor::blank(IoDirection::Out, "created", 13).into(),
            ParameterDescriptor::blank(IoDirection::Out, "list_status", 1).into(),
            ParameterDescriptor::hole("reserved_1", 1).into(),
            out("info_length"),
            out("first_record"),
            ParameterDescriptor::hole("reserved_2", 40).into(),
        ],
    )
    .with_io(IoDirection::Out)
}

/// Number of records desired
pub fn records_desired(count: i32) -> ParameterDescriptor {
    ParameterDescriptor::int32(IoDirection::In, "records_desired", count)
}

/// Sort information with no sort keys
pub fn sort_information() -> DataStructure {
    DataStructure::fixed(
        "sort_info",
        vec![ParameterDescriptor::int32(IoDirection::In, "key_count", 0).into()],
    )
    .with_io(IoDirection::In)
}

/// Receiver structure of `size` bytes plus the integer carrying its length
pub fn dummy_receiver(size: u32) -> (DataStructure, ParameterDescriptor) {
    let receiver = DataStructure::fixed(
        "receiver",
        vec![ParameterDescriptor::blank(IoDirection::Out, "receiver_data", size).into()],
    )
    .with_io(IoDirection::Out)
    .with_length_label(RECEIVER_LABEL);

    let length = ParameterDescriptor::length_field(IoDirection::In, "receiver_length", RECEIVER_LABEL);
    (receiver, length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Value;
    use crate::structure::{collect_length_labels, encode_member, LengthLabels};

    #[test]
    fn test_capture_structure_is_144_bytes() {
        let ds = error_structure_capture();
        assert_eq!(ds.byte_width(), 144);
        assert!(ds.captures_errors());

        let member = Member::Structure(ds);
        let mut bytes = Vec::new();
        encode_member(&member, &member.input_value(&LengthLabels::new()).unwrap(), &mut bytes)
            .unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x00, 0x90]);
    }

    #[test]
    fn test_zero_structure_provides_no_bytes() {
        let ds = error_structure_zero();
        assert_eq!(ds.byte_width(), 4);
        assert!(!ds.captures_errors());
        let member = Member::Structure(ds);
        let value = member.input_value(&LengthLabels::new()).unwrap();
        assert_eq!(value.field("bytes_provided"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_policy_selects_template() {
        assert_eq!(ErrorPolicy::Capture.structure().byte_width(), 144);
        assert_eq!(ErrorPolicy::Escalate.structure().byte_width(), 4);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Capture);
    }

    #[test]
    fn test_list_information_is_80_bytes() {
        let ds = list_information();
        assert_eq!(ds.byte_width(), 80);
        let names: Vec<&str> = ds.members().iter().map(Member::name).collect();
        assert_eq!(names[0], "total_records");
        assert_eq!(names[names.len() - 1], "reserved_2");
    }

    #[test]
    fn test_dummy_receiver_length_follows_label() {
        let (receiver, length) = dummy_receiver(8);
        assert_eq!(length.length_of(), Some(RECEIVER_LABEL));

        let members = vec![Member::Structure(receiver), Member::Param(length)];
        let labels = collect_length_labels(&members).unwrap();
        assert_eq!(labels.get(RECEIVER_LABEL), Some(&8));
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: ErrorPolicy = serde_json::from_str("\"escalate\"").unwrap();
        assert_eq!(policy, ErrorPolicy::Escalate);
        assert_eq!(policy.to_string(), "escalate");
    }
}
