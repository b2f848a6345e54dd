//! Byte layout of members: encode, decode, and wire entries.

use std::collections::{BTreeMap, HashMap};

use hostcall_protocol::{ParamEntry, Shape};

use crate::error::{ProtocolError, ValidationError};
use crate::param::{codec, ParameterDescriptor, Value};

use super::{check_unique_names, DataStructure, Member};

/// Length label to byte width of the labeled structure
pub type LengthLabels = HashMap<String, usize>;

/// Gather every length label declared in `members`, at any depth
pub fn collect_length_labels(members: &[Member]) -> Result<LengthLabels, ValidationError> {
    let mut labels = LengthLabels::new();
    walk_labels(members, &mut labels)?;
    Ok(labels)
}

fn walk_labels(members: &[Member], labels: &mut LengthLabels) -> Result<(), ValidationError> {
    for member in members {
        if let Member::Structure(ds) = member {
            if let Some(label) = ds.length_label() {
                if labels.insert(label.to_string(), ds.byte_width()).is_some() {
                    return Err(ValidationError::DuplicateName {
                        name: label.to_string(),
                        scope: "length labels".to_string(),
                    });
                }
            }
            walk_labels(ds.members(), labels)?;
        }
    }
    Ok(())
}

impl Member {
    /// Value written into the request, with length references resolved
    pub fn input_value(&self, labels: &LengthLabels) -> Result<Value, ValidationError> {
        match self {
            Member::Param(p) => match p.length_of() {
                Some(label) => labels
                    .get(label)
                    .map(|width| Value::UInt(*width as u64))
                    .ok_or_else(|| ValidationError::UnknownLengthLabel {
                        name: p.name().to_string(),
                        label: label.to_string(),
                    }),
                None => Ok(p.value().clone()),
            },
            Member::Structure(ds) => {
                let mut record = BTreeMap::new();
                for member in ds.members().iter().filter(|m| !m.is_hole()) {
                    record.insert(member.name().to_string(), member.input_value(labels)?);
                }
                Ok(Value::Record(record))
            }
        }
    }

    /// Wire entry describing this member's layout, without data
    pub fn to_entry(&self) -> ParamEntry {
        match self {
            Member::Param(p) => ParamEntry {
                name: p.name().to_string(),
                io: p.io(),
                comment: p.comment().to_string(),
                dim: p.dimension(),
                shape: p.shape(),
                data: None,
            },
            Member::Structure(ds) => ParamEntry {
                name: ds.name().to_string(),
                io: ds.io(),
                comment: ds.comment().to_string(),
                dim: ds.dimension(),
                shape: Shape::Struct {
                    members: ds.members().iter().map(Member::to_entry).collect(),
                    length_label: ds.length_label().map(str::to_string),
                },
                data: None,
            },
        }
    }

    /// Rebuild a member from a wire entry; values are zero
    pub fn from_entry(entry: &ParamEntry) -> Result<Self, ValidationError> {
        match &entry.shape {
            Shape::Struct {
                members,
                length_label,
            } => {
                let members = members
                    .iter()
                    .map(Member::from_entry)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut ds = DataStructure::new(entry.name.clone(), members)?
                    .with_dimension(entry.dim)
                    .with_io(entry.io)
                    .with_comment(entry.comment.clone());
                if let Some(label) = length_label {
                    ds = ds.with_length_label(label.clone());
                }
                Ok(Member::Structure(ds))
            }
            shape => Ok(Member::Param(
                ParameterDescriptor::from_shape(entry.io, &entry.name, entry.dim, shape)?
                    .with_comment(entry.comment.clone()),
            )),
        }
    }
}

/// Encode all occurrences of a member
pub fn encode_member(member: &Member, value: &Value, out: &mut Vec<u8>) -> Result<(), ValidationError> {
    let ds = match member {
        Member::Param(p) => return codec::encode_param(p, value, out),
        Member::Structure(ds) => ds,
    };

    let dimension = ds.dimension() as usize;
    match value {
        Value::List(items) if dimension > 0 && items.len() == dimension => {
            for item in items {
                encode_record(ds, item, out)?;
            }
            Ok(())
        }
        Value::List(items) => Err(ValidationError::InvalidValue {
            name: ds.name().to_string(),
            reason: format!("{} records given for dimension {}", items.len(), dimension),
        }),
        single => {
            for _ in 0..dimension.max(1) {
                encode_record(ds, single, out)?;
            }
            Ok(())
        }
    }
}

fn encode_record(ds: &DataStructure, value: &Value, out: &mut Vec<u8>) -> Result<(), ValidationError> {
    let record = value.as_record().ok_or_else(|| ValidationError::InvalidValue {
        name: ds.name().to_string(),
        reason: format!("{} value given for data structure", value.type_name()),
    })?;
    for member in ds.members() {
        match record.get(member.name()) {
            Some(v) => encode_member(member, v, out)?,
            None => encode_member(member, &member.zero_value(), out)?,
        }
    }
    Ok(())
}

/// Decode all occurrences of a member from exactly `byte_width()` bytes
pub fn decode_member(member: &Member, bytes: &[u8]) -> Result<Value, ProtocolError> {
    let ds = match member {
        Member::Param(p) => return codec::decode_param(p, bytes),
        Member::Structure(ds) => ds,
    };

    if bytes.len() != ds.byte_width() {
        return Err(ProtocolError::WidthMismatch {
            name: ds.name().to_string(),
            expected: ds.byte_width(),
            actual: bytes.len(),
        });
    }
    if ds.dimension() == 0 {
        return decode_record(ds, bytes);
    }
    let width = ds.occurrence_width();
    (0..ds.dimension() as usize)
        .map(|i| decode_record(ds, &bytes[i * width..(i + 1) * width]))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn decode_record(ds: &DataStructure, bytes: &[u8]) -> Result<Value, ProtocolError> {
    let mut record = BTreeMap::new();
    let mut offset = 0;
    for member in ds.members() {
        let width = member.byte_width();
        let slice = &bytes[offset..offset + width];
        offset += width;
        if member.is_hole() {
            continue;
        }
        record.insert(member.name().to_string(), decode_member(member, slice)?);
    }
    Ok(Value::Record(record))
}

/// Validate member names of a top-level parameter list
pub fn check_parameter_list(members: &[Member]) -> Result<(), ValidationError> {
    check_unique_names("parameter list", members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::IoDirection;

    fn order_ds() -> DataStructure {
        DataStructure::new(
            "order",
            vec![
                ParameterDescriptor::char(IoDirection::Both, "item", 4, "AB12").unwrap().into(),
                ParameterDescriptor::hole("filler", 2).into(),
                ParameterDescriptor::packed(IoDirection::Both, "qty", 3, 0, "15").unwrap().into(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_record_roundtrip_preserves_member_order() {
        let member = Member::Structure(order_ds());
        let value = member.input_value(&LengthLabels::new()).unwrap();

        let mut bytes = Vec::new();
        encode_member(&member, &value, &mut bytes).unwrap();
        assert_eq!(bytes, vec![b'A', b'B', b'1', b'2', 0, 0, 0x01, 0x5C]);

        let decoded = decode_member(&member, &bytes).unwrap();
        assert_eq!(decoded, value);
        assert!(decoded.field("filler").is_none());
    }

    #[test]
    fn test_array_of_structures() {
        let member = Member::Structure(order_ds().with_dimension(2));
        let value = member.input_value(&LengthLabels::new()).unwrap();

        let mut bytes = Vec::new();
        encode_member(&member, &value, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 16);

        let decoded = decode_member(&member, &bytes).unwrap();
        let rows = decoded.as_list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].field("item").and_then(Value::as_text), Some("AB12"));
    }

    #[test]
    fn test_missing_record_field_encodes_zero() {
        let member = Member::Structure(order_ds());
        let mut record = BTreeMap::new();
        record.insert("item".to_string(), Value::from("X"));

        let mut bytes = Vec::new();
        encode_member(&member, &Value::Record(record), &mut bytes).unwrap();
        assert_eq!(&bytes[6..], &[0x00, 0x0C]);
    }

    #[test]
    fn test_length_label_resolves_to_width() {
        let receiver = DataStructure::new(
            "receiver",
            vec![ParameterDescriptor::blank(IoDirection::Out, "data", 100).into()],
        )
        .unwrap()
        .with_length_label("rcvlen");
        let length = ParameterDescriptor::int32(IoDirection::In, "receiver_length", 0)
            .with_length_of("rcvlen")
            .unwrap();
        let members = vec![Member::Structure(receiver), Member::Param(length)];

        let labels = collect_length_labels(&members).unwrap();
        assert_eq!(members[1].input_value(&labels).unwrap(), Value::UInt(100));
    }

    #[test]
    fn test_unknown_length_label() {
        let length = Member::Param(
            ParameterDescriptor::int32(IoDirection::In, "len", 0)
                .with_length_of("nowhere")
                .unwrap(),
        );
        let err = length.input_value(&LengthLabels::new()).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownLengthLabel { .. }));
    }

    #[test]
    fn test_entry_roundtrip() {
        let member = Member::Structure(order_ds().with_dimension(3).with_length_label("ord"));
        let rebuilt = Member::from_entry(&member.to_entry()).unwrap();
        assert_eq!(rebuilt.to_entry(), member.to_entry());
        assert_eq!(rebuilt.byte_width(), member.byte_width());
    }
}
