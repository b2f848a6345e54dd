//! Per-entry layout metadata carried in a request document.

use serde::{Deserialize, Serialize};

use crate::request::ParamEntry;

/// Direction of a parameter relative to the remote program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoDirection {
    /// Written into the request only
    In,
    /// Decoded from the response only
    Out,
    /// Written and decoded
    #[default]
    Both,
}

impl IoDirection {
    /// True if the value travels in the request
    pub fn is_input(&self) -> bool {
        matches!(self, IoDirection::In | IoDirection::Both)
    }

    /// True if the value is expected back in the response
    pub fn is_output(&self) -> bool {
        matches!(self, IoDirection::Out | IoDirection::Both)
    }
}

/// Byte order of fixed-width numeric fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// Length header mode of a character field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Varying {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "2")]
    TwoByte,
    #[serde(rename = "4")]
    FourByte,
}

impl Varying {
    /// Width of the length header in bytes
    pub fn header_len(&self) -> usize {
        match self {
            Varying::Off => 0,
            Varying::TwoByte => 2,
            Varying::FourByte => 4,
        }
    }

    fn is_off(&self) -> bool {
        matches!(self, Varying::Off)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_big(value: &ByteOrder) -> bool {
    matches!(value, ByteOrder::Big)
}

/// Layout of one entry.
///
/// Sizes are in bytes except for `packed`/`zoned`, whose `length` counts
/// decimal digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Char {
        size: u32,
        #[serde(default, skip_serializing_if = "Varying::is_off")]
        varying: Varying,
        #[serde(default, skip_serializing_if = "is_false")]
        raw_hex: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        after: Option<String>,
    },
    Int {
        bits: u8,
        signed: bool,
        #[serde(default, skip_serializing_if = "is_big")]
        byte_order: ByteOrder,
    },
    Float {
        #[serde(default, skip_serializing_if = "is_big")]
        byte_order: ByteOrder,
    },
    Real {
        #[serde(default, skip_serializing_if = "is_big")]
        byte_order: ByteOrder,
    },
    Packed { length: u8, scale: u8 },
    Zoned { length: u8, scale: u8 },
    Binary { size: u32 },
    Hole { size: u32 },
    Struct {
        members: Vec<ParamEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        length_label: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_io_direction_flags() {
        assert!(IoDirection::In.is_input());
        assert!(!IoDirection::In.is_output());
        assert!(IoDirection::Out.is_output());
        assert!(IoDirection::Both.is_input() && IoDirection::Both.is_output());
    }

    #[test]
    fn test_char_shape_omits_defaults() {
        let shape = Shape::Char {
            size: 10,
            varying: Varying::Off,
            raw_hex: false,
            before: None,
            after: None,
        };
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value, json!({"type": "char", "size": 10}));
    }

    #[test]
    fn test_varying_wire_names() {
        let shape: Shape =
            serde_json::from_value(json!({"type": "char", "size": 4, "varying": "2"})).unwrap();
        match shape {
            Shape::Char { varying, .. } => assert_eq!(varying, Varying::TwoByte),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_int_shape_little_endian() {
        let shape: Shape = serde_json::from_value(
            json!({"type": "int", "bits": 16, "signed": false, "byte_order": "little"}),
        )
        .unwrap();
        assert_eq!(
            shape,
            Shape::Int {
                bits: 16,
                signed: false,
                byte_order: ByteOrder::Little
            }
        );
    }
}
