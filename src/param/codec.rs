//! Per-kind encode and decode of scalar parameters.
//!
//! Encoding failures are caller defects (`ValidationError`); decoding
//! failures mean the response does not match the declared layout
//! (`ProtocolError`).

use crate::error::{ProtocolError, ValidationError};

use super::decimal;
use super::descriptor::ParameterDescriptor;
use super::kind::{ByteOrder, IntWidth, ParameterKind, Varying};
use super::value::Value;

const BLANK: u8 = b' ';

/// Encode all occurrences of a parameter.
///
/// With a dimension, `value` is either a list of exactly `dimension` values
/// or a single value repeated for every occurrence.
pub fn encode_param(
    desc: &ParameterDescriptor,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), ValidationError> {
    let dimension = desc.dimension() as usize;
    if dimension == 0 {
        return encode_scalar(desc, value, out);
    }
    match value {
        Value::List(items) if items.len() == dimension => {
            for item in items {
                encode_scalar(desc, item, out)?;
            }
            Ok(())
        }
        Value::List(items) => Err(ValidationError::InvalidValue {
            name: desc.name().to_string(),
            reason: format!("{} values given for dimension {}", items.len(), dimension),
        }),
        single => {
            for _ in 0..dimension {
                encode_scalar(desc, single, out)?;
            }
            Ok(())
        }
    }
}

/// Decode all occurrences of a parameter from exactly `byte_width()` bytes
pub fn decode_param(desc: &ParameterDescriptor, bytes: &[u8]) -> Result<Value, ProtocolError> {
    if bytes.len() != desc.byte_width() {
        return Err(ProtocolError::WidthMismatch {
            name: desc.name().to_string(),
            expected: desc.byte_width(),
            actual: bytes.len(),
        });
    }
    if desc.dimension() == 0 {
        return decode_scalar(desc, bytes);
    }
    let width = desc.occurrence_width();
    (0..desc.dimension() as usize)
        .map(|i| decode_scalar(desc, &bytes[i * width..(i + 1) * width]))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

/// Encode one occurrence
pub fn encode_scalar(
    desc: &ParameterDescriptor,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), ValidationError> {
    let name = desc.name();
    match *desc.kind() {
        ParameterKind::Char { size } => {
            let payload: &[u8] = match value {
                Value::Bytes(b) if desc.raw_hex() => b.as_slice(),
                Value::Text(s) if !desc.raw_hex() => s.as_bytes(),
                other => return Err(mismatch(desc, other)),
            };
            if payload.len() > size as usize {
                return Err(ValidationError::ValueOutOfRange {
                    name: name.to_string(),
                    reason: format!("{} bytes exceed char({})", payload.len(), size),
                });
            }
            match desc.varying() {
                Varying::Off => {}
                Varying::TwoByte => out.extend_from_slice(&(payload.len() as u16).to_be_bytes()),
                Varying::FourByte => out.extend_from_slice(&(payload.len() as u32).to_be_bytes()),
            }
            out.extend_from_slice(payload);
            let pad = if desc.raw_hex() { 0x00 } else { BLANK };
            out.resize(out.len() + size as usize - payload.len(), pad);
        }
        ParameterKind::SignedInt(width) => {
            let v = value.as_i64().ok_or_else(|| mismatch(desc, value))?;
            let (min, max) = width.signed_range();
            if v < min || v > max {
                return Err(out_of_range(name, v, width));
            }
            let be = v.to_be_bytes();
            push_ordered(out, &be[8 - width.bytes()..], desc.byte_order());
        }
        ParameterKind::UnsignedInt(width) => {
            let v = value.as_u64().ok_or_else(|| mismatch(desc, value))?;
            if v > width.unsigned_max() {
                return Err(out_of_range(name, v, width));
            }
            let be = v.to_be_bytes();
            push_ordered(out, &be[8 - width.bytes()..], desc.byte_order());
        }
        ParameterKind::Float => {
            let v = value.as_f64().ok_or_else(|| mismatch(desc, value))?;
            let narrowed = narrow_float(name, v)?;
            push_ordered(out, &narrowed.to_be_bytes(), desc.byte_order());
        }
        ParameterKind::Real => {
            let v = value.as_f64().ok_or_else(|| mismatch(desc, value))?;
            push_ordered(out, &v.to_be_bytes(), desc.byte_order());
        }
        ParameterKind::PackedDecimal { length, scale } => {
            let v = value.as_decimal().ok_or_else(|| mismatch(desc, value))?;
            out.extend(decimal::encode_packed(name, &v, length, scale)?);
        }
        ParameterKind::Zoned { length, scale } => {
            let v = value.as_decimal().ok_or_else(|| mismatch(desc, value))?;
            out.extend(decimal::encode_zoned(name, &v, length, scale)?);
        }
        ParameterKind::Binary { size } => {
            let bytes = value.as_bytes().ok_or_else(|| mismatch(desc, value))?;
            if bytes.len() > size as usize {
                return Err(ValidationError::ValueOutOfRange {
                    name: name.to_string(),
                    reason: format!("{} bytes exceed binary({})", bytes.len(), size),
                });
            }
            out.extend_from_slice(bytes);
            out.resize(out.len() + size as usize - bytes.len(), 0);
        }
        ParameterKind::Hole { size } => {
            out.resize(out.len() + size as usize, 0);
        }
    }
    Ok(())
}

/// Decode one occurrence from exactly `occurrence_width()` bytes
pub fn decode_scalar(desc: &ParameterDescriptor, bytes: &[u8]) -> Result<Value, ProtocolError> {
    let malformed = |reason: String| ProtocolError::MalformedField {
        name: desc.name().to_string(),
        reason,
    };
    if bytes.len() != desc.occurrence_width() {
        return Err(ProtocolError::WidthMismatch {
            name: desc.name().to_string(),
            expected: desc.occurrence_width(),
            actual: bytes.len(),
        });
    }

    let value = match *desc.kind() {
        ParameterKind::Char { size } => {
            let header = desc.varying().header_len();
            let (len, payload) = match desc.varying() {
                Varying::Off => (size as usize, bytes),
                Varying::TwoByte => (u16::from_be_bytes([bytes[0], bytes[1]]) as usize, &bytes[header..]),
                Varying::FourByte => (
                    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
                    &bytes[header..],
                ),
            };
            if len > size as usize {
                return Err(malformed(format!("length header {} exceeds char({})", len, size)));
            }
            let payload = &payload[..len];
            if desc.raw_hex() {
                Value::Bytes(payload.to_vec())
            } else {
                let text = std::str::from_utf8(payload)
                    .map_err(|e| malformed(format!("invalid text: {}", e)))?;
                if desc.varying() == Varying::Off {
                    Value::Text(text.trim_end_matches([' ', '\0']).to_string())
                } else {
                    Value::Text(text.to_string())
                }
            }
        }
        ParameterKind::SignedInt(width) => {
            let be = ordered(bytes, desc.byte_order());
            Value::Int(sign_extend(&be, width))
        }
        ParameterKind::UnsignedInt(_) => {
            let be = ordered(bytes, desc.byte_order());
            Value::UInt(be.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
        }
        ParameterKind::Float => {
            let be = ordered(bytes, desc.byte_order());
            Value::Float(f32::from_be_bytes([be[0], be[1], be[2], be[3]]) as f64)
        }
        ParameterKind::Real => {
            let be = ordered(bytes, desc.byte_order());
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&be);
            Value::Float(f64::from_be_bytes(buf))
        }
        ParameterKind::PackedDecimal { length, scale } => {
            Value::Decimal(decimal::decode_packed(bytes, length, scale).map_err(malformed)?)
        }
        ParameterKind::Zoned { length, scale } => {
            Value::Decimal(decimal::decode_zoned(bytes, length, scale).map_err(malformed)?)
        }
        ParameterKind::Binary { .. } | ParameterKind::Hole { .. } => Value::Bytes(bytes.to_vec()),
    };
    Ok(value)
}

fn push_ordered(out: &mut Vec<u8>, big_endian: &[u8], order: ByteOrder) {
    match order {
        ByteOrder::Big => out.extend_from_slice(big_endian),
        ByteOrder::Little => out.extend(big_endian.iter().rev()),
    }
}

/// Bytes rearranged into big-endian order
fn ordered(bytes: &[u8], order: ByteOrder) -> Vec<u8> {
    match order {
        ByteOrder::Big => bytes.to_vec(),
        ByteOrder::Little => bytes.iter().rev().copied().collect(),
    }
}

fn sign_extend(big_endian: &[u8], width: IntWidth) -> i64 {
    let fill = if big_endian.first().is_some_and(|b| b & 0x80 != 0) { 0xFF } else { 0x00 };
    let mut buf = [fill; 8];
    buf[8 - width.bytes()..].copy_from_slice(big_endian);
    i64::from_be_bytes(buf)
}

fn mismatch(desc: &ParameterDescriptor, value: &Value) -> ValidationError {
    ValidationError::InvalidValue {
        name: desc.name().to_string(),
        reason: format!("{} value given for {} parameter", value.type_name(), desc.kind().label()),
    }
}

fn out_of_range(name: &str, value: impl std::fmt::Display, width: IntWidth) -> ValidationError {
    ValidationError::ValueOutOfRange {
        name: name.to_string(),
        reason: format!("{} does not fit in {} bits", value, width.bits()),
    }
}

/// Narrow to 4 bytes; only values `f32` holds exactly are accepted
fn narrow_float(name: &str, v: f64) -> Result<f32, ValidationError> {
    let narrowed = v as f32;
    if v.is_finite() && narrowed.is_infinite() {
        return Err(ValidationError::ValueOutOfRange {
            name: name.to_string(),
            reason: format!("{} exceeds the 4-byte float range", v),
        });
    }
    if v.is_nan() || narrowed as f64 == v {
        return Ok(narrowed);
    }
    Err(ValidationError::ValueOutOfRange {
        name: name.to_string(),
        reason: format!("{} is not representable as a 4-byte float (nearest {})", v, narrowed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::kind::IoDirection;
    use std::str::FromStr;

    fn encode(desc: &ParameterDescriptor) -> Vec<u8> {
        let mut out = Vec::new();
        encode_param(desc, desc.value(), &mut out).unwrap();
        out
    }

    #[test]
    fn test_signed_32_scenario() {
        let desc = ParameterDescriptor::signed(IoDirection::In, "n", 32, -123456).unwrap();
        let bytes = encode(&desc);
        assert_eq!(bytes, vec![0xFF, 0xFE, 0x1D, 0xC0]);
        assert_eq!(decode_param(&desc, &bytes).unwrap(), Value::Int(-123456));
    }

    #[test]
    fn test_little_endian_integer() {
        let desc = ParameterDescriptor::unsigned(IoDirection::In, "n", 16, 0x1234)
            .unwrap()
            .with_byte_order(ByteOrder::Little)
            .unwrap();
        let bytes = encode(&desc);
        assert_eq!(bytes, vec![0x34, 0x12]);
        assert_eq!(decode_param(&desc, &bytes).unwrap(), Value::UInt(0x1234));
    }

    #[test]
    fn test_varying_char_scenario() {
        let desc = ParameterDescriptor::char(IoDirection::Both, "t", 10, "AB")
            .unwrap()
            .with_varying(Varying::TwoByte)
            .unwrap();
        let bytes = encode(&desc);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], &[0x00, 0x02, b'A', b'B']);
        assert_eq!(decode_param(&desc, &bytes).unwrap(), Value::Text("AB".to_string()));
    }

    #[test]
    fn test_varying_header_too_long_is_malformed() {
        let desc = ParameterDescriptor::char(IoDirection::Out, "t", 4, "")
            .unwrap()
            .with_varying(Varying::TwoByte)
            .unwrap();
        let err = decode_param(&desc, &[0x00, 0x09, b'A', b'B', b'C', b'D']).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedField { .. }));
    }

    #[test]
    fn test_fixed_char_trims_blanks() {
        let desc = ParameterDescriptor::char(IoDirection::Both, "t", 6, "QGPL").unwrap();
        let bytes = encode(&desc);
        assert_eq!(bytes, b"QGPL  ".to_vec());
        assert_eq!(decode_param(&desc, &bytes).unwrap(), Value::Text("QGPL".to_string()));
    }

    #[test]
    fn test_raw_hex_is_verbatim() {
        let desc = ParameterDescriptor::char_hex(IoDirection::Both, "h", 3, "c1c2").unwrap();
        let bytes = encode(&desc);
        assert_eq!(bytes, vec![0xc1, 0xc2, 0x00]);
        assert_eq!(
            decode_param(&desc, &bytes).unwrap(),
            Value::Bytes(vec![0xc1, 0xc2, 0x00])
        );
    }

    #[test]
    fn test_float_and_real() {
        let float = ParameterDescriptor::float(IoDirection::Both, "f", 1.5).unwrap();
        let bytes = encode(&float);
        assert_eq!(bytes, 1.5f32.to_be_bytes().to_vec());
        assert_eq!(decode_param(&float, &bytes).unwrap(), Value::Float(1.5));

        let real = ParameterDescriptor::real(IoDirection::Both, "r", -2.25)
            .unwrap()
            .with_byte_order(ByteOrder::Little)
            .unwrap();
        let bytes = encode(&real);
        assert_eq!(bytes, (-2.25f64).to_le_bytes().to_vec());
        assert_eq!(decode_param(&real, &bytes).unwrap(), Value::Float(-2.25));
    }

    #[test]
    fn test_float_rejects_what_four_bytes_cannot_hold() {
        let float = ParameterDescriptor::float(IoDirection::In, "f", 0.0).unwrap();
        let encode_value = |v: f64| {
            let mut out = Vec::new();
            encode_param(&float, &Value::Float(v), &mut out).map(|_| out)
        };

        for v in [1e300, -1e39, 16_777_217.0, 0.1] {
            assert!(
                matches!(encode_value(v), Err(ValidationError::ValueOutOfRange { .. })),
                "{} accepted",
                v
            );
        }
        assert_eq!(encode_value(0.1f32 as f64).unwrap(), 0.1f32.to_be_bytes().to_vec());
        assert_eq!(encode_value(f64::INFINITY).unwrap(), f32::INFINITY.to_be_bytes().to_vec());
        assert_eq!(encode_value(16_777_216.0).unwrap(), 16_777_216f32.to_be_bytes().to_vec());
    }

    #[test]
    fn test_packed_through_descriptor() {
        let desc = ParameterDescriptor::packed(IoDirection::Both, "amt", 5, 2, "123.45").unwrap();
        let bytes = encode(&desc);
        assert_eq!(bytes.len(), 3);
        assert_eq!(
            decode_param(&desc, &bytes).unwrap(),
            Value::Decimal(bigdecimal::BigDecimal::from_str("123.45").unwrap())
        );
    }

    #[test]
    fn test_binary_zero_padded() {
        let desc = ParameterDescriptor::binary(IoDirection::Both, "b", 4, vec![1, 2]).unwrap();
        assert_eq!(encode(&desc), vec![1, 2, 0, 0]);
    }

    #[test]
    fn test_dimension_repeats_single_value() {
        let desc = ParameterDescriptor::signed(IoDirection::Both, "n", 16, 7)
            .unwrap()
            .with_dimension(3);
        let bytes = encode(&desc);
        assert_eq!(bytes, vec![0, 7, 0, 7, 0, 7]);
        assert_eq!(
            decode_param(&desc, &bytes).unwrap(),
            Value::List(vec![Value::Int(7), Value::Int(7), Value::Int(7)])
        );
    }

    #[test]
    fn test_dimension_list_length_checked() {
        let desc = ParameterDescriptor::signed(IoDirection::Both, "n", 16, 0)
            .unwrap()
            .with_dimension(2);
        let mut out = Vec::new();
        let err = encode_param(&desc, &Value::List(vec![Value::Int(1)]), &mut out).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_width_mismatch_on_decode() {
        let desc = ParameterDescriptor::signed(IoDirection::Out, "n", 32, 0).unwrap();
        let err = decode_param(&desc, &[0, 1]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WidthMismatch {
                name: "n".to_string(),
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn test_type_mismatch_is_validation_error() {
        let desc = ParameterDescriptor::signed(IoDirection::In, "n", 32, 0).unwrap();
        let mut out = Vec::new();
        let err = encode_scalar(&desc, &Value::Text("12".to_string()), &mut out).unwrap_err();
        assert!(err.to_string().contains("text value given for signed integer"));
    }
}
