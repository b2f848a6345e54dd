//! Parameter descriptors.
//!
//! One constructor per kind. Each validates its own shape and value so a
//! descriptor that exists can always be encoded.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use hostcall_protocol::Shape;

use crate::error::ValidationError;

use super::codec;
use super::kind::{ByteOrder, IntWidth, IoDirection, ParameterKind, Varying};
use super::value::Value;

/// Typed, directional description of one scalar parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    kind: ParameterKind,
    io: IoDirection,
    name: String,
    comment: String,
    value: Value,
    dimension: u32,
    varying: Varying,
    byte_order: ByteOrder,
    before_encoding: Option<String>,
    after_encoding: Option<String>,
    raw_hex: bool,
    length_of: Option<String>,
}

impl ParameterDescriptor {
    fn build(
        kind: ParameterKind,
        io: IoDirection,
        name: impl Into<String>,
        value: Value,
    ) -> Result<Self, ValidationError> {
        let descriptor = Self {
            kind,
            io,
            name: name.into(),
            comment: String::new(),
            value,
            dimension: 0,
            varying: Varying::Off,
            byte_order: ByteOrder::Big,
            before_encoding: None,
            after_encoding: None,
            raw_hex: false,
            length_of: None,
        };
        descriptor.validate_value()?;
        Ok(descriptor)
    }

    /// Character field of `size` bytes
    pub fn char(
        io: IoDirection,
        name: impl Into<String>,
        size: u32,
        value: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::build(ParameterKind::Char { size }, io, name, Value::Text(value.into()))
    }

    /// Character field whose bytes are given as hex and transferred verbatim
    pub fn char_hex(
        io: IoDirection,
        name: impl Into<String>,
        size: u32,
        hex_value: &str,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let bytes = hex::decode(hex_value).map_err(|e| ValidationError::InvalidValue {
            name: name.clone(),
            reason: format!("bad hex: {}", e),
        })?;
        let mut descriptor = Self {
            raw_hex: true,
            ..Self::build(ParameterKind::Char { size }, io, name, Value::Text(String::new()))?
        };
        descriptor.value = Value::Bytes(bytes);
        descriptor.validate_value()?;
        Ok(descriptor)
    }

    /// Signed binary integer of `bits` width
    pub fn signed(
        io: IoDirection,
        name: impl Into<String>,
        bits: u8,
        value: i64,
    ) -> Result<Self, ValidationError> {
        let width = IntWidth::from_bits(bits)?;
        Self::build(ParameterKind::SignedInt(width), io, name, Value::Int(value))
    }

    /// Unsigned binary integer of `bits` width
    pub fn unsigned(
        io: IoDirection,
        name: impl Into<String>,
        bits: u8,
        value: u64,
    ) -> Result<Self, ValidationError> {
        let width = IntWidth::from_bits(bits)?;
        Self::build(ParameterKind::UnsignedInt(width), io, name, Value::UInt(value))
    }

    /// 4-byte floating point
    pub fn float(io: IoDirection, name: impl Into<String>, value: f32) -> Result<Self, ValidationError> {
        Self::build(ParameterKind::Float, io, name, Value::Float(value as f64))
    }

    /// 8-byte floating point
    pub fn real(io: IoDirection, name: impl Into<String>, value: f64) -> Result<Self, ValidationError> {
        Self::build(ParameterKind::Real, io, name, Value::Float(value))
    }

    /// Packed decimal; `value` is parsed, never coerced
    pub fn packed(
        io: IoDirection,
        name: impl Into<String>,
        length: u8,
        scale: u8,
        value: &str,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let kind = ParameterKind::packed(length, scale)?;
        let value = parse_decimal(&name, value)?;
        Self::build(kind, io, name, Value::Decimal(value))
    }

    /// Zoned decimal; `value` is parsed, never coerced
    pub fn zoned(
        io: IoDirection,
        name: impl Into<String>,
        length: u8,
        scale: u8,
        value: &str,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let kind = ParameterKind::zoned(length, scale)?;
        let value = parse_decimal(&name, value)?;
        Self::build(kind, io, name, Value::Decimal(value))
    }

    /// Opaque byte block, zero padded to `size`
    pub fn binary(
        io: IoDirection,
        name: impl Into<String>,
        size: u32,
        value: impl Into<Vec<u8>>,
    ) -> Result<Self, ValidationError> {
        Self::build(ParameterKind::Binary { size }, io, name, Value::Bytes(value.into()))
    }

    /// Reserved bytes; never surfaces in decoded outputs
    pub fn hole(name: impl Into<String>, size: u32) -> Self {
        Self {
            kind: ParameterKind::Hole { size },
            io: IoDirection::Both,
            name: name.into(),
            comment: String::new(),
            value: Value::Bytes(Vec::new()),
            dimension: 0,
            varying: Varying::Off,
            byte_order: ByteOrder::Big,
            before_encoding: None,
            after_encoding: None,
            raw_hex: false,
            length_of: None,
        }
    }

    /// Big-endian 4-byte signed integer; every `i32` fits
    pub fn int32(io: IoDirection, name: impl Into<String>, value: i32) -> Self {
        Self {
            kind: ParameterKind::SignedInt(IntWidth::W32),
            io,
            value: Value::Int(value as i64),
            ..Self::hole(name, 0)
        }
    }

    /// Blank character field of `size` bytes
    pub fn blank(io: IoDirection, name: impl Into<String>, size: u32) -> Self {
        Self {
            kind: ParameterKind::Char { size },
            io,
            value: Value::Text(String::new()),
            ..Self::hole(name, 0)
        }
    }

    /// Zero-filled binary block of `size` bytes
    pub fn zero_binary(io: IoDirection, name: impl Into<String>, size: u32) -> Self {
        Self {
            kind: ParameterKind::Binary { size },
            io,
            ..Self::hole(name, 0)
        }
    }

    /// 4-byte integer holding the byte width of the structure labeled `label`
    pub fn length_field(io: IoDirection, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            length_of: Some(label.into()),
            ..Self::int32(io, name, 0)
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Repeat count; 0 is a single occurrence
    pub fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = dimension;
        self
    }

    /// Prefix a length header (character fields only)
    pub fn with_varying(mut self, varying: Varying) -> Result<Self, ValidationError> {
        if !matches!(self.kind, ParameterKind::Char { .. }) {
            return Err(self.not_allowed("varying", "char"));
        }
        self.varying = varying;
        Ok(self)
    }

    /// Override the big-endian default (binary numeric fields only)
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Result<Self, ValidationError> {
        if !self.kind.is_binary_numeric() {
            return Err(self.not_allowed("byte_order", "integer or floating"));
        }
        self.byte_order = byte_order;
        Ok(self)
    }

    /// Code-page conversion tags applied by the service (character fields only)
    pub fn with_encodings(
        mut self,
        before: Option<String>,
        after: Option<String>,
    ) -> Result<Self, ValidationError> {
        if !matches!(self.kind, ParameterKind::Char { .. }) {
            return Err(self.not_allowed("encoding", "char"));
        }
        if self.raw_hex && (before.is_some() || after.is_some()) {
            return Err(ValidationError::RawHexWithEncoding(self.name.clone()));
        }
        self.before_encoding = before;
        self.after_encoding = after;
        Ok(self)
    }

    /// Take the value from the byte width of the structure carrying `label`
    pub fn with_length_of(mut self, label: impl Into<String>) -> Result<Self, ValidationError> {
        if !self.kind.is_integer() {
            return Err(self.not_allowed("length_of", "integer"));
        }
        self.length_of = Some(label.into());
        Ok(self)
    }

    /// Replace the value, validating it against the declared kind
    pub fn with_value(mut self, value: Value) -> Result<Self, ValidationError> {
        self.value = value;
        self.validate_value()?;
        Ok(self)
    }

    fn not_allowed(&self, option: &'static str, allowed: &'static str) -> ValidationError {
        ValidationError::OptionNotAllowed {
            name: self.name.clone(),
            option,
            allowed,
        }
    }

    fn validate_value(&self) -> Result<(), ValidationError> {
        let mut scratch = Vec::with_capacity(self.occurrence_width());
        codec::encode_scalar(self, &self.value, &mut scratch)
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    pub fn io(&self) -> IoDirection {
        self.io
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn varying(&self) -> Varying {
        self.varying
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn raw_hex(&self) -> bool {
        self.raw_hex
    }

    pub fn length_of(&self) -> Option<&str> {
        self.length_of.as_deref()
    }

    pub fn is_hole(&self) -> bool {
        matches!(self.kind, ParameterKind::Hole { .. })
    }

    /// Bytes of one occurrence, including the varying header
    pub fn occurrence_width(&self) -> usize {
        self.kind.width() + self.varying.header_len()
    }

    /// Bytes of all occurrences
    pub fn byte_width(&self) -> usize {
        self.occurrence_width() * self.dimension.max(1) as usize
    }

    /// Wire layout of this descriptor
    pub fn shape(&self) -> Shape {
        match self.kind {
            ParameterKind::Char { size } => Shape::Char {
                size,
                varying: self.varying,
                raw_hex: self.raw_hex,
                before: self.before_encoding.clone(),
                after: self.after_encoding.clone(),
            },
            ParameterKind::SignedInt(w) => Shape::Int {
                bits: w.bits(),
                signed: true,
                byte_order: self.byte_order,
            },
            ParameterKind::UnsignedInt(w) => Shape::Int {
                bits: w.bits(),
                signed: false,
                byte_order: self.byte_order,
            },
            ParameterKind::Float => Shape::Float {
                byte_order: self.byte_order,
            },
            ParameterKind::Real => Shape::Real {
                byte_order: self.byte_order,
            },
            ParameterKind::PackedDecimal { length, scale } => Shape::Packed { length, scale },
            ParameterKind::Zoned { length, scale } => Shape::Zoned { length, scale },
            ParameterKind::Binary { size } => Shape::Binary { size },
            ParameterKind::Hole { size } => Shape::Hole { size },
        }
    }

    /// Rebuild a descriptor from its wire layout, with a zero value
    pub fn from_shape(
        io: IoDirection,
        name: &str,
        dimension: u32,
        shape: &Shape,
    ) -> Result<Self, ValidationError> {
        let descriptor = match shape {
            Shape::Char {
                size,
                varying,
                raw_hex,
                before,
                after,
            } => {
                let base = if *raw_hex {
                    Self::char_hex(io, name, *size, "")?
                } else {
                    Self::char(io, name, *size, "")?
                };
                base.with_varying(*varying)?
                    .with_encodings(before.clone(), after.clone())?
            }
            Shape::Int {
                bits,
                signed,
                byte_order,
            } => {
                let base = if *signed {
                    Self::signed(io, name, *bits, 0)?
                } else {
                    Self::unsigned(io, name, *bits, 0)?
                };
                base.with_byte_order(*byte_order)?
            }
            Shape::Float { byte_order } => Self::float(io, name, 0.0)?.with_byte_order(*byte_order)?,
            Shape::Real { byte_order } => Self::real(io, name, 0.0)?.with_byte_order(*byte_order)?,
            Shape::Packed { length, scale } => Self::packed(io, name, *length, *scale, "0")?,
            Shape::Zoned { length, scale } => Self::zoned(io, name, *length, *scale, "0")?,
            Shape::Binary { size } => Self::binary(io, name, *size, Vec::new())?,
            Shape::Hole { size } => Self::hole(name, *size),
            Shape::Struct { .. } => {
                return Err(ValidationError::InvalidValue {
                    name: name.to_string(),
                    reason: "structure layout given where a scalar was expected".to_string(),
                })
            }
        };
        Ok(descriptor.with_dimension(dimension))
    }

    /// Zero value of this descriptor's kind
    pub fn zero_value(&self) -> Value {
        match self.kind {
            ParameterKind::Char { .. } if self.raw_hex => Value::Bytes(Vec::new()),
            ParameterKind::Char { .. } => Value::Text(String::new()),
            ParameterKind::SignedInt(_) => Value::Int(0),
            ParameterKind::UnsignedInt(_) => Value::UInt(0),
            ParameterKind::Float | ParameterKind::Real => Value::Float(0.0),
            ParameterKind::PackedDecimal { .. } | ParameterKind::Zoned { .. } => {
                Value::Decimal(BigDecimal::from(0))
            }
            ParameterKind::Binary { .. } | ParameterKind::Hole { .. } => Value::Bytes(Vec::new()),
        }
    }
}

fn parse_decimal(name: &str, value: &str) -> Result<BigDecimal, ValidationError> {
    BigDecimal::from_str(value.trim()).map_err(|e| ValidationError::InvalidValue {
        name: name.to_string(),
        reason: format!("'{}' is not a decimal number: {}", value, e),
    })
}

/// Convert a caller-supplied dimension, rejecting negative counts
pub fn dimension_from_i64(name: &str, dimension: i64) -> Result<u32, ValidationError> {
    u32::try_from(dimension).map_err(|_| ValidationError::NegativeDimension {
        name: name.to_string(),
        dimension,
    })
}
