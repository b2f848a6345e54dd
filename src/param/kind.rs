//! Parameter kinds and their fixed wire widths.

use crate::error::ValidationError;

pub use hostcall_protocol::{ByteOrder, IoDirection, Varying};

/// Largest digit count of a packed or zoned field.
pub const MAX_DECIMAL_DIGITS: u8 = 31;

/// Width of a fixed-size binary integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Map a bit count onto a width
    pub fn from_bits(bits: u8) -> Result<Self, ValidationError> {
        match bits {
            8 => Ok(IntWidth::W8),
            16 => Ok(IntWidth::W16),
            32 => Ok(IntWidth::W32),
            64 => Ok(IntWidth::W64),
            _ => Err(ValidationError::IntegerWidth { bits }),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    pub fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }

    /// Inclusive range of a signed integer of this width
    pub fn signed_range(&self) -> (i64, i64) {
        match self {
            IntWidth::W8 => (i8::MIN as i64, i8::MAX as i64),
            IntWidth::W16 => (i16::MIN as i64, i16::MAX as i64),
            IntWidth::W32 => (i32::MIN as i64, i32::MAX as i64),
            IntWidth::W64 => (i64::MIN, i64::MAX),
        }
    }

    /// Largest unsigned integer of this width
    pub fn unsigned_max(&self) -> u64 {
        match self {
            IntWidth::W8 => u8::MAX as u64,
            IntWidth::W16 => u16::MAX as u64,
            IntWidth::W32 => u32::MAX as u64,
            IntWidth::W64 => u64::MAX,
        }
    }
}

/// Scalar parameter kinds.
///
/// The aggregate kind is represented by [`crate::structure::DataStructure`]
/// and joins scalars through [`crate::structure::Member`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Character data of `size` bytes
    Char { size: u32 },
    SignedInt(IntWidth),
    UnsignedInt(IntWidth),
    /// 4-byte floating point
    Float,
    /// 8-byte floating point
    Real,
    /// Two digits per byte, sign in the last nibble
    PackedDecimal { length: u8, scale: u8 },
    /// One digit per byte, sign in the last zone nibble
    Zoned { length: u8, scale: u8 },
    /// Opaque bytes with no numeric interpretation
    Binary { size: u32 },
    /// Reserved bytes that never surface in outputs
    Hole { size: u32 },
}

impl ParameterKind {
    /// Packed decimal kind with validated length and scale
    pub fn packed(length: u8, scale: u8) -> Result<Self, ValidationError> {
        check_decimal(length, scale)?;
        Ok(ParameterKind::PackedDecimal { length, scale })
    }

    /// Zoned decimal kind with validated length and scale
    pub fn zoned(length: u8, scale: u8) -> Result<Self, ValidationError> {
        check_decimal(length, scale)?;
        Ok(ParameterKind::Zoned { length, scale })
    }

    /// Bytes occupied by one occurrence, excluding any varying header
    pub fn width(&self) -> usize {
        match self {
            ParameterKind::Char { size } => *size as usize,
            ParameterKind::SignedInt(w) | ParameterKind::UnsignedInt(w) => w.bytes(),
            ParameterKind::Float => 4,
            ParameterKind::Real => 8,
            ParameterKind::PackedDecimal { length, .. } => *length as usize / 2 + 1,
            ParameterKind::Zoned { length, .. } => *length as usize,
            ParameterKind::Binary { size } | ParameterKind::Hole { size } => *size as usize,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParameterKind::Char { .. } => "char",
            ParameterKind::SignedInt(_) => "signed integer",
            ParameterKind::UnsignedInt(_) => "unsigned integer",
            ParameterKind::Float => "float",
            ParameterKind::Real => "real",
            ParameterKind::PackedDecimal { .. } => "packed decimal",
            ParameterKind::Zoned { .. } => "zoned decimal",
            ParameterKind::Binary { .. } => "binary",
            ParameterKind::Hole { .. } => "hole",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ParameterKind::SignedInt(_) | ParameterKind::UnsignedInt(_))
    }

    /// Kinds whose wire form depends on byte order
    pub fn is_binary_numeric(&self) -> bool {
        self.is_integer() || matches!(self, ParameterKind::Float | ParameterKind::Real)
    }
}

fn check_decimal(length: u8, scale: u8) -> Result<(), ValidationError> {
    if length == 0 || length > MAX_DECIMAL_DIGITS {
        return Err(ValidationError::DecimalLength { length });
    }
    if scale > length {
        return Err(ValidationError::DecimalScale { length, scale });
    }
    Ok(())
}
