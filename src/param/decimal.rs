//! Packed and zoned decimal encodings.
//!
//! Packed: two digit nibbles per byte, the final nibble holds the sign
//! (`C` positive, `D` negative). An even digit count gets a leading zero
//! nibble so the sign always lands in the low nibble of the last byte.
//!
//! Zoned: one byte per digit (`0xF0 | digit`); the zone nibble of the last
//! byte holds the sign (`F` positive, `D` negative).
//!
//! Decoding accepts the preferred and alternate sign codes: `A C E F` are
//! positive, `B D` negative.

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::error::ValidationError;

const SIGN_POSITIVE_PACKED: u8 = 0xC;
const SIGN_POSITIVE_ZONED: u8 = 0xF;
const SIGN_NEGATIVE: u8 = 0xD;
const ZONE: u8 = 0xF;

/// Encode `value` as a packed decimal of `length` digits with `scale` fraction digits
pub fn encode_packed(
    name: &str,
    value: &BigDecimal,
    length: u8,
    scale: u8,
) -> Result<Vec<u8>, ValidationError> {
    let (negative, digits) = scaled_digits(name, value, length, scale)?;

    let mut nibbles = Vec::with_capacity(length as usize + 2);
    if length % 2 == 0 {
        nibbles.push(0);
    }
    nibbles.extend_from_slice(&digits);
    nibbles.push(if negative { SIGN_NEGATIVE } else { SIGN_POSITIVE_PACKED });

    Ok(nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

/// Decode a packed decimal field
pub fn decode_packed(bytes: &[u8], length: u8, scale: u8) -> Result<BigDecimal, String> {
    let expected = length as usize / 2 + 1;
    if bytes.len() != expected {
        return Err(format!("packed field is {} bytes, expected {}", bytes.len(), expected));
    }

    let mut nibbles: Vec<u8> = bytes.iter().flat_map(|b| [b >> 4, b & 0x0F]).collect();
    let sign = nibbles.pop().unwrap_or(SIGN_POSITIVE_PACKED);
    let negative = sign_is_negative(sign)?;

    if length % 2 == 0 {
        // pad nibble
        nibbles.remove(0);
    }
    for nibble in &nibbles {
        if *nibble > 9 {
            return Err(format!("invalid digit nibble {:X}", nibble));
        }
    }

    assemble(negative, &nibbles, scale)
}

/// Encode `value` as a zoned decimal of `length` digits with `scale` fraction digits
pub fn encode_zoned(
    name: &str,
    value: &BigDecimal,
    length: u8,
    scale: u8,
) -> Result<Vec<u8>, ValidationError> {
    let (negative, digits) = scaled_digits(name, value, length, scale)?;

    let mut bytes: Vec<u8> = digits.iter().map(|d| (ZONE << 4) | d).collect();
    if let Some(last) = bytes.last_mut() {
        let zone = if negative { SIGN_NEGATIVE } else { SIGN_POSITIVE_ZONED };
        *last = (zone << 4) | (*last & 0x0F);
    }
    Ok(bytes)
}

/// Decode a zoned decimal field
pub fn decode_zoned(bytes: &[u8], length: u8, scale: u8) -> Result<BigDecimal, String> {
    if bytes.len() != length as usize {
        return Err(format!("zoned field is {} bytes, expected {}", bytes.len(), length));
    }

    let mut digits = Vec::with_capacity(bytes.len());
    let mut negative = false;
    for (i, byte) in bytes.iter().enumerate() {
        let zone = byte >> 4;
        let digit = byte & 0x0F;
        if digit > 9 {
            return Err(format!("invalid digit {:X} at offset {}", digit, i));
        }
        if i + 1 == bytes.len() {
            negative = sign_is_negative(zone)?;
        } else if zone != ZONE {
            return Err(format!("invalid zone {:X} at offset {}", zone, i));
        }
        digits.push(digit);
    }

    assemble(negative, &digits, scale)
}

fn sign_is_negative(sign: u8) -> Result<bool, String> {
    match sign {
        0xA | 0xC | 0xE | 0xF => Ok(false),
        0xB | 0xD => Ok(true),
        other => Err(format!("invalid sign nibble {:X}", other)),
    }
}

/// Split `value` into its sign and exactly `length` digits at `scale`
fn scaled_digits(
    name: &str,
    value: &BigDecimal,
    length: u8,
    scale: u8,
) -> Result<(bool, Vec<u8>), ValidationError> {
    let scaled = value.with_scale(scale as i64);
    if &scaled != value {
        return Err(ValidationError::ValueOutOfRange {
            name: name.to_string(),
            reason: format!("{} has more than {} fractional digits", value, scale),
        });
    }

    let (unscaled, _) = scaled.as_bigint_and_exponent();
    let text = unscaled.to_string();
    let (negative, magnitude) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };

    if magnitude.len() > length as usize {
        return Err(ValidationError::ValueOutOfRange {
            name: name.to_string(),
            reason: format!(
                "{} needs more than {} digits ({} integer, {} fraction)",
                value,
                length,
                length - scale,
                scale
            ),
        });
    }

    let mut digits = vec![0u8; length as usize - magnitude.len()];
    digits.extend(magnitude.bytes().map(|b| b - b'0'));
    Ok((negative, digits))
}

/// Rebuild a decimal from its digits, keeping the declared scale
fn assemble(negative: bool, digits: &[u8], scale: u8) -> Result<BigDecimal, String> {
    let mut text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    if text.is_empty() {
        text.push('0');
    }
    let split = text.len().saturating_sub(scale as usize);
    let (int_part, frac_part) = text.split_at(split);
    let int_part = if int_part.is_empty() { "0" } else { int_part };

    let mut rendered = String::new();
    if negative {
        rendered.push('-');
    }
    rendered.push_str(int_part);
    if !frac_part.is_empty() {
        rendered.push('.');
        rendered.push_str(frac_part);
    }

    BigDecimal::from_str(&rendered).map_err(|e| format!("cannot rebuild decimal {}: {}", rendered, e))
}
