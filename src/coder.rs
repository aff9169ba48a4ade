//! Value coder: literal text to typed scalars and back
//!
//! Decoding runs after constant substitution, on the raw text of a single
//! token. Errors carry no location; the parser attaches the token position.

use std::str::FromStr;

use bitflags::Flags;

use crate::error::{ParseError, Result};

// ============================================================================
// Decoding
// ============================================================================

/// Case-insensitive `T`, `F`, `True` or `False`.
pub fn decode_bool(text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "t" | "true" => Ok(true),
        "f" | "false" => Ok(false),
        _ => Err(ParseError::conversion(format!("Invalid bool value '{text}'"))),
    }
}

/// Optional leading sign followed by decimal digits only.
pub fn decode_int(text: &str) -> Result<i32> {
    let invalid = || ParseError::conversion(format!("Invalid integer value '{text}'"));
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    text.parse::<i32>().map_err(|_| invalid())
}

/// Decimal, `0`-prefixed octal or `0x`/`0X`-prefixed hex; never signed.
pub fn decode_uint(text: &str) -> Result<u32> {
    let invalid = || ParseError::conversion(format!("Invalid unsigned integer value '{text}'"));
    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    u32::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Decimal or exponential float literal; `inf`/`nan` spellings are rejected.
pub fn decode_float(text: &str) -> Result<f32> {
    let invalid = || ParseError::conversion(format!("Invalid float value '{text}'"));
    let literal_chars = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !literal_chars || !text.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    text.parse::<f32>().map_err(|_| invalid())
}

/// Looks an enum value up by its declared name.
pub fn decode_enum<E: FromStr>(text: &str) -> Result<E> {
    E::from_str(text)
        .map_err(|_| ParseError::conversion(format!("Invalid value for enum: '{text}'")))
}

/// Splits on `|` and resolves each trimmed piece as a flag name.
pub fn decode_flags<F: Flags>(text: &str) -> Result<F> {
    let mut flags = F::empty();
    if text.trim().is_empty() {
        return Ok(flags);
    }
    for piece in text.split('|') {
        let name = piece.trim();
        let flag = F::from_name(name).ok_or_else(|| {
            ParseError::conversion(format!("Invalid value for flag enum: '{name}' in '{text}'"))
        })?;
        flags.insert(flag);
    }
    Ok(flags)
}

// ============================================================================
// Encoding
// ============================================================================

pub fn encode_bool(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

pub fn encode_float(value: f32) -> String {
    value.to_string()
}

/// Quotes a string, escaping anything the tokenizer would not read back
/// verbatim.
pub fn encode_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0B}' => out.push_str("\\v"),
            '\u{0C}' => out.push_str("\\f"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

pub fn encode_flags<F: Flags>(flags: &F) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join("|")
}
