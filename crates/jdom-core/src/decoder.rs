//! Token stream → document tree.
//!
//! The decoder folds a [`TokenReader`] into a [`Node`], advancing until each
//! container's matching end token. Any structural problem in the stream
//! (a value where a key should be, a missing end token, trailing tokens)
//! surfaces as a single [`DomError::MalformedInput`].
//!
//! # Number classification
//!
//! Number tokens keep the tag their text implies:
//!
//! - integer syntax that fits `i64` → `Integer`, otherwise `Decimal`
//!   (falling back to `Double` beyond the decimal range)
//! - fraction or exponent → `Double` when the double reproduces the text's
//!   decimal value exactly, otherwise `Decimal`
//!
//! so `2.5` stays a double and `0.1000000000000000000001` keeps its digits.
//!
//! A literal that neither a finite double nor a decimal can hold is
//! rejected with [`DomError::MalformedInput`], in both directions: `1e400`
//! would overflow to infinity and `1e-400` would underflow to zero. Zero
//! written with any exponent (`0e-400`) is still zero.
//!
//! # Self-reference markers
//!
//! A property whose value is exactly `{"$ref":"#self"}` becomes a
//! self-reference slot, the inverse of what the encoder writes.

use crate::error::{DomError, Result};
use crate::node::{double_to_decimal, parse_decimal, Node};
use crate::object::{ObjectNode, Slot};
use crate::token::{TokenKind, TokenReader, ValueReader};

/// Parse JSON text into a node.
pub fn parse(text: &str) -> Result<Node> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| DomError::malformed(format!("invalid JSON: {e}")))?;
    let mut reader = ValueReader::new(&value);
    read_document(&mut reader)
}

/// Parse JSON text whose root must be an object.
pub fn parse_object(text: &str) -> Result<ObjectNode> {
    match parse(text)? {
        Node::Object(obj) => Ok(obj),
        other => Err(DomError::malformed(format!(
            "expected an object at the root, found {}",
            other.type_name()
        ))),
    }
}

/// Read exactly one value and require the stream to end after it.
pub fn read_document<R: TokenReader + ?Sized>(reader: &mut R) -> Result<Node> {
    let node = read_node(reader)?;
    match reader.kind() {
        TokenKind::EndOfInput => Ok(node),
        other => Err(DomError::malformed(format!(
            "unexpected {other:?} after the root value"
        ))),
    }
}

/// Read one value starting at the current token; leaves the reader on the
/// token after it.
pub fn read_node<R: TokenReader + ?Sized>(reader: &mut R) -> Result<Node> {
    let node = match reader.kind() {
        TokenKind::StartObject => return read_object(reader).map(Node::Object),
        TokenKind::StartArray => return read_array(reader),
        TokenKind::Null => Node::Null,
        TokenKind::True => Node::Bool(true),
        TokenKind::False => Node::Bool(false),
        TokenKind::String => Node::String(token_text(reader)?.to_owned()),
        TokenKind::Number => classify_number(token_text(reader)?)?,
        other => {
            return Err(DomError::malformed(format!(
                "expected a value, found {other:?}"
            )))
        }
    };
    reader.advance()?;
    Ok(node)
}

/// Read an object starting at its `StartObject` token.
pub fn read_object<R: TokenReader + ?Sized>(reader: &mut R) -> Result<ObjectNode> {
    if reader.kind() != TokenKind::StartObject {
        return Err(DomError::malformed(format!(
            "expected an object, found {:?}",
            reader.kind()
        )));
    }
    reader.advance()?;

    let mut obj = ObjectNode::new();
    loop {
        match reader.kind() {
            TokenKind::EndObject => {
                reader.advance()?;
                return Ok(obj);
            }
            TokenKind::PropertyName => {
                let key = token_text(reader)?.to_owned();
                if key.trim().is_empty() {
                    return Err(DomError::malformed(format!(
                        "property key must not be empty or whitespace (got {key:?})"
                    )));
                }
                reader.advance()?;
                let value = read_node(reader)?;
                obj.insert_slot(key, Slot::from_node(value));
            }
            other => {
                return Err(DomError::malformed(format!(
                    "expected a property name or end of object, found {other:?}"
                )))
            }
        }
    }
}

fn read_array<R: TokenReader + ?Sized>(reader: &mut R) -> Result<Node> {
    reader.advance()?;
    let mut items = Vec::new();
    loop {
        match reader.kind() {
            TokenKind::EndArray => {
                reader.advance()?;
                return Ok(Node::Array(items));
            }
            TokenKind::EndOfInput => {
                return Err(DomError::malformed("unterminated array"));
            }
            _ => items.push(read_node(reader)?),
        }
    }
}


fn token_text<R: TokenReader + ?Sized>(reader: &R) -> Result<&str> {
    reader
        .text()
        .ok_or_else(|| DomError::malformed(format!("{:?} token carries no text", reader.kind())))
}

/// Pick the numeric tag for a number token's text.
pub(crate) fn classify_number(text: &str) -> Result<Node> {
    let integer_syntax = !text.contains(['.', 'e', 'E']);
    if integer_syntax {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Node::Integer(i));
        }
        if let Some(d) = parse_decimal(text) {
            return Ok(Node::Decimal(d));
        }
    }

    // Overflow to infinity and underflow of a nonzero literal to zero both
    // count as unrepresentable.
    let zero = mantissa_is_zero(text);
    let double = text
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && (*f != 0.0 || zero));
    let decimal = parse_decimal(text).filter(|d| !d.is_zero() || zero);
    match (double, decimal) {
        (Some(f), Some(d)) => {
            if double_to_decimal(f) == Some(d) {
                Ok(Node::Double(f))
            } else {
                Ok(Node::Decimal(d))
            }
        }
        (Some(f), None) => Ok(Node::Double(f)),
        (None, Some(d)) => Ok(Node::Decimal(d)),
        (None, None) => Err(DomError::malformed(format!("number {text:?} is out of range"))),
    }
}

fn mantissa_is_zero(text: &str) -> bool {
    text.split(['e', 'E'])
        .next()
        .unwrap_or(text)
        .chars()
        .filter(char::is_ascii_digit)
        .all(|c| c == '0')
}
