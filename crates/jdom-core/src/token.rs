//! The token-stream seam between the document tree and a JSON tokenizer.
//!
//! [`TokenReader`] is a forward-only cursor the decoder folds into a tree;
//! [`TokenWriter`] is the sink the encoder walks the tree into. Byte-level
//! JSON grammar stays on the other side of these traits: `serde_json` does
//! the tokenizing, and [`ValueReader`]/[`ValueWriter`] adapt its `Value`
//! tree to the cursor and sink shapes. [`crate::encoder::TextWriter`] is the
//! text-producing sink.

use std::borrow::Cow;

use serde_json::{Map, Number, Value};

use crate::error::{DomError, Result};

/// The kind of the token a [`TokenReader`] is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    PropertyName,
    String,
    /// A number; [`TokenReader::text`] yields its source text.
    Number,
    True,
    False,
    Null,
    EndOfInput,
}

/// A forward-only JSON token cursor.
pub trait TokenReader {
    /// Kind of the current token.
    fn kind(&self) -> TokenKind;

    /// Text of the current `PropertyName`, `String` or `Number` token.
    fn text(&self) -> Option<&str>;

    /// Move to the next token.
    fn advance(&mut self) -> Result<()>;
}

/// A sink for JSON tokens.
pub trait TokenWriter {
    fn start_object(&mut self) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
    fn start_array(&mut self) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn key(&mut self, key: &str) -> Result<()>;
    fn string(&mut self, value: &str) -> Result<()>;
    /// Write a number from its JSON text.
    fn number(&mut self, raw: &str) -> Result<()>;
    fn bool(&mut self, value: bool) -> Result<()>;
    fn null(&mut self) -> Result<()>;
}

// ============================================================================
// ValueReader
// ============================================================================

/// Token cursor over a `serde_json::Value`.
///
/// The value is flattened up front; numbers keep their source text because
/// the workspace enables `serde_json/arbitrary_precision`.
pub struct ValueReader<'a> {
    tokens: Vec<(TokenKind, Option<Cow<'a, str>>)>,
    pos: usize,
}

impl<'a> ValueReader<'a> {
    /// A cursor positioned on the first token of `value`.
    pub fn new(value: &'a Value) -> Self {
        let mut tokens = Vec::new();
        flatten(value, &mut tokens);
        Self { tokens, pos: 0 }
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<(TokenKind, Option<Cow<'a, str>>)>) {
    match value {
        Value::Null => out.push((TokenKind::Null, None)),
        Value::Bool(true) => out.push((TokenKind::True, None)),
        Value::Bool(false) => out.push((TokenKind::False, None)),
        Value::Number(n) => out.push((TokenKind::Number, Some(Cow::Owned(n.to_string())))),
        Value::String(s) => out.push((TokenKind::String, Some(Cow::Borrowed(s.as_str())))),
        Value::Array(items) => {
            out.push((TokenKind::StartArray, None));
            for item in items {
                flatten(item, out);
            }
            out.push((TokenKind::EndArray, None));
        }
        Value::Object(map) => {
            out.push((TokenKind::StartObject, None));
            for (key, item) in map {
                out.push((TokenKind::PropertyName, Some(Cow::Borrowed(key.as_str()))));
                flatten(item, out);
            }
            out.push((TokenKind::EndObject, None));
        }
    }
}

impl TokenReader for ValueReader<'_> {
    fn kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(TokenKind::EndOfInput, |(kind, _)| *kind)
    }

    fn text(&self) -> Option<&str> {
        self.tokens.get(self.pos).and_then(|(_, text)| text.as_deref())
    }

    fn advance(&mut self) -> Result<()> {
        if self.pos >= self.tokens.len() {
            return Err(DomError::malformed("advanced past end of input"));
        }
        self.pos += 1;
        Ok(())
    }
}

// ============================================================================
// ValueWriter
// ============================================================================

enum Frame {
    Array(Vec<Value>),
    Object(Map<String, Value>, Option<String>),
}

/// Token sink that builds a `serde_json::Value`.
#[derive(Default)]
pub struct ValueWriter {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl ValueWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finished value. Fails if containers are still open or nothing
    /// was written.
    pub fn finish(self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(DomError::malformed("unclosed container at end of output"));
        }
        self.root
            .ok_or_else(|| DomError::malformed("no value was written"))
    }

    fn push_value(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            None if self.root.is_some() => Err(DomError::malformed("more than one root value")),
            None => {
                self.root = Some(value);
                Ok(())
            }
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Object(map, key)) => match key.take() {
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(DomError::malformed("object value written without a key")),
            },
        }
    }
}

impl TokenWriter for ValueWriter {
    fn start_object(&mut self) -> Result<()> {
        self.stack.push(Frame::Object(Map::new(), None));
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object(map, None)) => self.push_value(Value::Object(map)),
            Some(Frame::Object(_, Some(key))) => {
                Err(DomError::malformed(format!("key {key:?} has no value")))
            }
            _ => Err(DomError::malformed("end_object without a matching start_object")),
        }
    }

    fn start_array(&mut self) -> Result<()> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push_value(Value::Array(items)),
            _ => Err(DomError::malformed("end_array without a matching start_array")),
        }
    }

    fn key(&mut self, key: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Object(_, pending @ None)) => {
                *pending = Some(key.to_owned());
                Ok(())
            }
            _ => Err(DomError::malformed(format!("key {key:?} outside of an object"))),
        }
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.push_value(Value::String(value.to_owned()))
    }

    fn number(&mut self, raw: &str) -> Result<()> {
        let number: Number = serde_json::from_str(raw)
            .map_err(|e| DomError::malformed(format!("invalid number {raw:?}: {e}")))?;
        self.push_value(Value::Number(number))
    }

    fn bool(&mut self, value: bool) -> Result<()> {
        self.push_value(Value::Bool(value))
    }

    fn null(&mut self) -> Result<()> {
        self.push_value(Value::Null)
    }
}
