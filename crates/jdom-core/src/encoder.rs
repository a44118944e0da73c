//! Document tree → token stream and JSON text.
//!
//! [`write_node`] walks a tree into any [`TokenWriter`]. [`TextWriter`] is the
//! writer that produces JSON text, in one of two [`RenderStyle`]s:
//!
//! - `Minified`: no whitespace at all
//! - `Indented`: one property or element per line, 2 spaces per level,
//!   `": "` after keys, empty containers as `{}` / `[]`
//!
//! # Writing rules
//!
//! - `Undefined` properties are skipped; `Undefined` elsewhere is `null`
//! - self-reference slots are written as `{"$ref":"#self"}`
//! - doubles are written in their shortest round-trip form (`3.0`, `0.1`,
//!   `1e300`); NaN and infinities have no JSON form and are written as `null`
//! - decimals keep their scale (`1.50`)
//!
//! # Example
//! ```
//! use jdom_core::{Node, RenderStyle};
//! let node = Node::parse(r#"{"a":[1,2.5]}"#).unwrap();
//! assert_eq!(node.render(RenderStyle::Minified), r#"{"a":[1,2.5]}"#);
//! ```

use crate::error::{DomError, Result};
use crate::node::Node;
use crate::object::{ObjectNode, Slot, REF_KEY, SELF_REF};
use crate::token::TokenWriter;

/// Text layout for rendered JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    #[default]
    Minified,
    Indented,
}

/// Render a node as JSON text.
pub fn render(node: &Node, style: RenderStyle) -> String {
    let mut writer = TextWriter::new(style);
    // A tree always forms a balanced token stream, so neither step can fail.
    match write_node(node, &mut writer).and_then(|()| writer.finish()) {
        Ok(text) => text,
        Err(_) => String::from("null"),
    }
}

/// Render an object as JSON text.
pub fn render_object(obj: &ObjectNode, style: RenderStyle) -> String {
    let mut writer = TextWriter::new(style);
    match write_object(obj, &mut writer).and_then(|()| writer.finish()) {
        Ok(text) => text,
        Err(_) => String::from("{}"),
    }
}

/// Emit a node's tokens.
pub fn write_node<W: TokenWriter + ?Sized>(node: &Node, out: &mut W) -> Result<()> {
    match node {
        Node::Null | Node::Undefined => out.null(),
        Node::Bool(b) => out.bool(*b),
        Node::Integer(i) => out.number(&i.to_string()),
        Node::Double(d) => write_double(*d, out),
        Node::Decimal(d) => out.number(&d.to_string()),
        Node::String(s) => out.string(s),
        Node::Array(items) => {
            out.start_array()?;
            for item in items {
                write_node(item, out)?;
            }
            out.end_array()
        }
        Node::Object(obj) => write_object(obj, out),
    }
}

/// Emit an object's tokens, properties in insertion order.
pub fn write_object<W: TokenWriter + ?Sized>(obj: &ObjectNode, out: &mut W) -> Result<()> {
    out.start_object()?;
    for (key, slot) in obj.slots() {
        match slot {
            Slot::Node(Node::Undefined) => {}
            Slot::Node(node) => {
                out.key(key)?;
                write_node(node, out)?;
            }
            Slot::SelfRef => {
                out.key(key)?;
                out.start_object()?;
                out.key(REF_KEY)?;
                out.string(SELF_REF)?;
                out.end_object()?;
            }
        }
    }
    out.end_object()
}

fn write_double<W: TokenWriter + ?Sized>(d: f64, out: &mut W) -> Result<()> {
    if !d.is_finite() {
        return out.null();
    }
    // `Debug` is the shortest text that parses back to the same bits and
    // always carries a `.` or exponent, so the double tag survives.
    out.number(&format!("{d:?}"))
}

// ============================================================================
// TextWriter
// ============================================================================

struct Frame {
    object: bool,
    empty: bool,
}

/// A [`TokenWriter`] producing JSON text.
pub struct TextWriter {
    out: String,
    style: RenderStyle,
    stack: Vec<Frame>,
    after_key: bool,
    wrote_root: bool,
}

impl TextWriter {
    pub fn new(style: RenderStyle) -> Self {
        Self {
            out: String::new(),
            style,
            stack: Vec::new(),
            after_key: false,
            wrote_root: false,
        }
    }

    /// The rendered text. Fails if containers are still open or nothing was
    /// written.
    pub fn finish(self) -> Result<String> {
        if !self.stack.is_empty() {
            return Err(DomError::malformed("unclosed container at end of output"));
        }
        if !self.wrote_root {
            return Err(DomError::malformed("no value was written"));
        }
        Ok(self.out)
    }

    /// Separator and indentation before a new entry of the current container.
    fn separate(&mut self) {
        let depth = self.stack.len();
        if let Some(frame) = self.stack.last_mut() {
            if !frame.empty {
                self.out.push(',');
            }
            frame.empty = false;
            if self.style == RenderStyle::Indented {
                self.out.push('\n');
                self.out.push_str(&make_indent(depth));
            }
        }
    }

    /// Bookkeeping before any value token.
    fn begin_value(&mut self) -> Result<()> {
        if self.after_key {
            self.after_key = false;
            return Ok(());
        }
        match self.stack.last() {
            None if self.wrote_root => Err(DomError::malformed("more than one root value")),
            None => {
                self.wrote_root = true;
                Ok(())
            }
            Some(frame) if frame.object => {
                Err(DomError::malformed("object value written without a key"))
            }
            Some(_) => {
                self.separate();
                Ok(())
            }
        }
    }

    fn close(&mut self, object: bool) -> Result<()> {
        if self.after_key {
            return Err(DomError::malformed("key has no value"));
        }
        match self.stack.pop() {
            Some(frame) if frame.object == object => {
                if !frame.empty && self.style == RenderStyle::Indented {
                    self.out.push('\n');
                    self.out.push_str(&make_indent(self.stack.len()));
                }
                self.out.push(if object { '}' } else { ']' });
                Ok(())
            }
            _ => Err(DomError::malformed(if object {
                "end_object without a matching start_object"
            } else {
                "end_array without a matching start_array"
            })),
        }
    }
}

impl TokenWriter for TextWriter {
    fn start_object(&mut self) -> Result<()> {
        self.begin_value()?;
        self.out.push('{');
        self.stack.push(Frame {
            object: true,
            empty: true,
        });
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.close(true)
    }

    fn start_array(&mut self) -> Result<()> {
        self.begin_value()?;
        self.out.push('[');
        self.stack.push(Frame {
            object: false,
            empty: true,
        });
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.close(false)
    }

    fn key(&mut self, key: &str) -> Result<()> {
        match self.stack.last() {
            Some(frame) if frame.object && !self.after_key => {}
            _ => return Err(DomError::malformed(format!("key {key:?} outside of an object"))),
        }
        self.separate();
        escape_into(key, &mut self.out);
        self.out.push(':');
        if self.style == RenderStyle::Indented {
            self.out.push(' ');
        }
        self.after_key = true;
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.begin_value()?;
        escape_into(value, &mut self.out);
        Ok(())
    }

    fn number(&mut self, raw: &str) -> Result<()> {
        self.begin_value()?;
        self.out.push_str(raw);
        Ok(())
    }

    fn bool(&mut self, value: bool) -> Result<()> {
        self.begin_value()?;
        self.out.push_str(if value { "true" } else { "false" });
        Ok(())
    }

    fn null(&mut self) -> Result<()> {
        self.begin_value()?;
        self.out.push_str("null");
        Ok(())
    }
}

/// Write `s` as a quoted JSON string.
fn escape_into(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c < ' ' => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

/// Generate a 2-space-per-level indentation string.
fn make_indent(depth: usize) -> String {
    "  ".repeat(depth)
}
