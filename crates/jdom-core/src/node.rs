//! The value node: a closed tagged union over every JSON value kind.
//!
//! `Node` separates integers, doubles and decimals (the tag is preserved
//! through a render/parse round trip where the text allows it) and separates
//! `Undefined` ("the property is absent") from `Null` ("present, value null").
//!
//! Borrowed views of the tree are handed out as [`NodeRef`], because an
//! object may hold a self-reference marker in place of owning itself: reading
//! such a property yields the *owning* [`ObjectNode`], which is not a `Node`.

use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::coerce::{Coercion, FromNode};
use crate::encoder::RenderStyle;
use crate::error::{DomError, Result};
use crate::object::ObjectNode;

/// Shared sentinel returned by the indexer sugar when nothing is there.
pub(crate) static UNDEFINED: Node = Node::Undefined;

/// A single JSON value.
#[derive(Debug, Clone)]
pub enum Node {
    /// Present, with the value `null`.
    Null,
    /// Absent. Never written inside objects; written as `null` elsewhere.
    Undefined,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Array(Vec<Node>),
    Object(ObjectNode),
}

/// The tag of a [`Node`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Null,
    Undefined,
    Boolean,
    Integer,
    Double,
    Decimal,
    String,
    Array,
    Object,
}

impl NodeKind {
    /// Lower-case name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Null => "null",
            NodeKind::Undefined => "undefined",
            NodeKind::Boolean => "boolean",
            NodeKind::Integer => "integer",
            NodeKind::Double => "double",
            NodeKind::Decimal => "decimal",
            NodeKind::String => "string",
            NodeKind::Array => "array",
            NodeKind::Object => "object",
        }
    }

    /// True for the three numeric sub-kinds.
    pub fn is_number(self) -> bool {
        matches!(self, NodeKind::Integer | NodeKind::Double | NodeKind::Decimal)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Node {
    /// Parse JSON text into a node.
    ///
    /// Tokenizing is delegated to `serde_json`; the token stream is then
    /// folded into a tree by [`crate::decoder`].
    pub fn parse(text: &str) -> Result<Node> {
        crate::decoder::parse(text)
    }

    /// Build a node from a `serde_json::Value`.
    pub fn from_json(value: &serde_json::Value) -> Result<Node> {
        let mut reader = crate::token::ValueReader::new(value);
        crate::decoder::read_document(&mut reader)
    }

    /// Convert this node into a `serde_json::Value`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut writer = crate::token::ValueWriter::new();
        crate::encoder::write_node(self, &mut writer)?;
        writer.finish()
    }

    /// Render as JSON text in the given style.
    pub fn render(&self, style: RenderStyle) -> String {
        crate::encoder::render(self, style)
    }

    /// Encode raw bytes as a base64 string node.
    pub fn bytes(data: &[u8]) -> Node {
        Node::String(BASE64.encode(data))
    }

    /// An empty object node.
    pub fn object() -> Node {
        Node::Object(ObjectNode::new())
    }

    /// An empty array node.
    pub fn array() -> Node {
        Node::Array(Vec::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Undefined => NodeKind::Undefined,
            Node::Bool(_) => NodeKind::Boolean,
            Node::Integer(_) => NodeKind::Integer,
            Node::Double(_) => NodeKind::Double,
            Node::Decimal(_) => NodeKind::Decimal,
            Node::String(_) => NodeKind::String,
            Node::Array(_) => NodeKind::Array,
            Node::Object(_) => NodeKind::Object,
        }
    }

    /// Shorthand for `self.kind().name()`.
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Node::Undefined)
    }

    /// True for `Null` and `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Node::Null | Node::Undefined)
    }

    pub fn is_number(&self) -> bool {
        self.kind().is_number()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Node::String(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Node::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    /// The boolean payload, without coercion.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, without coercion.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The double payload, without coercion.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Node::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectNode> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Number of children for arrays and objects, characters for strings.
    pub fn len(&self) -> usize {
        match self {
            Node::Array(items) => items.len(),
            Node::Object(obj) => obj.len(),
            Node::String(s) => s.chars().count(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to an array node.
    pub fn push(&mut self, value: impl Into<Node>) -> Result<()> {
        match self {
            Node::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            other => Err(DomError::wrong_kind("array", other.type_name())),
        }
    }

    /// Look up a property of an object node.
    pub fn get(&self, key: &str) -> Option<NodeRef<'_>> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Borrow as a [`NodeRef`].
    pub fn view(&self) -> NodeRef<'_> {
        NodeRef::Node(self)
    }

    /// Coerce to `T` with the default (non-strict) rules.
    pub fn coerce<T: FromNode>(&self) -> Result<T> {
        T::from_node(NodeRef::Node(self), &Coercion::default())
    }

    /// Coerce to `T` with explicit rules.
    pub fn coerce_with<T: FromNode>(&self, rules: &Coercion) -> Result<T> {
        T::from_node(NodeRef::Node(self), rules)
    }

    /// Like [`Node::coerce`] but swallows the failure.
    pub fn try_coerce<T: FromNode>(&self) -> Option<T> {
        self.coerce().ok()
    }
}

/// Indexer sugar for arrays: out-of-range or non-array reads give `Undefined`.
impl Index<usize> for Node {
    type Output = Node;

    fn index(&self, index: usize) -> &Node {
        match self {
            Node::Array(items) => items.get(index).unwrap_or(&UNDEFINED),
            _ => &UNDEFINED,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(RenderStyle::Minified))
    }
}

impl FromStr for Node {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Node> {
        Node::parse(s)
    }
}

// ============================================================================
// Equality
// ============================================================================

/// Structural equality. Object key order is ignored, numbers compare by value
/// across Integer/Double/Decimal, and `Null` never equals `Undefined`.
impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Null, Node::Null) | (Node::Undefined, Node::Undefined) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::String(a), Node::String(b)) => a == b,
            (Node::Array(a), Node::Array(b)) => a == b,
            (Node::Object(a), Node::Object(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => numbers_equal(a, b),
            _ => false,
        }
    }
}

fn numbers_equal(a: &Node, b: &Node) -> bool {
    match (a, b) {
        (Node::Integer(x), Node::Integer(y)) => x == y,
        (Node::Double(x), Node::Double(y)) => x == y,
        (Node::Decimal(x), Node::Decimal(y)) => x == y,
        (Node::Integer(i), Node::Double(d)) | (Node::Double(d), Node::Integer(i)) => {
            d.fract() == 0.0 && (*i as f64) == *d && double_to_decimal(*d) == Some(Decimal::from(*i))
        }
        (Node::Integer(i), Node::Decimal(m)) | (Node::Decimal(m), Node::Integer(i)) => {
            Decimal::from(*i) == *m
        }
        (Node::Double(d), Node::Decimal(m)) | (Node::Decimal(m), Node::Double(d)) => {
            double_to_decimal(*d) == Some(*m)
        }
        _ => false,
    }
}

/// Convert a double to the decimal its shortest round-trip text denotes.
///
/// Goes through `Display` so `0.1` becomes decimal `0.1` rather than the
/// binary expansion. `None` for non-finite values and values beyond the
/// decimal range.
pub(crate) fn double_to_decimal(d: f64) -> Option<Decimal> {
    if !d.is_finite() {
        return None;
    }
    Decimal::from_str(&d.to_string()).ok()
}

/// Parse decimal text, accepting exponent notation.
pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}

// ============================================================================
// Typed setters: native values into nodes
// ============================================================================

macro_rules! integer_into_node {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Node {
                fn from(value: $t) -> Node {
                    Node::Integer(i64::from(value))
                }
            }
        )*
    };
}

integer_into_node!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Node {
    fn from(value: u64) -> Node {
        match i64::try_from(value) {
            Ok(i) => Node::Integer(i),
            Err(_) => Node::Decimal(Decimal::from(value)),
        }
    }
}

impl From<usize> for Node {
    fn from(value: usize) -> Node {
        Node::from(value as u64)
    }
}

impl From<f32> for Node {
    fn from(value: f32) -> Node {
        Node::Double(f64::from(value))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Node {
        Node::Double(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Node {
        Node::Bool(value)
    }
}

impl From<Decimal> for Node {
    fn from(value: Decimal) -> Node {
        Node::Decimal(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Node {
        Node::String(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Node {
        Node::String(value.to_owned())
    }
}

/// Dates are stored as RFC 3339 text in UTC.
impl From<DateTime<Utc>> for Node {
    fn from(value: DateTime<Utc>) -> Node {
        Node::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl From<uuid::Uuid> for Node {
    fn from(value: uuid::Uuid) -> Node {
        Node::String(value.hyphenated().to_string())
    }
}

impl From<http::Uri> for Node {
    fn from(value: http::Uri) -> Node {
        Node::String(value.to_string())
    }
}

impl From<ObjectNode> for Node {
    fn from(value: ObjectNode) -> Node {
        Node::Object(value)
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(values: Vec<T>) -> Node {
        Node::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Node {
        value.map_or(Node::Null, Into::into)
    }
}

impl FromIterator<Node> for Node {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Node {
        Node::Array(iter.into_iter().collect())
    }
}

// ============================================================================
// Borrowed views
// ============================================================================

/// A borrowed view of a value in the tree.
///
/// `Object` is produced for self-reference markers (the view is the owner)
/// and when navigation starts at a bare [`ObjectNode`].
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Node(&'a Node),
    Object(&'a ObjectNode),
}

impl<'a> NodeRef<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Node(n) => n.kind(),
            NodeRef::Object(_) => NodeKind::Object,
        }
    }

    /// The underlying node, unless this is a bare object view.
    pub fn node(&self) -> Option<&'a Node> {
        match self {
            NodeRef::Node(n) => Some(n),
            NodeRef::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&'a ObjectNode> {
        match *self {
            NodeRef::Node(Node::Object(obj)) | NodeRef::Object(obj) => Some(obj),
            NodeRef::Node(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&'a [Node]> {
        self.node().and_then(Node::as_array)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.node().and_then(Node::as_str)
    }

    /// Look up a property when this view is an object.
    pub fn get(&self, key: &str) -> Option<NodeRef<'a>> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// True when this view is exactly `obj` (pointer identity).
    pub fn is_same_object(&self, obj: &ObjectNode) -> bool {
        self.as_object().is_some_and(|o| std::ptr::eq(o, obj))
    }

    /// Clone the viewed value into an owned node.
    pub fn to_node(&self) -> Node {
        match self {
            NodeRef::Node(n) => (*n).clone(),
            NodeRef::Object(obj) => Node::Object((*obj).clone()),
        }
    }

    pub fn coerce<T: FromNode>(&self) -> Result<T> {
        T::from_node(*self, &Coercion::default())
    }

    pub fn coerce_with<T: FromNode>(&self, rules: &Coercion) -> Result<T> {
        T::from_node(*self, rules)
    }

    pub fn try_coerce<T: FromNode>(&self) -> Option<T> {
        self.coerce().ok()
    }

    /// Coerce, reading element 0 when the view is an array.
    ///
    /// This is the implicit single-element coercion used by indexer-style
    /// reads; plain [`NodeRef::coerce`] never unwraps arrays.
    pub fn coerce_single<T: FromNode>(&self, rules: &Coercion) -> Result<T> {
        match self.as_array() {
            Some([first, ..]) => T::from_node(NodeRef::Node(first), rules),
            Some([]) => Err(DomError::IndexOutOfRange {
                path: "0".to_string(),
                index: 0,
                len: 0,
            }),
            None => T::from_node(*self, rules),
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_object(), other.as_object()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.node() == other.node(),
            _ => false,
        }
    }
}

impl PartialEq<Node> for NodeRef<'_> {
    fn eq(&self, other: &Node) -> bool {
        match (self, other) {
            (NodeRef::Node(n), other) => *n == other,
            (NodeRef::Object(a), Node::Object(b)) => *a == b,
            _ => false,
        }
    }
}

/// The result of navigation: either a view into the tree or a value that
/// had to be synthesized (a single character of a string, a document loaded
/// by a `$ref` collaborator).
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    Borrowed(NodeRef<'a>),
    Owned(Node),
}

impl<'a> Resolved<'a> {
    pub fn view(&self) -> NodeRef<'_> {
        match self {
            Resolved::Borrowed(r) => *r,
            Resolved::Owned(n) => NodeRef::Node(n),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.view().kind()
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Resolved::Borrowed(r) => r.as_object(),
            Resolved::Owned(n) => n.as_object(),
        }
    }

    /// True when this borrows exactly `obj`.
    pub fn is_same_object(&self, obj: &ObjectNode) -> bool {
        matches!(self, Resolved::Borrowed(r) if r.is_same_object(obj))
    }

    pub fn into_node(self) -> Node {
        match self {
            Resolved::Borrowed(r) => r.to_node(),
            Resolved::Owned(n) => n,
        }
    }

    pub fn coerce<T: FromNode>(&self) -> Result<T> {
        self.view().coerce()
    }
}

impl PartialEq<Node> for Resolved<'_> {
    fn eq(&self, other: &Node) -> bool {
        self.view() == *other
    }
}

// ============================================================================
// serde
// ============================================================================

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Node, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Node::from_json(&value).map_err(serde::de::Error::custom)
    }
}
