//! Type coercion: reading any node as a requested native type.
//!
//! Every typed getter funnels through [`FromNode`]. The rules:
//!
//! - string → bool: case-insensitive `true`/`false` only
//! - bool → string: `"true"`/`"false"`; number → string: canonical decimal text
//! - string → number: the target type's own `FromStr`; failure is an error,
//!   never a silent zero
//! - double/decimal → integer: only when the value is integral and in range
//!   (`3.0` reads as `3`, `3.5` fails)
//! - null/undefined → number or bool: zero/false unless [`Coercion::strict`]
//! - object → anything but an object: always fails
//! - arrays never unwrap here; see [`NodeRef::coerce_single`]
//! - dates: strings go through RFC 3339 → RFC 2822 → naive ISO forms;
//!   integers are Unix seconds unless [`DateConvention::LegacyTicks`]
//!
//! Coercion never mutates the node.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{DomError, Result};
use crate::node::{double_to_decimal, parse_decimal, Node, NodeRef};
use crate::object::ObjectNode;

/// How integers and doubles are read as dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateConvention {
    /// Seconds since 1970-01-01T00:00:00Z; doubles carry fractional seconds.
    #[default]
    UnixSeconds,
    /// 100-nanosecond ticks since 0001-01-01T00:00:00Z.
    ///
    /// Compatibility shim for documents written by .NET-style producers.
    /// Dates written by this crate are always RFC 3339 strings.
    LegacyTicks,
}

/// Options for a coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coercion {
    /// When set, null/undefined never read as zero or false.
    pub strict: bool,
    pub dates: DateConvention,
}

impl Coercion {
    /// Non-strict rules, Unix-second dates.
    pub const LENIENT: Coercion = Coercion {
        strict: false,
        dates: DateConvention::UnixSeconds,
    };

    /// Strict rules, Unix-second dates.
    pub const STRICT: Coercion = Coercion {
        strict: true,
        dates: DateConvention::UnixSeconds,
    };

    pub fn with_dates(mut self, dates: DateConvention) -> Self {
        self.dates = dates;
        self
    }
}

/// A native type a node can be read as.
pub trait FromNode: Sized {
    /// Name of the target type for error messages.
    const TARGET: &'static str;

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self>;
}

fn mismatch<T: FromNode>(node: NodeRef<'_>) -> DomError {
    DomError::wrong_kind(T::TARGET, node.kind().name())
}

/// Null/undefined in lenient mode read as the type's zero.
fn nullish_default<T: FromNode>(node: NodeRef<'_>, rules: &Coercion, zero: T) -> Result<T> {
    if rules.strict {
        Err(mismatch::<T>(node).with_detail("strict mode forbids null"))
    } else {
        Ok(zero)
    }
}

// ============================================================================
// Booleans and strings
// ============================================================================

impl FromNode for bool {
    const TARGET: &'static str = "bool";

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::Bool(b)) => Ok(*b),
            Some(Node::String(s)) => {
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(mismatch::<Self>(node).with_detail(format!("{s:?} is not a boolean literal")))
                }
            }
            Some(Node::Null | Node::Undefined) => nullish_default(node, rules, false),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

impl FromNode for String {
    const TARGET: &'static str = "string";

    fn from_node(node: NodeRef<'_>, _rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::String(s)) => Ok(s.clone()),
            Some(Node::Bool(b)) => Ok(b.to_string()),
            Some(Node::Integer(i)) => Ok(i.to_string()),
            Some(Node::Double(d)) => Ok(format_double(*d)),
            Some(Node::Decimal(d)) => Ok(d.to_string()),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

/// Canonical text of a double: shortest round-trip digits, no exponent,
/// integral values without a fraction.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        d.to_string()
    }
}

// ============================================================================
// Integers
// ============================================================================

/// The integral value of a numeric node, or why there is none.
fn integral(node: NodeRef<'_>, target: &'static str) -> Result<i128> {
    let found = node.kind().name();
    match node.node() {
        Some(Node::Integer(i)) => Ok(i128::from(*i)),
        Some(Node::Double(d)) => {
            if !d.is_finite() || d.fract() != 0.0 {
                return Err(DomError::wrong_kind(target, found)
                    .with_detail(format!("{} is not integral", format_double(*d))));
            }
            // Beyond ±2^64 no target type can hold it anyway.
            if d.abs() >= 18_446_744_073_709_551_616.0 {
                return Err(DomError::wrong_kind(target, found)
                    .with_detail(format!("{} is out of range", format_double(*d))));
            }
            Ok(*d as i128)
        }
        Some(Node::Decimal(m)) => {
            if !m.fract().is_zero() {
                return Err(DomError::wrong_kind(target, found)
                    .with_detail(format!("{m} is not integral")));
            }
            m.to_i128().ok_or_else(|| {
                DomError::wrong_kind(target, found).with_detail(format!("{m} is out of range"))
            })
        }
        _ => Err(DomError::wrong_kind(target, found)),
    }
}

macro_rules! integer_from_node {
    ($($t:ty),*) => {
        $(
            impl FromNode for $t {
                const TARGET: &'static str = stringify!($t);

                fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
                    match node.node() {
                        Some(Node::String(s)) => s.parse::<$t>().map_err(|e| {
                            mismatch::<Self>(node).with_detail(format!("{s:?}: {e}"))
                        }),
                        Some(Node::Null | Node::Undefined) => nullish_default(node, rules, 0),
                        Some(Node::Integer(_) | Node::Double(_) | Node::Decimal(_)) => {
                            let wide = integral(node, Self::TARGET)?;
                            <$t>::try_from(wide).map_err(|_| {
                                mismatch::<Self>(node).with_detail(format!("{wide} is out of range"))
                            })
                        }
                        _ => Err(mismatch::<Self>(node)),
                    }
                }
            }
        )*
    };
}

integer_from_node!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

// ============================================================================
// Floating point and decimal
// ============================================================================

impl FromNode for f64 {
    const TARGET: &'static str = "f64";

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::Double(d)) => Ok(*d),
            Some(Node::Integer(i)) => Ok(*i as f64),
            Some(Node::Decimal(m)) => m
                .to_f64()
                .ok_or_else(|| mismatch::<Self>(node).with_detail(format!("{m} is out of range"))),
            Some(Node::String(s)) => {
                let f = s
                    .parse::<f64>()
                    .map_err(|e| mismatch::<Self>(node).with_detail(format!("{s:?}: {e}")))?;
                finite_or_mismatch::<Self, _>(node, s, f)
            }
            Some(Node::Null | Node::Undefined) => nullish_default(node, rules, 0.0),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

impl FromNode for f32 {
    const TARGET: &'static str = "f32";

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        if let Some(Node::String(s)) = node.node() {
            let f = s
                .parse::<f32>()
                .map_err(|e| mismatch::<Self>(node).with_detail(format!("{s:?}: {e}")))?;
            return finite_or_mismatch::<Self, _>(node, s, f);
        }
        let wide = f64::from_node(node, rules).map_err(|_| mismatch::<Self>(node))?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(mismatch::<Self>(node).with_detail(format!("{wide} is out of range")));
        }
        Ok(wide as f32)
    }
}

/// Text such as `"1e40"` parses to infinity for a narrow float; that is a
/// range failure, like the same magnitude held as a double.
fn finite_or_mismatch<T: FromNode, F: Into<f64> + Copy>(
    node: NodeRef<'_>,
    text: &str,
    value: F,
) -> Result<F> {
    if value.into().is_finite() {
        Ok(value)
    } else {
        Err(mismatch::<T>(node).with_detail(format!("{text:?} is out of range")))
    }
}

impl FromNode for Decimal {
    const TARGET: &'static str = "decimal";

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::Decimal(m)) => Ok(*m),
            Some(Node::Integer(i)) => Ok(Decimal::from(*i)),
            Some(Node::Double(d)) => double_to_decimal(*d).ok_or_else(|| {
                mismatch::<Self>(node).with_detail(format!("{} is out of range", format_double(*d)))
            }),
            Some(Node::String(s)) => parse_decimal(s)
                .ok_or_else(|| mismatch::<Self>(node).with_detail(format!("{s:?} is not a decimal"))),
            Some(Node::Null | Node::Undefined) => nullish_default(node, rules, Decimal::ZERO),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

// ============================================================================
// Dates, identifiers, URIs, bytes
// ============================================================================

/// Ticks between 0001-01-01 and the Unix epoch.
const EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

impl FromNode for DateTime<Utc> {
    const TARGET: &'static str = "datetime";

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        let out_of_range = || mismatch::<Self>(node).with_detail("timestamp out of range");
        match node.node() {
            Some(Node::String(s)) => parse_datetime(s)
                .ok_or_else(|| mismatch::<Self>(node).with_detail(format!("{s:?} is not a date"))),
            Some(Node::Integer(i)) => match rules.dates {
                DateConvention::UnixSeconds => DateTime::from_timestamp(*i, 0).ok_or_else(out_of_range),
                DateConvention::LegacyTicks => from_ticks(*i).ok_or_else(out_of_range),
            },
            Some(Node::Double(_) | Node::Decimal(_)) => {
                let secs = f64::from_node(node, rules)?;
                match rules.dates {
                    DateConvention::UnixSeconds => from_fractional_seconds(secs).ok_or_else(out_of_range),
                    DateConvention::LegacyTicks => {
                        let ticks = integral(node, Self::TARGET)?;
                        i64::try_from(ticks)
                            .ok()
                            .and_then(from_ticks)
                            .ok_or_else(out_of_range)
                    }
                }
            }
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

/// Web-date fallback chain.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn from_fractional_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let rem = since_epoch.rem_euclid(TICKS_PER_SECOND);
    DateTime::from_timestamp(secs, 0)?.checked_add_signed(TimeDelta::nanoseconds(rem * 100))
}

impl FromNode for uuid::Uuid {
    const TARGET: &'static str = "uuid";

    fn from_node(node: NodeRef<'_>, _rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::String(s)) => uuid::Uuid::parse_str(s)
                .map_err(|e| mismatch::<Self>(node).with_detail(format!("{s:?}: {e}"))),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

impl FromNode for http::Uri {
    const TARGET: &'static str = "uri";

    fn from_node(node: NodeRef<'_>, _rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::String(s)) => s
                .parse::<http::Uri>()
                .map_err(|e| mismatch::<Self>(node).with_detail(format!("{s:?}: {e}"))),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

/// Bytes come from a base64 string or an array of integers in `0..=255`.
impl FromNode for Vec<u8> {
    const TARGET: &'static str = "bytes";

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::String(s)) => BASE64
                .decode(s.as_bytes())
                .map_err(|e| mismatch::<Self>(node).with_detail(format!("invalid base64: {e}"))),
            Some(Node::Array(items)) => items
                .iter()
                .map(|item| u8::from_node(NodeRef::Node(item), rules))
                .collect(),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

// ============================================================================
// Structural identity
// ============================================================================

impl FromNode for Node {
    const TARGET: &'static str = "node";

    fn from_node(node: NodeRef<'_>, _rules: &Coercion) -> Result<Self> {
        Ok(node.to_node())
    }
}

impl FromNode for ObjectNode {
    const TARGET: &'static str = "object";

    fn from_node(node: NodeRef<'_>, _rules: &Coercion) -> Result<Self> {
        node.as_object()
            .cloned()
            .ok_or_else(|| mismatch::<Self>(node))
    }
}

impl FromNode for Vec<Node> {
    const TARGET: &'static str = "array";

    fn from_node(node: NodeRef<'_>, _rules: &Coercion) -> Result<Self> {
        node.as_array()
            .map(<[Node]>::to_vec)
            .ok_or_else(|| mismatch::<Self>(node))
    }
}

/// Null and undefined read as `None`; anything else must coerce to `T`.
impl<T: FromNode> FromNode for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn from_node(node: NodeRef<'_>, rules: &Coercion) -> Result<Self> {
        match node.node() {
            Some(Node::Null | Node::Undefined) => Ok(None),
            _ => T::from_node(node, rules).map(Some),
        }
    }
}
