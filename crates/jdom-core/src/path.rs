//! Paths and path navigation.
//!
//! A [`Path`] is a flat sequence of string segments. Each segment is a
//! property key, an array index, or a character index into a string,
//! depending on what it is applied to. Empty segments are kept in the path
//! but skipped during navigation.
//!
//! # Path string grammar
//!
//! - `a.b.c` -- dot-separated segments
//! - `a[0]`, `[a][0]` -- bracket groups, freely mixed with dots
//! - `'a.b'`, `"a[0]"`, `['a.b']` -- quoted segments keep `.`, `[`, `]` literal
//! - `a\.b` -- a backslash escapes the next character, inside or outside quotes
//!
//! An unterminated quote or bracket is a [`DomError::MalformedInput`].

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{DomError, Result};
use crate::node::{Node, NodeRef, Resolved};
use crate::object::{ObjectNode, Slot};

/// A sequence of segments addressing a location in a document.
///
/// # Examples
///
/// ```
/// use jdom_core::Path;
///
/// let path: Path = "users[0]['e.mail']".parse().unwrap();
/// assert_eq!(path.segments(), ["users", "0", "e.mail"]);
/// assert_eq!(path, Path::root().key("users").index(0).key("e.mail"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<String>);

impl Path {
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// The empty path (alias for `new`).
    #[inline]
    pub fn root() -> Self {
        Self::new()
    }

    /// Append a key segment (builder style).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(k.into());
        self
    }

    /// Append an index segment (builder style).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(i.to_string());
        self
    }

    #[inline]
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    #[inline]
    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Segments that take part in navigation.
    pub(crate) fn non_empty(&self) -> Vec<&str> {
        self.iter().filter(|s| !s.is_empty()).collect()
    }

    /// Parse a JSON Pointer (`/a/b~1c`), without the leading `#`.
    pub fn from_pointer(pointer: &str) -> Self {
        Self(
            pointer
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.replace("~1", "/").replace("~0", "~"))
                .collect(),
        )
    }

    /// Parse a path string; see the module docs for the grammar.
    pub fn parse(input: &str) -> Result<Self> {
        PathParser::new(input).parse()
    }
}

impl FromStr for Path {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Renders in the grammar accepted by [`Path::parse`]: plain segments are
/// dot-joined, anything else is written as a quoted bracket group.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if is_plain(seg) {
                if i > 0 {
                    f.write_str(".")?;
                }
                f.write_str(seg)?;
            } else {
                f.write_str("['")?;
                for ch in seg.chars() {
                    if ch == '\'' || ch == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                f.write_str("']")?;
            }
        }
        Ok(())
    }
}

fn is_plain(seg: &str) -> bool {
    !seg.is_empty()
        && !seg.starts_with(['\'', '"'])
        && !seg.contains(['.', '[', ']', '\\'])
}

/// Dot-join segments for error messages.
pub(crate) fn dotted(segs: &[&str]) -> String {
    segs.join(".")
}

// ============================================================================
// Parser
// ============================================================================

struct PathParser<'a> {
    input: &'a str,
    chars: Peekable<Chars<'a>>,
    segments: Vec<String>,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            segments: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Path> {
        if self.input.is_empty() {
            return Ok(Path::new());
        }
        // `expect_segment` is true at the start and after a dot, when a
        // (possibly empty) dotted segment is owed.
        let mut expect_segment = true;
        loop {
            match self.chars.peek().copied() {
                None => {
                    if expect_segment {
                        self.segments.push(String::new());
                    }
                    break;
                }
                Some('[') => {
                    self.chars.next();
                    let seg = self.bracket()?;
                    self.segments.push(seg);
                    expect_segment = false;
                    self.after_group()?;
                    if self.chars.peek() == Some(&'.') {
                        self.chars.next();
                        expect_segment = true;
                    }
                }
                Some('.') => {
                    self.chars.next();
                    self.segments.push(String::new());
                    expect_segment = true;
                }
                Some(_) => {
                    let seg = self.dotted_segment()?;
                    self.segments.push(seg);
                    expect_segment = false;
                    match self.chars.peek().copied() {
                        Some('.') => {
                            self.chars.next();
                            expect_segment = true;
                        }
                        Some('[') | None => {}
                        Some(c) => {
                            return Err(self.error(format!("unexpected {c:?} after segment")))
                        }
                    }
                }
            }
        }
        Ok(Path(self.segments))
    }

    /// A segment between dots: quoted, or plain up to `.`/`[`.
    fn dotted_segment(&mut self) -> Result<String> {
        if let Some(&q) = self.chars.peek() {
            if q == '\'' || q == '"' {
                self.chars.next();
                return self.quoted(q);
            }
        }
        let mut seg = String::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                '.' | '[' => break,
                ']' => return Err(self.error("unbalanced ']'")),
                '\\' => {
                    self.chars.next();
                    seg.push(self.escaped()?);
                }
                _ => {
                    self.chars.next();
                    seg.push(c);
                }
            }
        }
        Ok(seg)
    }

    /// The inside of `[...]`, after the opening bracket.
    fn bracket(&mut self) -> Result<String> {
        let seg = match self.chars.peek().copied() {
            Some(q @ ('\'' | '"')) => {
                self.chars.next();
                self.quoted(q)?
            }
            _ => {
                let mut seg = String::new();
                loop {
                    match self.chars.peek().copied() {
                        None => return Err(self.error("unterminated '['")),
                        Some(']') => break,
                        Some('\\') => {
                            self.chars.next();
                            seg.push(self.escaped()?);
                        }
                        Some(c) => {
                            self.chars.next();
                            seg.push(c);
                        }
                    }
                }
                seg
            }
        };
        match self.chars.next() {
            Some(']') => Ok(seg),
            Some(c) => Err(self.error(format!("expected ']' but found {c:?}"))),
            None => Err(self.error("unterminated '['")),
        }
    }

    /// A quoted run, after the opening quote.
    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut seg = String::new();
        loop {
            match self.chars.next() {
                None => return Err(self.error(format!("unterminated {quote} quote"))),
                Some('\\') => seg.push(self.escaped()?),
                Some(c) if c == quote => return Ok(seg),
                Some(c) => seg.push(c),
            }
        }
    }

    fn escaped(&mut self) -> Result<char> {
        self.chars
            .next()
            .ok_or_else(|| self.error("dangling escape at end of path"))
    }

    /// After a bracket group only `.`, `[` or the end may follow.
    fn after_group(&mut self) -> Result<()> {
        match self.chars.peek().copied() {
            None | Some('.') | Some('[') => Ok(()),
            Some(c) => Err(self.error(format!("unexpected {c:?} after ']'"))),
        }
    }

    fn error(&self, message: impl fmt::Display) -> DomError {
        DomError::malformed(format!("path {:?}: {message}", self.input))
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// Why a navigation step failed; turned into a [`DomError`] only by the
/// strict entry point.
enum Failure {
    Missing,
    OutOfRange { index: usize, len: usize },
    NotNavigable,
}

/// Walk `path` from `root`, failing with a descriptive error.
///
/// - objects: the segment is a key; a self-reference marker keeps the walk
///   on the owning object
/// - arrays: the segment must be a non-negative index
/// - strings: the segment is a character index and yields a one-character
///   string
/// - anything else cannot be navigated
///
/// # Examples
///
/// ```
/// use jdom_core::{path, Node, Path};
///
/// let doc = Node::parse(r#"{"a":{"b":[10,20,30]}}"#).unwrap();
/// let path: Path = "a.b.1".parse().unwrap();
/// assert_eq!(path::resolve(doc.view(), &path).unwrap(), Node::Integer(20));
/// ```
pub fn resolve<'a>(root: NodeRef<'a>, path: &Path) -> Result<Resolved<'a>> {
    walk(root, path).map_err(|(failure, at)| {
        let segs: Vec<&str> = path.iter().take(at + 1).filter(|s| !s.is_empty()).collect();
        let walked = dotted(&segs);
        match failure {
            Failure::Missing => DomError::MissingProperty { path: walked },
            Failure::OutOfRange { index, len } => DomError::IndexOutOfRange {
                path: walked,
                index,
                len,
            },
            Failure::NotNavigable => DomError::NotNavigable { path: walked },
        }
    })
}

/// Walk `path` from `root`, reporting any failure as `None`.
pub fn try_resolve<'a>(root: NodeRef<'a>, path: &Path) -> Option<Resolved<'a>> {
    walk(root, path).ok()
}

fn walk<'a>(root: NodeRef<'a>, path: &Path) -> std::result::Result<Resolved<'a>, (Failure, usize)> {
    let mut current = Resolved::Borrowed(root);
    for (at, seg) in path.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        current = step(current, seg).map_err(|f| (f, at))?;
    }
    Ok(current)
}

fn step<'a>(current: Resolved<'a>, seg: &str) -> std::result::Result<Resolved<'a>, Failure> {
    match current {
        Resolved::Borrowed(NodeRef::Object(obj)) => object_step(obj, seg),
        Resolved::Borrowed(NodeRef::Node(node)) => match node {
            Node::Object(obj) => object_step(obj, seg),
            Node::Array(items) => {
                let index = parse_index(seg)?;
                items
                    .get(index)
                    .map(|n| Resolved::Borrowed(NodeRef::Node(n)))
                    .ok_or(Failure::OutOfRange {
                        index,
                        len: items.len(),
                    })
            }
            Node::String(s) => char_step(s, seg),
            _ => Err(Failure::NotNavigable),
        },
        Resolved::Owned(Node::String(s)) => char_step(&s, seg),
        Resolved::Owned(_) => Err(Failure::NotNavigable),
    }
}

fn object_step<'a>(obj: &'a ObjectNode, seg: &str) -> std::result::Result<Resolved<'a>, Failure> {
    match obj.slot(seg) {
        Some(Slot::Node(node)) => Ok(Resolved::Borrowed(NodeRef::Node(node))),
        Some(Slot::SelfRef) => Ok(Resolved::Borrowed(NodeRef::Object(obj))),
        None => Err(Failure::Missing),
    }
}

fn char_step<'a>(s: &str, seg: &str) -> std::result::Result<Resolved<'a>, Failure> {
    let index = parse_index(seg)?;
    s.chars()
        .nth(index)
        .map(|c| Resolved::Owned(Node::String(c.to_string())))
        .ok_or_else(|| Failure::OutOfRange {
            index,
            len: s.chars().count(),
        })
}

fn parse_index(seg: &str) -> std::result::Result<usize, Failure> {
    if !seg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Failure::NotNavigable);
    }
    seg.parse().map_err(|_| Failure::NotNavigable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(input: &str) -> Vec<String> {
        Path::parse(input).unwrap().0
    }

    #[test]
    fn parses_dotted_segments() {
        assert_eq!(segs("a.b.c"), ["a", "b", "c"]);
    }

    #[test]
    fn keeps_empty_segments() {
        assert_eq!(segs("a..b"), ["a", "", "b"]);
        assert_eq!(segs("a."), ["a", ""]);
        assert!(segs("").is_empty());
    }

    #[test]
    fn parses_bracket_groups() {
        assert_eq!(segs("[a][0]"), ["a", "0"]);
        assert_eq!(segs("a[0].b"), ["a", "0", "b"]);
        assert_eq!(segs("a[0][1]"), ["a", "0", "1"]);
    }

    #[test]
    fn quotes_protect_delimiters() {
        assert_eq!(segs("['a.b']"), ["a.b"]);
        assert_eq!(segs(r#"["x]y"].z"#), ["x]y", "z"]);
        assert_eq!(segs("'a.b'.c"), ["a.b", "c"]);
        assert_eq!(segs(r"['it\'s']"), ["it's"]);
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        assert_eq!(segs(r"a\.b.c"), ["a.b", "c"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(matches!(
            Path::parse("'abc"),
            Err(DomError::MalformedInput { .. })
        ));
        assert!(Path::parse("a['b").is_err());
    }

    #[test]
    fn unterminated_bracket_is_an_error() {
        assert!(Path::parse("a[0").is_err());
        assert!(Path::parse("a]").is_err());
        assert!(Path::parse("[a]b").is_err());
    }

    #[test]
    fn display_round_trips() {
        for input in ["a.b", "a['b.c'][0]", "['']", r"['it\'s']", "x['[y]']"] {
            let path = Path::parse(input).unwrap();
            assert_eq!(Path::parse(&path.to_string()).unwrap(), path, "{input}");
        }
    }

    #[test]
    fn pointer_unescapes() {
        assert_eq!(Path::from_pointer("/a~1b/c~0d").0, ["a/b", "c~d"]);
    }

    #[test]
    fn index_rejects_signs() {
        assert!(parse_index("+1").is_err());
        assert!(parse_index("-1").is_err());
        assert_eq!(parse_index("01").ok(), Some(1));
    }
}
