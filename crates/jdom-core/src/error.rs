//! Error types for document navigation, coercion and serialization.
//!
//! Every "strict" entry point in this crate returns [`Result`]. The matching
//! "try" entry points swallow the navigation/coercion variants into `None` or
//! `false`, but never [`DomError::External`]: a failing `$ref` collaborator is
//! always reported.

use thiserror::Error;

/// Boxed error produced by an external `$ref` collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while reading, navigating or writing a document.
#[derive(Error, Debug)]
pub enum DomError {
    /// A property named by a key or path segment does not exist.
    /// `path` is the dotted path walked so far, including the missing key.
    #[error("missing property: {path}")]
    MissingProperty { path: String },

    /// A typed read asked for a kind the stored value cannot be coerced to.
    #[error("cannot read {found} as {expected}{}", fmt_detail(.detail))]
    WrongKind {
        expected: &'static str,
        found: &'static str,
        detail: Option<String>,
    },

    /// An array index segment is past the end of the array.
    #[error("index {index} out of range (len: {len}) at {path}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// A path segment tried to descend into a value that has no children.
    #[error("cannot navigate into value at {path}")]
    NotNavigable { path: String },

    /// A token stream or path string was structurally invalid.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A caller broke an API contract (e.g. an empty or whitespace key).
    #[error("precondition violated: {message}")]
    PreconditionViolation { message: String },

    /// An external `$ref` collaborator (file reader, URL resolver) failed.
    #[error("reference resolver failed: {0}")]
    External(#[source] BoxError),

    /// The underlying tokenizer or object mapper failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({d})"),
        None => String::new(),
    }
}

impl DomError {
    /// Create a missing property error for the given dotted path.
    #[inline]
    pub fn missing(path: impl Into<String>) -> Self {
        DomError::MissingProperty { path: path.into() }
    }

    /// Create a wrong kind error without extra detail.
    #[inline]
    pub fn wrong_kind(expected: &'static str, found: &'static str) -> Self {
        DomError::WrongKind {
            expected,
            found,
            detail: None,
        }
    }

    /// Create a malformed input error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        DomError::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a precondition violation error.
    #[inline]
    pub fn precondition(message: impl Into<String>) -> Self {
        DomError::PreconditionViolation {
            message: message.into(),
        }
    }

    /// Attach a detail message to a [`DomError::WrongKind`]; other variants
    /// pass through untouched.
    pub fn with_detail(self, text: impl Into<String>) -> Self {
        match self {
            DomError::WrongKind {
                expected, found, ..
            } => DomError::WrongKind {
                expected,
                found,
                detail: Some(text.into()),
            },
            other => other,
        }
    }

    /// True for the variants a "try" entry point is allowed to swallow.
    pub fn is_local(&self) -> bool {
        !matches!(self, DomError::External(_) | DomError::Json(_))
    }
}

/// Convenience alias used throughout jdom-core.
pub type Result<T> = std::result::Result<T, DomError>;

/// Reject keys that are empty or consist only of whitespace.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(DomError::precondition(format!(
            "property key must not be empty or whitespace (got {key:?})"
        )));
    }
    Ok(())
}
