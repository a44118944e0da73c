//! # jdom-core
//!
//! A mutable, in-memory JSON document model.
//!
//! Documents are trees of tagged [`Node`]s that keep integers, doubles and
//! decimals apart and tell an absent property (`Undefined`) from a `null`
//! one. Objects are ordered property stores that announce every mutation,
//! can refer back to themselves without owning themselves, and can be
//! upgraded to a thread-safe store.
//!
//! ## Quick start
//!
//! ```rust
//! use jdom_core::{ObjectNode, Path, RenderStyle};
//!
//! let mut doc = ObjectNode::parse(r#"{"a":{"b":[10,20,30]}}"#).unwrap();
//! assert_eq!(doc.value_at::<i64>("a.b[1]").unwrap(), 20);
//!
//! doc.set_path(&"a.c".parse::<Path>().unwrap(), "hello").unwrap();
//! doc.set_self_reference("self").unwrap();
//! assert_eq!(
//!     doc.render(RenderStyle::Minified),
//!     r##"{"a":{"b":[10,20,30],"c":"hello"},"self":{"$ref":"#self"}}"##
//! );
//! ```
//!
//! ## Modules
//!
//! - [`node`]: `Node`, the value union, and borrowed views over it
//! - [`coerce`]: the typed-read rules behind every getter
//! - [`object`]: `ObjectNode`, the ordered property store
//! - [`sync`]: the thread-safe store and the upgrade into it
//! - [`path`]: path strings and tree navigation
//! - [`reference`]: `$ref` resolution
//! - [`notify`]: change events and listeners
//! - [`token`], [`decoder`], [`encoder`]: the token-stream bridge and JSON text
//! - [`mapping`]: serde-based mapping to and from native types
//! - [`error`]: error types

pub mod coerce;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod mapping;
pub mod node;
pub mod notify;
pub mod object;
pub mod path;
pub mod reference;
pub mod sync;
pub mod token;

pub use coerce::{Coercion, DateConvention, FromNode};
pub use encoder::{RenderStyle, TextWriter};
pub use error::{DomError, Result};
pub use mapping::{from_native, to_native};
pub use node::{Node, NodeKind, NodeRef, Resolved};
pub use notify::{ChangeAction, ChangeEvent, Notifier, SubscriptionId};
pub use object::{MergePolicy, ObjectNode, REF_KEY, SELF_REF};
pub use path::Path;
pub use reference::{resolve_ref, try_resolve_ref, FileResolver, RefContext, RefTarget, UrlResolver};
pub use sync::{SyncArray, SyncObject, ThreadSafe};
pub use token::{TokenKind, TokenReader, TokenWriter, ValueReader, ValueWriter};
