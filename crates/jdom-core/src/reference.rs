//! `$ref` resolution.
//!
//! An object whose `$ref` property holds a string names another location:
//!
//! | `$ref` value          | Target |
//! |-----------------------|--------|
//! | `""` or `"#"`         | the root supplied in the [`RefContext`] |
//! | `"#self"`             | the object holding the reference (the source) |
//! | `"#/a/b/c"`           | JSON Pointer walk from the root |
//! | `"#name"`, `"name"`   | top-level key `name` of the root |
//! | `"./x.json"`, `"../x"`| a document read by the [`FileResolver`] |
//! | `"https://..."`       | a document fetched by the [`UrlResolver`] |
//!
//! Resolution only happens when asked for ([`resolve_ref`],
//! [`ObjectNode::get_object_resolved`]). Without a file or URL collaborator
//! such references resolve to the reference object itself. Chains of
//! in-document references are followed up to [`RefContext::max_hops`]; a
//! chain that comes back to an object already visited stops there.

use std::path::Path as FsPath;

use http::Uri;
use tracing::{trace, warn};

use crate::error::{BoxError, DomError, Result};
use crate::node::{Node, NodeRef, Resolved};
use crate::object::{MergePolicy, ObjectNode, REF_KEY, SELF_REF};
use crate::path::{self, Path};

/// Fetches the document behind an absolute URL reference.
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, uri: &Uri) -> std::result::Result<ObjectNode, BoxError>;
}

/// Reads the document behind a relative file reference.
pub trait FileResolver: Send + Sync {
    fn read(&self, path: &FsPath) -> std::result::Result<ObjectNode, BoxError>;
}

impl<F> UrlResolver for F
where
    F: Fn(&Uri) -> std::result::Result<ObjectNode, BoxError> + Send + Sync,
{
    fn resolve(&self, uri: &Uri) -> std::result::Result<ObjectNode, BoxError> {
        self(uri)
    }
}

impl<F> FileResolver for F
where
    F: Fn(&FsPath) -> std::result::Result<ObjectNode, BoxError> + Send + Sync,
{
    fn read(&self, path: &FsPath) -> std::result::Result<ObjectNode, BoxError> {
        self(path)
    }
}

/// Where a `$ref` string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Root,
    SelfRef,
    Pointer(Path),
    Key(String),
    File(String),
    Url(Uri),
}

impl RefTarget {
    /// Classify a `$ref` string.
    pub fn classify(reference: &str) -> RefTarget {
        match reference {
            "" | "#" => return RefTarget::Root,
            SELF_REF => return RefTarget::SelfRef,
            _ => {}
        }
        if let Some(pointer) = reference.strip_prefix("#/") {
            return RefTarget::Pointer(Path::from_pointer(pointer));
        }
        if let Some(name) = reference.strip_prefix('#') {
            return RefTarget::Key(name.to_string());
        }
        if reference.starts_with("./") || reference.starts_with("../") {
            return RefTarget::File(reference.to_string());
        }
        if let Ok(uri) = reference.parse::<Uri>() {
            if uri.scheme().is_some() && uri.host().is_some() {
                return RefTarget::Url(uri);
            }
        }
        RefTarget::Key(reference.to_string())
    }
}

/// Everything `$ref` resolution may need beyond the referencing object.
pub struct RefContext<'a> {
    root: Option<&'a ObjectNode>,
    urls: Option<&'a dyn UrlResolver>,
    files: Option<&'a dyn FileResolver>,
    max_hops: usize,
}

impl Default for RefContext<'_> {
    fn default() -> Self {
        Self {
            root: None,
            urls: None,
            files: None,
            max_hops: 16,
        }
    }
}

impl<'a> RefContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root for `#`, `#/pointer` and bare-key references. Defaults to the
    /// object holding the reference.
    pub fn with_root(mut self, root: &'a ObjectNode) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_urls(mut self, urls: &'a dyn UrlResolver) -> Self {
        self.urls = Some(urls);
        self
    }

    pub fn with_files(mut self, files: &'a dyn FileResolver) -> Self {
        self.files = Some(files);
        self
    }

    /// Limit on in-document references followed in one resolution.
    pub fn max_hops(mut self, hops: usize) -> Self {
        self.max_hops = hops;
        self
    }
}

/// Resolve the reference held by `reference`, which is a property value of
/// (or identical to) `source`.
///
/// Objects without a string `$ref` resolve to themselves. A target that is
/// `source` itself is returned without following its own `$ref`, so an
/// object referring to itself never recurses.
pub fn resolve_ref<'a>(
    source: &'a ObjectNode,
    reference: &'a ObjectNode,
    ctx: &RefContext<'a>,
) -> Result<Resolved<'a>> {
    let root = ctx.root.unwrap_or(source);
    let mut visited: Vec<*const ObjectNode> = vec![reference as *const _];
    let mut current = reference;

    for _ in 0..=ctx.max_hops {
        let Some(target) = current.ref_target() else {
            return Ok(Resolved::Borrowed(NodeRef::Object(current)));
        };
        let next = match RefTarget::classify(target) {
            RefTarget::Root => {
                trace!(reference = target, "resolving $ref to root");
                Resolved::Borrowed(NodeRef::Object(root))
            }
            RefTarget::SelfRef => {
                trace!("resolving $ref to its source object");
                return Ok(Resolved::Borrowed(NodeRef::Object(source)));
            }
            RefTarget::Pointer(pointer) => {
                trace!(reference = target, "resolving $ref pointer");
                path::resolve(NodeRef::Object(root), &pointer)?
            }
            RefTarget::Key(key) => {
                trace!(reference = target, "resolving $ref key against root");
                Resolved::Borrowed(root.require(&key)?)
            }
            RefTarget::File(file) => return load_file(ctx, current, &file),
            RefTarget::Url(uri) => return load_url(ctx, current, &uri),
        };

        // Only in-document object targets can carry a further `$ref`.
        let obj = match &next {
            Resolved::Borrowed(view) => view.as_object(),
            Resolved::Owned(_) => None,
        };
        let Some(obj) = obj else {
            return Ok(next);
        };
        if std::ptr::eq(obj, source) || obj.ref_target().is_none() {
            return Ok(next);
        }
        let ptr = obj as *const ObjectNode;
        if visited.contains(&ptr) {
            trace!(reference = target, "$ref chain revisits an object; stopping");
            return Ok(next);
        }
        visited.push(ptr);
        current = obj;
    }
    Err(DomError::malformed(format!(
        "$ref chain longer than {} hops",
        ctx.max_hops
    )))
}

/// Like [`resolve_ref`], but navigation failures become `Ok(None)`.
///
/// Errors raised by file or URL collaborators are still returned.
pub fn try_resolve_ref<'a>(
    source: &'a ObjectNode,
    reference: &'a ObjectNode,
    ctx: &RefContext<'a>,
) -> Result<Option<Resolved<'a>>> {
    match resolve_ref(source, reference, ctx) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(err) if err.is_local() => Ok(None),
        Err(err) => Err(err),
    }
}

fn load_file<'a>(
    ctx: &RefContext<'a>,
    reference: &'a ObjectNode,
    file: &str,
) -> Result<Resolved<'a>> {
    match ctx.files {
        Some(files) => {
            trace!(file, "loading $ref file");
            let doc = files.read(FsPath::new(file)).map_err(DomError::External)?;
            Ok(Resolved::Owned(Node::Object(doc)))
        }
        None => {
            warn!(file, "no file resolver installed; $ref left unresolved");
            Ok(Resolved::Borrowed(NodeRef::Object(reference)))
        }
    }
}

fn load_url<'a>(ctx: &RefContext<'a>, reference: &'a ObjectNode, uri: &Uri) -> Result<Resolved<'a>> {
    match ctx.urls {
        Some(urls) => {
            trace!(%uri, "fetching $ref url");
            let doc = urls.resolve(uri).map_err(DomError::External)?;
            Ok(Resolved::Owned(Node::Object(doc)))
        }
        None => {
            warn!(%uri, "no url resolver installed; $ref left unresolved");
            Ok(Resolved::Borrowed(NodeRef::Object(reference)))
        }
    }
}

impl ObjectNode {
    /// Replace an external (file or URL) reference with the document it names.
    ///
    /// The loaded properties are merged in, this object's own keys winning,
    /// and `$ref` is removed. Returns `false` when this object holds no
    /// external reference or no collaborator is installed for it.
    pub fn inline_ref(&mut self, ctx: &RefContext<'_>) -> Result<bool> {
        let Some(target) = self.ref_target() else {
            return Ok(false);
        };
        let loaded = match RefTarget::classify(target) {
            RefTarget::File(file) => match ctx.files {
                Some(files) => files.read(FsPath::new(&file)).map_err(DomError::External)?,
                None => return Ok(false),
            },
            RefTarget::Url(uri) => match ctx.urls {
                Some(urls) => urls.resolve(&uri).map_err(DomError::External)?,
                None => return Ok(false),
            },
            _ => return Ok(false),
        };
        self.remove(REF_KEY)?;
        self.merge(loaded, MergePolicy::KeepExisting);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reference_strings() {
        assert_eq!(RefTarget::classify(""), RefTarget::Root);
        assert_eq!(RefTarget::classify("#"), RefTarget::Root);
        assert_eq!(RefTarget::classify("#self"), RefTarget::SelfRef);
        assert_eq!(
            RefTarget::classify("#/a/b"),
            RefTarget::Pointer(Path::from(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(RefTarget::classify("#defs"), RefTarget::Key("defs".into()));
        assert_eq!(RefTarget::classify("defs"), RefTarget::Key("defs".into()));
        assert_eq!(
            RefTarget::classify("./other.json"),
            RefTarget::File("./other.json".into())
        );
        assert!(matches!(
            RefTarget::classify("https://example.com/schema.json"),
            RefTarget::Url(_)
        ));
    }

    #[test]
    fn object_without_ref_resolves_to_itself() {
        let source = ObjectNode::new();
        let plain = ObjectNode::new();
        let resolved = resolve_ref(&source, &plain, &RefContext::new()).unwrap();
        assert!(resolved.is_same_object(&plain));
    }
}
