//! The object node and its ordered property store.
//!
//! An [`ObjectNode`] maps unique, case-sensitive, non-blank keys to values in
//! insertion order. Every structural mutation (`set`, `add`, `remove`,
//! `clear`, path writes, merges) is announced to the object's [`Notifier`]
//! after it is committed, one event per affected key.
//!
//! An object cannot own itself. [`ObjectNode::set_self_reference`] stores an
//! explicit marker instead, and reading that key yields the owning object.
//! The marker is written as `{"$ref":"#self"}` and parsed back into a marker.

use std::fmt;

use indexmap::IndexMap;

use crate::coerce::{Coercion, FromNode};
use crate::encoder::RenderStyle;
use crate::error::{check_key, DomError, Result};
use crate::node::{Node, NodeRef, Resolved};
use crate::notify::{ChangeAction, ChangeEvent, Notifier, SubscriptionId};
use crate::path::{self, Path};
use crate::reference::{self, RefContext};

/// Key of the conventional reference property.
pub const REF_KEY: &str = "$ref";

/// Value of [`REF_KEY`] that marks a reference back to the owning object.
pub const SELF_REF: &str = "#self";

/// One stored property value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Node(Node),
    /// The property refers back to the object that holds it.
    SelfRef,
}

impl Slot {
    /// Store a property value; an object spelling the self marker becomes
    /// [`Slot::SelfRef`] so every write path agrees with the decoder.
    pub(crate) fn from_node(node: Node) -> Slot {
        if is_self_marker(&node) {
            Slot::SelfRef
        } else {
            Slot::Node(node)
        }
    }

    pub(crate) fn view<'a>(&'a self, owner: &'a ObjectNode) -> NodeRef<'a> {
        match self {
            Slot::Node(node) => NodeRef::Node(node),
            Slot::SelfRef => NodeRef::Object(owner),
        }
    }

    fn into_node(self) -> Option<Node> {
        match self {
            Slot::Node(node) => Some(node),
            Slot::SelfRef => None,
        }
    }
}

/// True for a node that is exactly `{"$ref": "#self"}`.
pub(crate) fn is_self_marker(node: &Node) -> bool {
    matches!(node, Node::Object(obj) if obj.is_self_marker())
}

/// How [`ObjectNode::merge`] treats keys present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Incoming values replace existing ones.
    #[default]
    Overwrite,
    /// Existing values win; only absent keys are added.
    KeepExisting,
}

/// A JSON object with ordered properties and change notification.
#[derive(Clone, Default)]
pub struct ObjectNode {
    entries: IndexMap<String, Slot>,
    notifier: Notifier,
}

impl ObjectNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            notifier: Notifier::new(),
        }
    }

    /// Parse JSON text whose root must be an object.
    pub fn parse(text: &str) -> Result<ObjectNode> {
        crate::decoder::parse_object(text)
    }

    /// Build an object from key/value pairs, validating every key.
    pub fn from_entries<K, V, I>(entries: I) -> Result<ObjectNode>
    where
        K: Into<String>,
        V: Into<Node>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut obj = ObjectNode::new();
        for (key, value) in entries {
            obj.set(key, value)?;
        }
        Ok(obj)
    }

    pub(crate) fn from_slots(entries: IndexMap<String, Slot>, notifier: Notifier) -> Self {
        Self { entries, notifier }
    }

    pub(crate) fn into_parts(self) -> (IndexMap<String, Slot>, Notifier) {
        (self.entries, self.notifier)
    }

    pub(crate) fn slot(&self, key: &str) -> Option<&Slot> {
        self.entries.get(key)
    }

    pub(crate) fn slots(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// Insert a slot while building a fresh object; no events, no checks.
    pub(crate) fn insert_slot(&mut self, key: String, slot: Slot) {
        self.entries.insert(key, slot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Look up a property. A self-reference marker reads as `self`.
    pub fn get(&self, key: &str) -> Option<NodeRef<'_>> {
        self.entries.get(key).map(|slot| slot.view(self))
    }

    /// Like [`ObjectNode::get`] but reports a missing key as an error.
    pub fn require(&self, key: &str) -> Result<NodeRef<'_>> {
        check_key(key)?;
        self.get(key).ok_or_else(|| DomError::missing(key))
    }

    /// Mutable access to a stored value.
    ///
    /// Edits made through the returned reference are not announced to
    /// listeners. Self-reference markers yield `None`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        match self.entries.get_mut(key) {
            Some(Slot::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn is_self_reference(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(Slot::SelfRef))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.entries.values().map(|slot| slot.view(self))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeRef<'_>)> {
        self.entries
            .iter()
            .map(|(k, slot)| (k.as_str(), slot.view(self)))
    }

    /// Strict typed read with the default coercion rules.
    pub fn get_value<T: FromNode>(&self, key: &str) -> Result<T> {
        self.get_value_with(key, &Coercion::default())
    }

    /// Strict typed read with explicit coercion rules.
    pub fn get_value_with<T: FromNode>(&self, key: &str, rules: &Coercion) -> Result<T> {
        self.require(key)?.coerce_with(rules)
    }

    /// Typed read that reports every failure as `None`.
    pub fn try_get_value<T: FromNode>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.try_coerce())
    }

    /// Typed read falling back to `default` on any failure.
    pub fn get_or<T: FromNode>(&self, key: &str, default: T) -> T {
        self.try_get_value(key).unwrap_or(default)
    }

    /// The object stored at `key`; a self-reference yields `self`.
    pub fn get_object(&self, key: &str) -> Option<&ObjectNode> {
        self.get(key).and_then(|v| v.as_object())
    }

    pub fn get_array(&self, key: &str) -> Option<&[Node]> {
        self.get(key).and_then(|v| v.as_array())
    }

    /// Read `key` and, when it holds a `$ref` object, resolve the reference.
    ///
    /// Resolution is lazy: nothing is followed until this is called.
    /// A self-reference yields this object even when it holds a `$ref` of
    /// its own. Returns `Ok(None)` when the key is absent.
    pub fn get_object_resolved<'a>(
        &'a self,
        key: &str,
        ctx: &RefContext<'a>,
    ) -> Result<Option<Resolved<'a>>> {
        let Some(prop) = self.get(key) else {
            return Ok(None);
        };
        if self.is_self_reference(key) {
            return Ok(Some(Resolved::Borrowed(prop)));
        }
        match prop.as_object() {
            Some(target) if target.ref_target().is_some() => {
                reference::resolve_ref(self, target, ctx).map(Some)
            }
            _ => Ok(Some(Resolved::Borrowed(prop))),
        }
    }

    /// The string value of this object's own `$ref` property, if any.
    pub fn ref_target(&self) -> Option<&str> {
        match self.entries.get(REF_KEY) {
            Some(Slot::Node(Node::String(s))) => Some(s),
            _ => None,
        }
    }

    /// True for exactly `{"$ref": "#self"}`.
    pub(crate) fn is_self_marker(&self) -> bool {
        self.entries.len() == 1 && self.ref_target() == Some(SELF_REF)
    }

    /// Strict path navigation from this object.
    pub fn resolve(&self, path: &Path) -> Result<Resolved<'_>> {
        path::resolve(NodeRef::Object(self), path)
    }

    /// Path navigation reporting failure as `None`.
    pub fn try_resolve(&self, path: &Path) -> Option<Resolved<'_>> {
        path::try_resolve(NodeRef::Object(self), path)
    }

    /// Strict typed read at a dotted/bracket path string.
    pub fn value_at<T: FromNode>(&self, path: &str) -> Result<T> {
        let path: Path = path.parse()?;
        self.resolve(&path)?.coerce()
    }

    /// Typed read at a path string; malformed paths also yield `None`.
    pub fn try_value_at<T: FromNode>(&self, path: &str) -> Option<T> {
        let path: Path = path.parse().ok()?;
        self.try_resolve(&path)?.coerce().ok()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert or replace a property and return the replaced value.
    ///
    /// Setting [`Node::Undefined`] removes the key, since undefined means
    /// absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Node>) -> Result<Option<Node>> {
        let key = key.into();
        check_key(&key)?;
        let value = value.into();
        if value.is_undefined() {
            return self.take(&key);
        }
        let previous = self.entries.insert(key.clone(), Slot::from_node(value));
        let action = if previous.is_some() {
            ChangeAction::Replaced
        } else {
            ChangeAction::Added
        };
        self.announce(&key, action);
        Ok(previous.and_then(Slot::into_node))
    }

    /// Make `key` refer back to this object.
    pub fn set_self_reference(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        check_key(&key)?;
        let previous = self.entries.insert(key.clone(), Slot::SelfRef);
        let action = if previous.is_some() {
            ChangeAction::Replaced
        } else {
            ChangeAction::Added
        };
        self.announce(&key, action);
        Ok(())
    }

    /// Insert a property that must not exist yet.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Node>) -> Result<()> {
        let key = key.into();
        check_key(&key)?;
        if self.entries.contains_key(&key) {
            return Err(DomError::precondition(format!(
                "property {key:?} already exists"
            )));
        }
        self.set(key, value).map(|_| ())
    }

    /// Like [`ObjectNode::add`] but reports failure as `false`.
    pub fn try_add(&mut self, key: impl Into<String>, value: impl Into<Node>) -> bool {
        self.add(key, value).is_ok()
    }

    /// Remove a property. Returns `false` (and fires nothing) if it was absent.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        check_key(key)?;
        match self.entries.shift_remove(key) {
            Some(slot) => {
                self.announce_removed(key, &slot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a property and hand back its value.
    ///
    /// A removed self-reference marker yields `None`.
    pub fn take(&mut self, key: &str) -> Result<Option<Node>> {
        check_key(key)?;
        match self.entries.shift_remove(key) {
            Some(slot) => {
                self.announce_removed(key, &slot);
                Ok(slot.into_node())
            }
            None => Ok(None),
        }
    }

    /// Remove every property, announcing each removal in key order.
    pub fn clear(&mut self) {
        let removed: Vec<(String, Slot)> = self.entries.drain(..).collect();
        for (key, slot) in &removed {
            self.announce_removed(key, slot);
        }
    }

    /// Copy every property of `other` into this object.
    ///
    /// Returns the number of keys written. A self-reference marker in
    /// `other` becomes a self-reference to this object.
    pub fn merge(&mut self, other: ObjectNode, policy: MergePolicy) -> usize {
        let (entries, _) = other.into_parts();
        let mut written = 0;
        for (key, slot) in entries {
            let slot = match slot {
                Slot::Node(node) => Slot::from_node(node),
                marker => marker,
            };
            let exists = self.entries.contains_key(&key);
            if exists && policy == MergePolicy::KeepExisting {
                continue;
            }
            self.entries.insert(key.clone(), slot);
            let action = if exists {
                ChangeAction::Replaced
            } else {
                ChangeAction::Added
            };
            self.announce(&key, action);
            written += 1;
        }
        written
    }

    /// Write `value` at `path`, creating missing intermediate objects.
    ///
    /// Array segments must name an existing element. A self-reference marker
    /// along the way is transparent, as in [`path::resolve`].
    pub fn set_path(&mut self, path: &Path, value: impl Into<Node>) -> Result<()> {
        let segs = path.non_empty();
        if segs.is_empty() {
            return Err(DomError::precondition("cannot write at an empty path"));
        }
        set_in_object(self, &segs, 0, value.into())
    }

    /// Remove the value at `path`. Absent targets yield `Ok(false)`.
    pub fn remove_path(&mut self, path: &Path) -> Result<bool> {
        let segs = path.non_empty();
        if segs.is_empty() {
            return Err(DomError::precondition("cannot remove at an empty path"));
        }
        remove_in_object(self, &segs, 0)
    }

    // ------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------

    /// Register a key-aware change listener.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent<'_>) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    /// Register a listener that only receives the changed key.
    pub fn on_property_changed<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.notifier.on_property_changed(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn announce(&self, key: &str, action: ChangeAction) {
        if self.notifier.is_empty() {
            return;
        }
        if let Some(slot) = self.entries.get(key) {
            self.notifier.emit(&ChangeEvent {
                key,
                action,
                value: slot.view(self),
            });
        }
    }

    fn announce_removed(&self, key: &str, slot: &Slot) {
        if self.notifier.is_empty() {
            return;
        }
        self.notifier.emit(&ChangeEvent {
            key,
            action: ChangeAction::Removed,
            value: slot.view(self),
        });
    }

    /// Render as JSON text.
    pub fn render(&self, style: RenderStyle) -> String {
        crate::encoder::render_object(self, style)
    }
}

// ============================================================================
// Path writes
// ============================================================================

fn set_in_object(obj: &mut ObjectNode, segs: &[&str], at: usize, value: Node) -> Result<()> {
    let key = segs[at];
    if at + 1 == segs.len() {
        return obj.set(key, value).map(|_| ());
    }
    check_key(key)?;
    match obj.entries.get(key) {
        None => {
            obj.set(key, ObjectNode::new())?;
        }
        Some(Slot::SelfRef) => return set_in_object(obj, segs, at + 1, value),
        Some(Slot::Node(_)) => {}
    }
    match obj.entries.get_mut(key) {
        Some(Slot::Node(child)) => set_in_node(child, segs, at + 1, value),
        _ => Err(DomError::missing(path::dotted(&segs[..=at]))),
    }
}

fn set_in_node(node: &mut Node, segs: &[&str], at: usize, value: Node) -> Result<()> {
    match node {
        Node::Object(obj) => set_in_object(obj, segs, at, value),
        Node::Array(items) => {
            let len = items.len();
            let index = array_index(segs, at, len)?;
            if at + 1 == segs.len() {
                items[index] = value;
                Ok(())
            } else {
                set_in_node(&mut items[index], segs, at + 1, value)
            }
        }
        _ => Err(DomError::NotNavigable {
            path: path::dotted(&segs[..at]),
        }),
    }
}

fn remove_in_object(obj: &mut ObjectNode, segs: &[&str], at: usize) -> Result<bool> {
    let key = segs[at];
    if at + 1 == segs.len() {
        return obj.remove(key);
    }
    match obj.entries.get(key) {
        None => Ok(false),
        Some(Slot::SelfRef) => remove_in_object(obj, segs, at + 1),
        Some(Slot::Node(_)) => match obj.entries.get_mut(key) {
            Some(Slot::Node(child)) => remove_in_node(child, segs, at + 1),
            _ => Ok(false),
        },
    }
}

fn remove_in_node(node: &mut Node, segs: &[&str], at: usize) -> Result<bool> {
    match node {
        Node::Object(obj) => remove_in_object(obj, segs, at),
        Node::Array(items) => {
            let Ok(index) = segs[at].parse::<usize>() else {
                return Err(DomError::NotNavigable {
                    path: path::dotted(&segs[..=at]),
                });
            };
            if index >= items.len() {
                return Ok(false);
            }
            if at + 1 == segs.len() {
                items.remove(index);
                Ok(true)
            } else {
                remove_in_node(&mut items[index], segs, at + 1)
            }
        }
        _ => Err(DomError::NotNavigable {
            path: path::dotted(&segs[..at]),
        }),
    }
}

fn array_index(segs: &[&str], at: usize, len: usize) -> Result<usize> {
    let index: usize = segs[at].parse().map_err(|_| DomError::NotNavigable {
        path: path::dotted(&segs[..=at]),
    })?;
    if index >= len {
        return Err(DomError::IndexOutOfRange {
            path: path::dotted(&segs[..=at]),
            index,
            len,
        });
    }
    Ok(index)
}

// ============================================================================
// Trait impls
// ============================================================================

/// Key order is ignored; listeners are not compared.
impl PartialEq for ObjectNode {
    fn eq(&self, other: &ObjectNode) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, slot)| other.entries.get(key) == Some(slot))
    }
}

impl fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, slot) in &self.entries {
            match slot {
                Slot::Node(node) => map.entry(key, node),
                Slot::SelfRef => map.entry(key, &format_args!("<self>")),
            };
        }
        map.finish()
    }
}

impl fmt::Display for ObjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(RenderStyle::Minified))
    }
}

impl serde::Serialize for ObjectNode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut writer = crate::token::ValueWriter::new();
        crate::encoder::write_object(self, &mut writer).map_err(serde::ser::Error::custom)?;
        writer
            .finish()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}
