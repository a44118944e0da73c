//! The thread-safe object store.
//!
//! [`ObjectNode`] is a plain single-owner value. Calling
//! [`ThreadSafe::enable_thread_safe_mode`] moves its entries into a
//! [`SyncObject`], whose methods all take `&self` and lock internally, so it
//! can be shared through an `Arc` and mutated from many threads. The upgrade
//! keeps entries, key order and listeners, and fires no events. There is no
//! way back; [`SyncObject::snapshot`] copies the current state out instead.
//!
//! The cascade depth says how many levels of child objects and arrays are
//! upgraded too. Depth `0` upgrades only the object itself; its children stay
//! ordinary nodes that are replaced wholesale on write. Upgrading again with
//! a larger depth deepens the cascade in place.
//!
//! Concurrent writers to the same key race; the last writer wins. Listeners
//! run on the writing thread after the lock is released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::coerce::{Coercion, FromNode};
use crate::error::{check_key, DomError, Result};
use crate::node::{Node, NodeRef};
use crate::notify::{deliver, ChangeAction, ChangeEvent, Listener, Notifier, SubscriptionId};
use crate::object::{is_self_marker, ObjectNode, Slot};

/// Objects that can be upgraded to a [`SyncObject`].
pub trait ThreadSafe {
    /// Upgrade to the thread-safe store, cascading `depth` levels into child
    /// objects and arrays. Idempotent.
    fn enable_thread_safe_mode(self, depth: usize) -> SyncObject;
}

impl ThreadSafe for ObjectNode {
    fn enable_thread_safe_mode(self, depth: usize) -> SyncObject {
        debug!(entries = self.len(), depth, "enabling thread-safe mode");
        SyncObject::upgrade(self, depth)
    }
}

impl ThreadSafe for SyncObject {
    fn enable_thread_safe_mode(self, depth: usize) -> SyncObject {
        self.deepen(depth);
        self
    }
}

#[derive(Debug, Clone)]
enum SyncSlot {
    Node(Node),
    Object(Arc<SyncObject>),
    Array(Arc<SyncArray>),
    SelfRef,
}

impl SyncSlot {
    fn from_node(node: Node, depth: usize) -> SyncSlot {
        if depth == 0 {
            return SyncSlot::Node(node);
        }
        match node {
            Node::Object(obj) => SyncSlot::Object(Arc::new(SyncObject::upgrade(obj, depth - 1))),
            Node::Array(items) => SyncSlot::Array(Arc::new(SyncArray::upgrade(items, depth - 1))),
            other => SyncSlot::Node(other),
        }
    }

    fn from_slot(slot: Slot, depth: usize) -> SyncSlot {
        match slot {
            Slot::Node(node) => SyncSlot::from_node(node, depth),
            Slot::SelfRef => SyncSlot::SelfRef,
        }
    }

    /// Copy out as a plain node. `owner` stands in for self-references.
    fn to_node(&self, owner: &SyncObject) -> Node {
        match self {
            SyncSlot::Node(node) => node.clone(),
            SyncSlot::Object(obj) => Node::Object(obj.snapshot()),
            SyncSlot::Array(arr) => Node::Array(arr.snapshot()),
            SyncSlot::SelfRef => Node::Object(owner.snapshot()),
        }
    }

    fn to_slot(&self) -> Slot {
        match self {
            SyncSlot::Node(node) => Slot::Node(node.clone()),
            SyncSlot::Object(obj) => Slot::Node(Node::Object(obj.snapshot())),
            SyncSlot::Array(arr) => Slot::Node(Node::Array(arr.snapshot())),
            SyncSlot::SelfRef => Slot::SelfRef,
        }
    }

    fn deepen(&mut self, depth: usize) {
        if depth == 0 {
            return;
        }
        match self {
            SyncSlot::Node(node @ (Node::Object(_) | Node::Array(_))) => {
                let node = std::mem::replace(node, Node::Null);
                *self = SyncSlot::from_node(node, depth);
            }
            SyncSlot::Object(obj) => obj.deepen(depth - 1),
            SyncSlot::Array(arr) => arr.deepen(depth - 1),
            _ => {}
        }
    }
}

// ============================================================================
// SyncObject
// ============================================================================

/// An object store safe for concurrent reads and writes.
#[derive(Debug, Default)]
pub struct SyncObject {
    entries: RwLock<IndexMap<String, SyncSlot>>,
    notifier: Mutex<Notifier>,
    cascade: AtomicUsize,
}

impl SyncObject {
    pub fn new() -> Self {
        Self::default()
    }

    fn upgrade(obj: ObjectNode, depth: usize) -> SyncObject {
        let (entries, notifier) = obj.into_parts();
        let entries = entries
            .into_iter()
            .map(|(key, slot)| (key, SyncSlot::from_slot(slot, depth)))
            .collect();
        SyncObject {
            entries: RwLock::new(entries),
            notifier: Mutex::new(notifier),
            cascade: AtomicUsize::new(depth),
        }
    }

    fn deepen(&self, depth: usize) {
        if self.cascade.fetch_max(depth, Ordering::AcqRel) >= depth {
            return;
        }
        debug!(depth, "deepening thread-safe cascade");
        let mut entries = self.entries.write();
        for slot in entries.values_mut() {
            slot.deepen(depth);
        }
    }

    /// How many levels of children new values are upgraded to.
    pub fn cascade_depth(&self) -> usize {
        self.cascade.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Keys in insertion order, as of the call.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn is_self_reference(&self, key: &str) -> bool {
        matches!(self.entries.read().get(key), Some(SyncSlot::SelfRef))
    }

    /// A copy of the value at `key`.
    ///
    /// A self-reference yields a snapshot of this object.
    pub fn get(&self, key: &str) -> Option<Node> {
        let slot = self.entries.read().get(key).cloned()?;
        Some(slot.to_node(self))
    }

    /// The shared child object at `key`, when the cascade upgraded it.
    pub fn object(&self, key: &str) -> Option<Arc<SyncObject>> {
        match self.entries.read().get(key) {
            Some(SyncSlot::Object(obj)) => Some(Arc::clone(obj)),
            _ => None,
        }
    }

    /// The shared child array at `key`, when the cascade upgraded it.
    pub fn array(&self, key: &str) -> Option<Arc<SyncArray>> {
        match self.entries.read().get(key) {
            Some(SyncSlot::Array(arr)) => Some(Arc::clone(arr)),
            _ => None,
        }
    }

    /// Strict typed read with the default coercion rules.
    pub fn get_value<T: FromNode>(&self, key: &str) -> Result<T> {
        self.get_value_with(key, &Coercion::default())
    }

    pub fn get_value_with<T: FromNode>(&self, key: &str, rules: &Coercion) -> Result<T> {
        check_key(key)?;
        let node = self.get(key).ok_or_else(|| DomError::missing(key))?;
        node.coerce_with(rules)
    }

    pub fn try_get_value<T: FromNode>(&self, key: &str) -> Option<T> {
        self.get(key)?.try_coerce()
    }

    /// Insert or replace a property and return the replaced value.
    /// Setting [`Node::Undefined`] removes the key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Node>) -> Result<Option<Node>> {
        let key = key.into();
        check_key(&key)?;
        let value = value.into();
        if value.is_undefined() {
            return self.take(&key);
        }
        if is_self_marker(&value) {
            let previous = self.store_self_ref(key);
            return Ok(previous.map(|slot| slot.to_node(self)));
        }
        let listeners = self.listeners();
        let echo = (!listeners.is_empty()).then(|| value.clone());
        let slot = SyncSlot::from_node(value, self.cascade_depth());
        let previous = self.entries.write().insert(key.clone(), slot);

        if let Some(value) = echo {
            deliver(
                &listeners,
                &ChangeEvent {
                    key: &key,
                    action: action_for(previous.is_some()),
                    value: NodeRef::Node(&value),
                },
            );
        }
        Ok(previous.map(|slot| slot.to_node(self)))
    }

    /// Make `key` refer back to this object.
    pub fn set_self_reference(&self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        check_key(&key)?;
        self.store_self_ref(key);
        Ok(())
    }

    fn store_self_ref(&self, key: String) -> Option<SyncSlot> {
        let previous = self.entries.write().insert(key.clone(), SyncSlot::SelfRef);
        self.announce_self_ref(&key, action_for(previous.is_some()));
        previous
    }

    fn announce_self_ref(&self, key: &str, action: ChangeAction) {
        let listeners = self.listeners();
        if !listeners.is_empty() {
            let owner = self.snapshot();
            deliver(
                &listeners,
                &ChangeEvent {
                    key,
                    action,
                    value: NodeRef::Object(&owner),
                },
            );
        }
    }

    /// Insert a property that must not exist yet.
    pub fn add(&self, key: impl Into<String>, value: impl Into<Node>) -> Result<()> {
        let key = key.into();
        check_key(&key)?;
        let value = value.into();
        let marker = is_self_marker(&value);
        let listeners = self.listeners();
        let echo = (!listeners.is_empty() && !marker).then(|| value.clone());
        {
            let mut entries = self.entries.write();
            if entries.contains_key(&key) {
                return Err(DomError::precondition(format!(
                    "property {key:?} already exists"
                )));
            }
            if value.is_undefined() {
                return Ok(());
            }
            let slot = if marker {
                SyncSlot::SelfRef
            } else {
                SyncSlot::from_node(value, self.cascade_depth())
            };
            entries.insert(key.clone(), slot);
        }
        if marker {
            self.announce_self_ref(&key, ChangeAction::Added);
        } else if let Some(value) = echo {
            deliver(
                &listeners,
                &ChangeEvent {
                    key: &key,
                    action: ChangeAction::Added,
                    value: NodeRef::Node(&value),
                },
            );
        }
        Ok(())
    }

    /// Remove a property. Returns `false` (and fires nothing) if it was absent.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.take(key).map(|removed| removed.is_some())
    }

    /// Remove a property and hand back a copy of its value.
    pub fn take(&self, key: &str) -> Result<Option<Node>> {
        check_key(key)?;
        let removed = self.entries.write().shift_remove(key);
        let Some(slot) = removed else {
            return Ok(None);
        };
        let value = slot.to_node(self);
        self.announce_removed(key, &value);
        Ok(Some(value))
    }

    /// Remove every property, announcing each removal in key order.
    pub fn clear(&self) {
        let removed: Vec<(String, SyncSlot)> = self.entries.write().drain(..).collect();
        for (key, slot) in &removed {
            let value = slot.to_node(self);
            self.announce_removed(key, &value);
        }
    }

    /// Copy the current state into a plain object. Listeners are not copied.
    pub fn snapshot(&self) -> ObjectNode {
        let slots: IndexMap<String, SyncSlot> = self.entries.read().clone();
        let entries = slots
            .iter()
            .map(|(key, slot)| (key.clone(), slot.to_slot()))
            .collect();
        ObjectNode::from_slots(entries, Notifier::new())
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent<'_>) + Send + Sync + 'static,
    {
        self.notifier.lock().subscribe(listener)
    }

    pub fn on_property_changed<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.notifier.lock().on_property_changed(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.lock().unsubscribe(id)
    }

    fn listeners(&self) -> Vec<Listener> {
        self.notifier.lock().listeners()
    }

    fn announce_removed(&self, key: &str, value: &Node) {
        let listeners = self.listeners();
        deliver(
            &listeners,
            &ChangeEvent {
                key,
                action: ChangeAction::Removed,
                value: NodeRef::Node(value),
            },
        );
    }
}

fn action_for(replaced: bool) -> ChangeAction {
    if replaced {
        ChangeAction::Replaced
    } else {
        ChangeAction::Added
    }
}

// ============================================================================
// SyncArray
// ============================================================================

/// An array upgraded by a thread-safe cascade.
#[derive(Debug, Default)]
pub struct SyncArray {
    items: RwLock<Vec<SyncSlot>>,
    cascade: AtomicUsize,
}

impl SyncArray {
    fn upgrade(items: Vec<Node>, depth: usize) -> SyncArray {
        SyncArray {
            items: RwLock::new(
                items
                    .into_iter()
                    .map(|node| SyncSlot::from_node(node, depth))
                    .collect(),
            ),
            cascade: AtomicUsize::new(depth),
        }
    }

    fn deepen(&self, depth: usize) {
        if self.cascade.fetch_max(depth, Ordering::AcqRel) >= depth {
            return;
        }
        for slot in self.items.write().iter_mut() {
            slot.deepen(depth);
        }
    }

    fn out_of_range(index: usize, len: usize) -> DomError {
        DomError::IndexOutOfRange {
            path: index.to_string(),
            index,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// A copy of the element at `index`.
    pub fn get(&self, index: usize) -> Option<Node> {
        let slot = self.items.read().get(index).cloned()?;
        Some(array_slot_to_node(&slot))
    }

    pub fn object(&self, index: usize) -> Option<Arc<SyncObject>> {
        match self.items.read().get(index) {
            Some(SyncSlot::Object(obj)) => Some(Arc::clone(obj)),
            _ => None,
        }
    }

    pub fn array(&self, index: usize) -> Option<Arc<SyncArray>> {
        match self.items.read().get(index) {
            Some(SyncSlot::Array(arr)) => Some(Arc::clone(arr)),
            _ => None,
        }
    }

    pub fn push(&self, value: impl Into<Node>) {
        let slot = SyncSlot::from_node(value.into(), self.cascade.load(Ordering::Acquire));
        self.items.write().push(slot);
    }

    /// Replace the element at `index` and return the old one.
    pub fn set(&self, index: usize, value: impl Into<Node>) -> Result<Node> {
        let slot = SyncSlot::from_node(value.into(), self.cascade.load(Ordering::Acquire));
        let mut items = self.items.write();
        let len = items.len();
        let target = items
            .get_mut(index)
            .ok_or_else(|| Self::out_of_range(index, len))?;
        let old = std::mem::replace(target, slot);
        drop(items);
        Ok(array_slot_to_node(&old))
    }

    /// Remove the element at `index`, shifting the rest down.
    pub fn remove(&self, index: usize) -> Result<Node> {
        let mut items = self.items.write();
        if index >= items.len() {
            return Err(Self::out_of_range(index, items.len()));
        }
        let old = items.remove(index);
        drop(items);
        Ok(array_slot_to_node(&old))
    }

    pub fn snapshot(&self) -> Vec<Node> {
        let items: Vec<SyncSlot> = self.items.read().clone();
        items.iter().map(array_slot_to_node).collect()
    }
}

/// Array elements never hold self-references.
fn array_slot_to_node(slot: &SyncSlot) -> Node {
    match slot {
        SyncSlot::Node(node) => node.clone(),
        SyncSlot::Object(obj) => Node::Object(obj.snapshot()),
        SyncSlot::Array(arr) => Node::Array(arr.snapshot()),
        SyncSlot::SelfRef => Node::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_keeps_entries_and_order() {
        let obj = ObjectNode::from_entries([("b", 1), ("a", 2)]).unwrap();
        let sync = obj.enable_thread_safe_mode(0);
        assert_eq!(sync.keys(), vec!["b", "a"]);
        assert_eq!(sync.get_value::<i64>("a").unwrap(), 2);
    }

    #[test]
    fn cascade_depth_controls_child_upgrade() {
        let obj = ObjectNode::parse(r#"{"child":{"grand":{"x":1}},"list":[{"y":2}]}"#).unwrap();
        let sync = obj.enable_thread_safe_mode(1);
        let child = sync.object("child").unwrap();
        assert!(child.object("grand").is_none());
        assert!(sync.array("list").unwrap().object(0).is_none());

        let sync = sync.enable_thread_safe_mode(2);
        let child = sync.object("child").unwrap();
        assert!(child.object("grand").is_some());
        assert!(sync.array("list").unwrap().object(0).is_some());
    }

    #[test]
    fn zero_depth_keeps_children_plain() {
        let obj = ObjectNode::parse(r#"{"child":{"x":1}}"#).unwrap();
        let sync = obj.enable_thread_safe_mode(0);
        assert!(sync.object("child").is_none());
        assert!(sync.get("child").unwrap().is_object());
    }

    #[test]
    fn snapshot_preserves_self_reference() {
        let mut obj = ObjectNode::new();
        obj.set_self_reference("me").unwrap();
        let sync = obj.enable_thread_safe_mode(0);
        assert!(sync.is_self_reference("me"));
        assert!(sync.snapshot().is_self_reference("me"));
    }

    #[test]
    fn array_bounds_are_checked() {
        let arr = SyncArray::upgrade(vec![Node::from(1)], 0);
        assert!(matches!(arr.set(3, 2), Err(DomError::IndexOutOfRange { index: 3, len: 1, .. })));
        assert_eq!(arr.remove(0).unwrap(), Node::Integer(1));
        assert!(arr.is_empty());
    }
}
