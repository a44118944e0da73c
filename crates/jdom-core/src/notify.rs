//! Change notification for object mutations.
//!
//! There is one listener list per object. Key-aware listeners receive the
//! full [`ChangeEvent`]; "property changed" listeners are a thin adapter over
//! the same list that only sees the key. Listeners run synchronously, after
//! the mutation is committed, in subscription order. A panicking listener
//! unwinds through the mutating call.

use std::fmt;
use std::sync::Arc;

use crate::node::NodeRef;

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// The key was absent and now holds a value.
    Added,
    /// The key held a value that was replaced.
    Replaced,
    /// The key was removed; the event carries the removed value.
    Removed,
}

/// A single structural mutation of one key.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent<'a> {
    pub key: &'a str,
    pub action: ChangeAction,
    /// The new value for `Added`/`Replaced`, the old value for `Removed`.
    pub value: NodeRef<'a>,
}

/// Handle returned by a subscription; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type Listener = Arc<dyn Fn(&ChangeEvent<'_>) + Send + Sync>;

/// The listener list owned by an object.
///
/// Cloning an object does not clone its listeners: a `Notifier` always
/// clones to an empty list.
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key-aware listener.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent<'_>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Register a listener that only wants to know which key changed.
    pub fn on_property_changed<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| listener(event.key))
    }

    /// Remove a listener. Returns `false` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener, in subscription order.
    pub fn emit(&self, event: &ChangeEvent<'_>) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    /// Copy of the listener list, so delivery can happen after a lock is
    /// released.
    pub(crate) fn listeners(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

impl Clone for Notifier {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Deliver an event to a detached listener list.
pub(crate) fn deliver(listeners: &[Listener], event: &ChangeEvent<'_>) {
    for listener in listeners {
        listener(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use std::sync::Mutex;

    #[test]
    fn both_shapes_share_one_list() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new();

        let s = Arc::clone(&seen);
        notifier.subscribe(move |e| s.lock().unwrap().push(format!("event:{}", e.key)));
        let s = Arc::clone(&seen);
        notifier.on_property_changed(move |key| s.lock().unwrap().push(format!("changed:{key}")));

        let value = Node::Integer(1);
        notifier.emit(&ChangeEvent {
            key: "a",
            action: ChangeAction::Added,
            value: NodeRef::Node(&value),
        });

        assert_eq!(*seen.lock().unwrap(), vec!["event:a", "changed:a"]);
        assert_eq!(notifier.len(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut notifier = Notifier::new();
        let c = Arc::clone(&count);
        let id = notifier.subscribe(move |_| *c.lock().unwrap() += 1);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));

        let value = Node::Null;
        notifier.emit(&ChangeEvent {
            key: "k",
            action: ChangeAction::Removed,
            value: NodeRef::Node(&value),
        });
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn clone_drops_listeners() {
        let mut notifier = Notifier::new();
        notifier.subscribe(|_| {});
        assert!(notifier.clone().is_empty());
    }
}
