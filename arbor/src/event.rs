use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::{Key, Node, Value};

/// Event type. `Change` is the only kind that bubbles; `ValueChange` and
/// `PropertyChange` fire locally next to it, and callers may dispatch their
/// own `Custom` kinds through [`Node::dispatch_event`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Change,
    ValueChange,
    PropertyChange,
    Custom(Arc<str>),
}

/// The detail delivered to listeners. One logical mutation shares a single
/// event across every node it reaches, so `stop_propagation` called anywhere
/// along the chain halts the remaining hops of that mutation.
#[derive(Clone)]
pub struct Event {
    pub kind: EventKind,
    /// New value at the mutated node.
    pub value: Value,
    /// Previous value at the mutated node.
    pub old_value: Value,
    /// The node that was mutated. `None` only for custom events.
    pub source: Option<Node>,
    /// Parent of the mutated node; `None` when the root itself changed.
    pub parent: Option<Node>,
    /// Key of the mutated node within its parent; `None` for the root.
    pub key: Option<Key>,
    stopped: Arc<AtomicBool>,
}

impl Event {
    pub(crate) fn change(value: Value, old_value: Value, source: Node, parent: Option<Node>, key: Option<Key>) -> Self {
        Self { kind: EventKind::Change, value, old_value, source: Some(source), parent, key, stopped: Arc::new(AtomicBool::new(false)) }
    }

    /// A caller-defined event, delivered to local listeners only.
    pub fn custom(name: impl Into<Arc<str>>, detail: impl Into<Value>) -> Self {
        Self {
            kind: EventKind::Custom(name.into()),
            value: detail.into(),
            old_value: Value::Undefined,
            source: None,
            parent: None,
            key: None,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Same event under a more specific kind; shares the stop flag.
    pub(crate) fn with_kind(&self, kind: EventKind) -> Self {
        let mut event = self.clone();
        event.kind = kind;
        event
    }

    /// Prevents this mutation's event from reaching any further node.
    pub fn stop_propagation(&self) { self.stopped.store(true, Ordering::SeqCst); }

    pub fn propagation_stopped(&self) -> bool { self.stopped.load(Ordering::SeqCst) }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("old_value", &self.old_value)
            .field("key", &self.key)
            .finish()
    }
}

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Per-node listener registry, one observer list per event kind.
#[derive(Clone, Default)]
pub struct EventTarget(Arc<TargetInner>);

#[derive(Default)]
struct TargetInner {
    listeners: RwLock<HashMap<EventKind, HashMap<usize, Listener>>>,
    next_id: AtomicUsize,
}

/// A subscription handle; dropping it unsubscribes. Holds only a weak
/// reference, so a forgotten guard never keeps a node graph alive.
pub struct ListenerGuard {
    inner: Weak<TargetInner>,
    kind: EventKind,
    id: usize,
}

impl EventTarget {
    pub fn new() -> Self { Self::default() }

    pub fn listen(&self, kind: EventKind, listener: impl Fn(&Event) + Send + Sync + 'static) -> ListenerGuard {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        self.0.listeners.write().unwrap().entry(kind.clone()).or_default().insert(id, Arc::new(listener));
        ListenerGuard { inner: Arc::downgrade(&self.0), kind, id }
    }

    /// Delivers `event` to the local listeners of its kind. The listener list
    /// is cloned out of the lock first, so listeners may freely subscribe,
    /// unsubscribe, or mutate state while being called.
    pub fn dispatch(&self, event: &Event) {
        let listeners: Vec<Listener> = {
            let listeners = self.0.listeners.read().unwrap();
            match listeners.get(&event.kind) {
                Some(of_kind) => of_kind.values().cloned().collect(),
                None => return,
            }
        };
        for listener in listeners {
            listener(event);
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut listeners = inner.listeners.write().unwrap();
            if let Some(of_kind) = listeners.get_mut(&self.kind) {
                of_kind.remove(&self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn ping() -> Event { Event::custom("ping", Value::Undefined) }

    #[test]
    fn multiple_listeners_and_guard_drop() {
        let target = EventTarget::new();
        let counter = Arc::new(Mutex::new(0));

        let _keep = {
            let counter = counter.clone();
            target.listen(EventKind::Custom("ping".into()), move |_| *counter.lock().unwrap() += 1)
        };
        let dropped = {
            let counter = counter.clone();
            target.listen(EventKind::Custom("ping".into()), move |_| *counter.lock().unwrap() += 10)
        };

        target.dispatch(&ping());
        assert_eq!(*counter.lock().unwrap(), 11);

        drop(dropped);
        target.dispatch(&ping());
        assert_eq!(*counter.lock().unwrap(), 12);
    }

    #[test]
    fn kinds_are_independent() {
        let target = EventTarget::new();
        let counter = Arc::new(Mutex::new(0));
        let _guard = {
            let counter = counter.clone();
            target.listen(EventKind::Change, move |_| *counter.lock().unwrap() += 1)
        };

        target.dispatch(&ping());
        assert_eq!(*counter.lock().unwrap(), 0);
    }

    #[test]
    fn reentrant_subscription_during_dispatch() {
        let target = EventTarget::new();
        let counter = Arc::new(Mutex::new(0));

        let reentrant = target.clone();
        let counter_ref = counter.clone();
        let _guard = target.listen(EventKind::Custom("ping".into()), move |_| {
            *counter_ref.lock().unwrap() += 1;
            // subscribing (and dropping) inside a callback must not deadlock
            let _temp = reentrant.listen(EventKind::Custom("ping".into()), |_| {});
        });

        target.dispatch(&ping());
        target.dispatch(&ping());
        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[test]
    fn stop_flag_is_shared_across_kinds() {
        let event = ping();
        let specific = event.with_kind(EventKind::ValueChange);
        specific.stop_propagation();
        assert!(event.propagation_stopped());
    }
}
