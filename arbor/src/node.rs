use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::context::CurrentTracker;
use crate::event::{Event, EventKind, EventTarget, ListenerGuard};
use crate::graph::{GraphShared, NodeId};
use crate::{Error, Key, TypeTag, Value};

/// The addressable handle for one (container, key) path.
///
/// Nodes are cheap to clone; clones are the same node (`==` compares handle
/// identity, which is what the identity cache guarantees per path). A node
/// whose parent chain does not currently resolve to a container is *detached*
/// ([`free`](Node::free)) but stays valid: it reattaches by itself as soon as
/// an ancestor holds an object with the matching key again.
#[derive(Clone)]
pub struct Node {
    pub(crate) graph: Arc<GraphShared>,
    pub(crate) id: NodeId,
}

impl Node {
    /// Current raw value at this path. `Undefined` when detached or missing.
    /// Like child access, a tracked read: registers this node with the active
    /// dependency-tracking context when a derived evaluation is running.
    pub fn get(&self) -> Value {
        CurrentTracker::track(self);
        self.graph.value(self.id)
    }

    /// Writes the raw value at this path and propagates the change. Node
    /// arguments are unwrapped first - handles are never stored in the tree.
    ///
    /// Writing a value equal to the current one emits nothing, at any depth.
    /// On a derived node whose callback passes a single source node through,
    /// the write is forwarded to that source instead.
    pub fn set(&self, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        if let Some(source) = self.passthrough() {
            return source.set(value);
        }
        let added = self.graph.write(self.id, value)?;
        self.graph.propagate(self.id, added);
        Ok(())
    }

    /// Removes this key from its container. Missing keys and non-container
    /// parents are silent no-ops.
    pub fn delete(&self) {
        if let Some(source) = self.passthrough() {
            return source.delete();
        }
        if self.graph.remove(self.id) {
            self.graph.propagate(self.id, true);
        }
    }

    fn passthrough(&self) -> Option<Node> {
        let state = self.graph.derived.get()?;
        if self.graph.is_root(self.id) { state.forward_target() } else { None }
    }

    /// Loose raw-value comparison; unwraps node arguments. Never panics,
    /// whatever the operand shape.
    pub fn is(&self, other: impl Into<Value>) -> bool { self.get().loose_eq(&other.into()) }

    /// Coarse type tag of the current raw value.
    pub fn type_of(&self) -> TypeTag { self.get().type_of() }

    /// True iff this node is currently detached: its parent chain does not
    /// resolve to a container holding this key. Root nodes are never free.
    pub fn free(&self) -> bool {
        match self.graph.parent_of(self.id) {
            None => false,
            Some(parent) => !self.graph.value(parent).is_container(),
        }
    }

    /// Resolves a child node through the identity cache and registers it with
    /// the active dependency-tracking context, if a derived evaluation is
    /// running. Resolving a path through missing intermediate values never
    /// fails - it yields detached nodes.
    pub fn child(&self, key: impl Into<Key>) -> Node {
        let id = self.graph.resolve(self.id, key.into());
        let node = Node { graph: Arc::clone(&self.graph), id };
        CurrentTracker::track(&node);
        node
    }

    /// Shorthand for resolving a `.`-separated path of keys.
    pub fn at(&self, path: &str) -> Node {
        let mut node = self.clone();
        for step in path.split('.') {
            node = node.child(step);
        }
        node
    }

    /// This node's key within its parent; `None` for a root node.
    pub fn key(&self) -> Option<Key> { self.graph.key_of(self.id) }

    /// The node owning this node's container; `None` for a root node.
    pub fn parent(&self) -> Option<Node> {
        self.graph.parent_of(self.id).map(|id| Node { graph: Arc::clone(&self.graph), id })
    }

    /// Enumerable keys of the underlying container (empty for scalars).
    pub fn keys(&self) -> Vec<Key> {
        match self.get() {
            Value::Object(object) => object.keys().into_iter().map(Key::Name).collect(),
            Value::Array(array) => (0..array.len()).map(Key::Index).collect(),
            _ => Vec::new(),
        }
    }

    /// Raw values of the underlying container's entries.
    pub fn values(&self) -> Vec<Value> {
        match self.get() {
            Value::Object(object) => object.snapshot().into_iter().map(|(_, value)| value).collect(),
            Value::Array(array) => array.snapshot(),
            _ => Vec::new(),
        }
    }

    /// (key, child node) pairs for the underlying container's entries.
    pub fn entries(&self) -> Vec<(Key, Node)> {
        self.keys().into_iter().map(|key| (key.clone(), self.child(key))).collect()
    }

    /// Length of the underlying array, object, or string; 0 otherwise.
    pub fn len(&self) -> usize {
        match self.get() {
            Value::Array(array) => array.len(),
            Value::Object(object) => object.len(),
            Value::String(string) => string.chars().count(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Subscribes to events of `kind` on this node. Dropping the returned
    /// guard unsubscribes. Listeners run synchronously inside the mutation
    /// that triggered them; a listener that mutates state re-enters the same
    /// call stack, and nothing guards against unbounded mutual recursion.
    pub fn listen(&self, kind: EventKind, listener: impl Fn(&Event) + Send + Sync + 'static) -> ListenerGuard {
        self.target().listen(kind, listener)
    }

    /// Delivers a caller-defined event to this node's local listeners.
    pub fn dispatch_event(&self, event: &Event) { self.target().dispatch(event) }

    pub(crate) fn target(&self) -> EventTarget { self.graph.target_of(self.id) }

    /// Explicit string coercion of the raw value.
    pub fn as_string(&self) -> String { self.get().as_string() }

    /// Explicit numeric coercion of the raw value (`NaN` where not numeric).
    pub fn as_number(&self) -> f64 { self.get().as_number() }
}

/// Unwrap: assignment through `set` stores raw values, never handles.
impl From<&Node> for Value {
    fn from(node: &Node) -> Value { node.get() }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.graph, &other.graph) && self.id == other.id }
}
impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.graph) as usize).hash(state);
        self.id.hash(state);
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.get()) }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("key", &self.key()).field("value", &self.get()).finish()
    }
}

/// Wrapped trees serialize exactly like their raw value.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { self.get().serialize(serializer) }
}
