use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, OnceLock, RwLock, Weak};

use tracing::trace;

use crate::derived::DerivedState;
use crate::event::{Event, EventKind, EventTarget};
use crate::{Error, Key, Node, Value};

/// Stable handle into a graph's node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

pub(crate) const ROOT: NodeId = NodeId(0);

/// One wrapped root and every node ever resolved under it. The arena doubles
/// as the root registry: a single mutation refreshes every record's cached
/// value in one pass before the bubbled events go out.
pub(crate) struct GraphShared {
    state: RwLock<GraphState>,
    /// Present when this graph backs a derived node.
    pub(crate) derived: OnceLock<DerivedState>,
    /// Container identity this graph was deduplicated under, if any.
    root_identity: Option<usize>,
}

struct GraphState {
    /// Synthetic single-slot container backing the root node.
    slot: Value,
    records: Vec<NodeRecord>,
}

struct NodeRecord {
    parent: Option<NodeId>,
    key: Key,
    depth: usize,
    /// Last observed value at this path, for diffing.
    cached: Value,
    /// Identity cache: resolving the same key twice yields the same node.
    children: HashMap<Key, NodeId>,
    target: EventTarget,
}

// Wrapping the same container twice must yield the same root node. Entries
// are weak; a graph unregisters itself when it is dropped.
static WRAPPED_ROOTS: LazyLock<Mutex<HashMap<usize, Weak<GraphShared>>>> = LazyLock::new(Default::default);

/// Root node over `value`, deduplicated by container identity. Scalars have
/// no identity and always get a fresh root.
pub(crate) fn root_node(value: Value) -> Node {
    match value.container_id() {
        Some(identity) => {
            let mut roots = WRAPPED_ROOTS.lock().unwrap();
            if let Some(shared) = roots.get(&identity).and_then(Weak::upgrade) {
                return Node { graph: shared, id: ROOT };
            }
            let node = fresh_root(value, Some(identity));
            roots.insert(identity, Arc::downgrade(&node.graph));
            node
        }
        None => fresh_root(value, None),
    }
}

pub(crate) fn fresh_root(value: Value, identity: Option<usize>) -> Node {
    let root = NodeRecord {
        parent: None,
        key: Key::Name("_".into()),
        depth: 0,
        cached: value.clone(),
        children: HashMap::new(),
        target: EventTarget::new(),
    };
    let shared = Arc::new(GraphShared {
        state: RwLock::new(GraphState { slot: value, records: vec![root] }),
        derived: OnceLock::new(),
        root_identity: identity,
    });
    Node { graph: shared, id: ROOT }
}

impl Drop for GraphShared {
    fn drop(&mut self) {
        if let Some(identity) = self.root_identity {
            if let Ok(mut roots) = WRAPPED_ROOTS.lock() {
                if let Some(weak) = roots.get(&identity) {
                    if weak.strong_count() == 0 {
                        roots.remove(&identity);
                    }
                }
            }
        }
    }
}

/// Current raw value at `id`, resolved top-down from the root slot.
fn value_at(state: &GraphState, id: NodeId) -> Value {
    let record = &state.records[id.0];
    match record.parent {
        None => state.slot.clone(),
        Some(parent) => value_at(state, parent).index(&record.key),
    }
}

impl GraphShared {
    /// Identity cache lookup: the existing child node for (parent, key), or a
    /// freshly created one. Infallible.
    pub(crate) fn resolve(&self, parent: NodeId, key: Key) -> NodeId {
        let key = key.normalize();
        let mut state = self.state.write().unwrap();
        if let Some(&id) = state.records[parent.0].children.get(&key) {
            return id;
        }
        let cached = value_at(&state, parent).index(&key);
        let depth = state.records[parent.0].depth + 1;
        let id = NodeId(state.records.len());
        trace!(key = %key, depth, "node created");
        state.records.push(NodeRecord {
            parent: Some(parent),
            key: key.clone(),
            depth,
            cached,
            children: HashMap::new(),
            target: EventTarget::new(),
        });
        state.records[parent.0].children.insert(key, id);
        id
    }

    /// Overwrites the cached value at `id`. A node resolved after a mutation
    /// caches the post-mutation value, which would mute the following diff;
    /// the array adapter seeds the pre-mutation value back in before it
    /// propagates.
    pub(crate) fn seed_cache(&self, id: NodeId, value: Value) {
        self.state.write().unwrap().records[id.0].cached = value;
    }

    pub(crate) fn value(&self, id: NodeId) -> Value {
        let state = self.state.read().unwrap();
        value_at(&state, id)
    }

    pub(crate) fn is_root(&self, id: NodeId) -> bool { id == ROOT }

    pub(crate) fn parent_of(&self, id: NodeId) -> Option<NodeId> { self.state.read().unwrap().records[id.0].parent }

    /// `None` for the root node.
    pub(crate) fn key_of(&self, id: NodeId) -> Option<Key> {
        let state = self.state.read().unwrap();
        let record = &state.records[id.0];
        record.parent.map(|_| record.key.clone())
    }

    pub(crate) fn target_of(&self, id: NodeId) -> EventTarget { self.state.read().unwrap().records[id.0].target.clone() }

    /// Writes the raw value at `id` into its parent container.
    /// Returns true when the write created the key.
    pub(crate) fn write(&self, id: NodeId, value: Value) -> Result<bool, Error> {
        let mut state = self.state.write().unwrap();
        let (parent, key) = {
            let record = &state.records[id.0];
            (record.parent, record.key.clone())
        };
        match parent {
            None => {
                state.slot = value;
                Ok(false)
            }
            Some(parent) => {
                let container = value_at(&state, parent);
                match (&container, &key) {
                    (Value::Object(object), Key::Name(name)) => {
                        let added = !object.contains_key(name);
                        object.insert(name.clone(), value);
                        Ok(added)
                    }
                    (Value::Object(object), Key::Index(index)) => {
                        let name = index.to_string();
                        let added = !object.contains_key(&name);
                        object.insert(name, value);
                        Ok(added)
                    }
                    (Value::Array(array), Key::Index(index)) => Ok(array.set_extend(*index, value)),
                    _ => Err(Error::Unassignable { key, actual: container.type_of() }),
                }
            }
        }
    }

    /// Removes the key at `id` from its parent container. Missing keys and
    /// non-container parents are silent no-ops (returns false). Removing an
    /// array index leaves an `Undefined` hole; the length is unchanged.
    pub(crate) fn remove(&self, id: NodeId) -> bool {
        let mut state = self.state.write().unwrap();
        let (parent, key) = {
            let record = &state.records[id.0];
            (record.parent, record.key.clone())
        };
        match parent {
            None => {
                let had = !state.slot.is_undefined();
                state.slot = Value::Undefined;
                had
            }
            Some(parent) => {
                let container = value_at(&state, parent);
                match (&container, &key) {
                    (Value::Object(object), Key::Name(name)) => object.remove(name),
                    (Value::Object(object), Key::Index(index)) => object.remove(&index.to_string()),
                    (Value::Array(array), Key::Index(index)) if *index < array.len() => {
                        array.set_extend(*index, Value::Undefined);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Full propagation: local dispatch at `id`, then - unless a listener
    /// stopped the event - one cache-refresh pass over the whole graph and one
    /// shared-event dispatch per affected node, deepest first, root last.
    pub(crate) fn propagate(self: &Arc<Self>, id: NodeId, property_changed: bool) {
        let Some((event, target)) = self.local_change(id) else { return };
        trace!(key = ?event.key, "change");
        target.dispatch(&event);
        target.dispatch(&event.with_kind(EventKind::ValueChange));
        if property_changed {
            target.dispatch(&event.with_kind(EventKind::PropertyChange));
        }
        if event.propagation_stopped() {
            return;
        }
        for target in self.collect_hops(id) {
            if event.propagation_stopped() {
                break;
            }
            target.dispatch(&event);
        }
    }

    /// Non-bubbling variant used for all but the last index of an array diff.
    pub(crate) fn propagate_local(self: &Arc<Self>, id: NodeId) {
        let Some((event, target)) = self.local_change(id) else { return };
        target.dispatch(&event);
        target.dispatch(&event.with_kind(EventKind::ValueChange));
    }

    /// Refreshes the cache at `id` and builds the shared change event.
    /// `None` when the value did not actually change - the idempotence
    /// guarantee: no event fires anywhere.
    fn local_change(self: &Arc<Self>, id: NodeId) -> Option<(Event, EventTarget)> {
        let mut guard = self.state.write().unwrap();
        let state = &mut *guard;
        let value = value_at(state, id);
        let record = &mut state.records[id.0];
        let old_value = std::mem::replace(&mut record.cached, value.clone());
        if value == old_value {
            return None;
        }
        let target = record.target.clone();
        let parent = record.parent;
        let key = parent.map(|_| record.key.clone());
        let event = Event::change(value, old_value, self.node(id), parent.map(|p| self.node(p)), key);
        Some((event, target))
    }

    /// One pass over the arena: refresh every cached value, then gather the
    /// dispatch targets - every node whose value changed as a side effect,
    /// plus the full ancestor chain of the origin and of each changed node.
    /// Ancestors always bubble, even when their own container handle is
    /// untouched by an in-place descendant mutation.
    fn collect_hops(&self, origin: NodeId) -> Vec<EventTarget> {
        let mut guard = self.state.write().unwrap();
        let state = &mut *guard;
        let mut changed = Vec::new();
        for index in 0..state.records.len() {
            let id = NodeId(index);
            if id == origin {
                continue;
            }
            let value = value_at(state, id);
            let record = &mut state.records[index];
            if value != record.cached {
                record.cached = value;
                changed.push(id);
            }
        }
        let mut reached = HashSet::new();
        for &id in changed.iter().chain(std::iter::once(&origin)) {
            if id != origin {
                reached.insert(id);
            }
            let mut current = state.records[id.0].parent;
            while let Some(parent) = current {
                reached.insert(parent);
                current = state.records[parent.0].parent;
            }
        }
        reached.remove(&origin);
        let mut hops: Vec<(usize, EventTarget)> =
            reached.into_iter().map(|id| (state.records[id.0].depth, state.records[id.0].target.clone())).collect();
        hops.sort_by(|a, b| b.0.cmp(&a.0));
        hops.into_iter().map(|(_, target)| target).collect()
    }

    fn node(self: &Arc<Self>, id: NodeId) -> Node { Node { graph: Arc::clone(self), id } }
}
