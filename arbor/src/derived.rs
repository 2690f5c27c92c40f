use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::context::CurrentTracker;
use crate::event::{Event, EventKind, ListenerGuard};
use crate::graph::{self, GraphShared, ROOT};
use crate::{Node, Value};

/// What a derived callback may produce: a plain raw value, or a node - in
/// which case the derived value passes the node's raw value through and
/// external writes to the derived node forward to it.
pub enum Source {
    Value(Value),
    Node(Node),
}

impl From<Value> for Source {
    fn from(value: Value) -> Source { Source::Value(value) }
}
impl From<Node> for Source {
    fn from(node: Node) -> Source { Source::Node(node) }
}
impl From<&Node> for Source {
    fn from(node: &Node) -> Source { Source::Node(node.clone()) }
}
impl From<&str> for Source {
    fn from(value: &str) -> Source { Source::Value(value.into()) }
}
impl From<String> for Source {
    fn from(value: String) -> Source { Source::Value(value.into()) }
}
impl From<f64> for Source {
    fn from(value: f64) -> Source { Source::Value(value.into()) }
}
impl From<i64> for Source {
    fn from(value: i64) -> Source { Source::Value(value.into()) }
}
impl From<i32> for Source {
    fn from(value: i32) -> Source { Source::Value(value.into()) }
}
impl From<usize> for Source {
    fn from(value: usize) -> Source { Source::Value(value.into()) }
}
impl From<bool> for Source {
    fn from(value: bool) -> Source { Source::Value(value.into()) }
}

/// Extra state carried by the graph behind a derived node.
pub(crate) struct DerivedState {
    compute: Box<dyn Fn() -> Source + Send + Sync>,
    /// Monotonically advancing; subscriptions capture the generation current
    /// at subscribe time and become inert once it moves on.
    generation: AtomicU64,
    /// Live subscriptions to the current dependency set. Replaced wholesale
    /// on every recomputation, so at most one set is ever live.
    guards: Mutex<Vec<ListenerGuard>>,
    /// Set when the latest result was itself a node (trivial passthrough).
    passthrough: Mutex<Option<Node>>,
    /// True while the engine itself writes the result back.
    writing: AtomicBool,
}

impl DerivedState {
    /// Where an external write to the derived node should go, if anywhere.
    pub(crate) fn forward_target(&self) -> Option<Node> {
        if self.writing.load(Ordering::SeqCst) {
            return None;
        }
        self.passthrough.lock().unwrap().clone()
    }
}

/// Wraps a derived value: runs `compute` now, records every node it reads as
/// a dependency, and re-runs it (with a fresh dependency set) whenever any of
/// them changes. The returned node's own `Change` fires only when the
/// recomputed result actually differs.
pub fn derive<F, S>(compute: F) -> Node
where
    F: Fn() -> S + Send + Sync + 'static,
    S: Into<Source>,
{
    let node = graph::fresh_root(Value::Undefined, None);
    let state = DerivedState {
        compute: Box::new(move || compute().into()),
        generation: AtomicU64::new(0),
        guards: Mutex::new(Vec::new()),
        passthrough: Mutex::new(None),
        writing: AtomicBool::new(false),
    };
    node.graph.derived.set(state).ok();
    recompute(&node);
    node
}

/// One evaluation cycle: invalidate the previous generation, run the callback
/// under a tracking frame, resubscribe to whatever it read, store the result.
pub(crate) fn recompute(node: &Node) {
    let Some(state) = node.graph.derived.get() else { return };
    let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;

    CurrentTracker::enter();
    let source = (state.compute)();
    let dependencies = CurrentTracker::exit();
    debug!(dependencies = dependencies.len(), generation, "derived recompute");

    let weak: Weak<GraphShared> = Arc::downgrade(&node.graph);
    let mut guards = Vec::with_capacity(dependencies.len());
    for dependency in &dependencies {
        let weak = weak.clone();
        guards.push(dependency.listen(EventKind::Change, move |_event: &Event| {
            let Some(shared) = weak.upgrade() else { return };
            let Some(state) = shared.derived.get() else { return };
            // a stale generation's callback is a no-op
            if state.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            recompute(&Node { graph: shared, id: ROOT });
        }));
    }
    *state.guards.lock().unwrap() = guards;

    let (value, passthrough) = match source {
        Source::Node(source) => (source.get(), Some(source)),
        Source::Value(value) => (value, None),
    };
    *state.passthrough.lock().unwrap() = passthrough;

    state.writing.store(true, Ordering::SeqCst);
    let written = node.set(value);
    state.writing.store(false, Ordering::SeqCst);
    debug_assert!(written.is_ok(), "root writes are infallible");
}
