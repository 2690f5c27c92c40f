/*!
Observable state trees.

`arbor` wraps a mutable value tree (objects, arrays, scalars) in a graph of
addressable nodes, one per reachable path. Nodes forward reads and writes to
the underlying raw data, emit fine-grained change events that bubble toward
the root, and power derived values that re-evaluate themselves when anything
they read changes.

# Basic usage

```rust
use arbor::{wrap, EventKind, Value};

let state = wrap(Value::from(serde_json::json!({
    "drinks": ["coffee", "tea", "milk"]
})));

let _guard = state.listen(EventKind::Change, |event| {
    println!("{:?} -> {:?}", event.old_value, event.value);
});

// writes propagate to the root; equal writes emit nothing
state.at("drinks.0").set("water").unwrap();

// array mutations are diffed per index
state.child("drinks").push("cocoa").unwrap();
```

# Derived values

```rust
use arbor::{derive, wrap, Value};

let state = wrap(Value::from(serde_json::json!({
    "index": 2,
    "array": ["foo", "bar", "baz"]
})));

let current = {
    let state = state.clone();
    derive(move || state.child("array").child(state.child("index").as_number() as usize))
};
assert_eq!(current.get(), "baz");

state.child("index").set(1).unwrap();
assert_eq!(current.get(), "bar");
```

Everything is synchronous: `set`, `delete`, array mutation and derived
recomputation all run to completion, listeners included, before returning.
*/

mod arrays;
mod context;
mod derived;
mod error;
mod event;
mod graph;
mod key;
mod node;
mod value;

pub use derived::{derive, Source};
pub use error::Error;
pub use event::{Event, EventKind, EventTarget, Listener, ListenerGuard};
pub use key::Key;
pub use node::Node;
pub use value::{Array, Object, TypeTag, Value};

/// Wraps a raw value as a root node over a synthetic single-slot container,
/// so object trees, arrays, bare scalars and `Null` all wrap uniformly.
///
/// Wrapping the same container handle twice returns the same root node;
/// structurally equal but distinct containers get distinct roots. To wrap the
/// value behind an existing node, pass `&node` - the raw value is extracted
/// first, handles never nest.
///
/// For derived values, see [`derive`].
pub fn wrap(value: impl Into<Value>) -> Node { graph::root_node(value.into()) }
