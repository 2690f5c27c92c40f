use std::cell::RefCell;
use std::collections::HashSet;

use crate::Node;

// Thread-local stack of tracking frames; derived evaluations nest.
thread_local! {
    static TRACKING_STACK: RefCell<Vec<Vec<Node>>> = const { RefCell::new(Vec::new()) };
}

/// Dependency-tracking context. While a frame is open, every node resolved
/// through child access is recorded as a dependency of the computation that
/// opened the frame.
pub(crate) struct CurrentTracker;

impl CurrentTracker {
    /// Records `node` with the innermost open frame, if any.
    pub(crate) fn track(node: &Node) {
        TRACKING_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.push(node.clone());
            }
        });
    }

    /// Opens a fresh frame, nesting inside any already-open one.
    pub(crate) fn enter() {
        TRACKING_STACK.with(|stack| stack.borrow_mut().push(Vec::new()));
    }

    /// Closes the innermost frame and returns its dependencies, deduplicated
    /// in first-read order.
    pub(crate) fn exit() -> Vec<Node> {
        let frame = TRACKING_STACK.with(|stack| stack.borrow_mut().pop()).unwrap_or_default();
        let mut seen = HashSet::new();
        frame.into_iter().filter(|node| seen.insert(node.clone())).collect()
    }
}
