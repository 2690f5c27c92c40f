//! Array mutation adapter: every in-place operation snapshots the array,
//! performs the real mutation, diffs the snapshots, and emits one
//! notification per changed index - non-bubbling for all but the last, so a
//! single mutation produces exactly one bubbled change per root however many
//! elements it moved.

use std::cmp::Ordering;

use crate::{Error, Key, Node, Value};

impl Node {
    /// Appends a value; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, Error> {
        let value = value.into();
        self.with_array("push", move |values| {
            values.push(value);
            values.len()
        })
    }

    /// Removes and returns the last element (`Undefined` when empty).
    pub fn pop(&self) -> Result<Value, Error> {
        self.with_array("pop", |values| values.pop().unwrap_or_default())
    }

    /// Removes and returns the first element (`Undefined` when empty).
    pub fn shift(&self) -> Result<Value, Error> {
        self.with_array("shift", |values| if values.is_empty() { Value::Undefined } else { values.remove(0) })
    }

    /// Prepends a value; returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize, Error> {
        let value = value.into();
        self.with_array("unshift", move |values| {
            values.insert(0, value);
            values.len()
        })
    }

    /// Removes `delete_count` elements at `start`, inserting `items` in their
    /// place; returns the removed elements. Out-of-range arguments clamp.
    pub fn splice<I, V>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>, Error>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.with_array("splice", move |values| {
            let start = start.min(values.len());
            let end = (start + delete_count).min(values.len());
            values.splice(start..end, items).collect()
        })
    }

    /// Reverses in place.
    pub fn reverse(&self) -> Result<(), Error> { self.with_array("reverse", |values| values.reverse()) }

    /// Sorts in place by string-coercion order (the default comparator).
    pub fn sort(&self) -> Result<(), Error> {
        self.with_array("sort", |values| values.sort_by(|a, b| a.as_string().cmp(&b.as_string())))
    }

    /// Sorts in place with an explicit comparator.
    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<(), Error> {
        self.with_array("sort_by", move |values| values.sort_by(compare))
    }

    /// Snapshot, mutate, diff, notify. The operation's own return value comes
    /// back unchanged; an unchanged array emits nothing.
    fn with_array<R>(&self, method: &'static str, op: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, Error> {
        let value = self.get();
        let Value::Array(array) = value else {
            return Err(Error::NotAnArray { method, actual: value.type_of() });
        };
        let before = array.snapshot();
        let result = array.with_mut(op);
        let after = array.snapshot();

        // changed = differing shared indices, plus everything past the
        // shorter length when the lengths differ
        let shorter = before.len().min(after.len());
        let longer = before.len().max(after.len());
        let mut changed: Vec<usize> = (0..shorter).filter(|&index| before[index] != after[index]).collect();
        changed.extend(shorter..longer);

        // resolve every changed index first, seeding each cache with the
        // pre-mutation value: a node created only now would otherwise cache
        // the post-mutation value and suppress its own notification
        let children: Vec<_> = changed
            .iter()
            .map(|&index| {
                let child = self.graph.resolve(self.id, Key::Index(index));
                self.graph.seed_cache(child, before.get(index).cloned().unwrap_or_default());
                child
            })
            .collect();
        if let Some((&last, rest)) = children.split_last() {
            for &child in rest {
                self.graph.propagate_local(child);
            }
            self.graph.propagate(last, false);
        }
        Ok(result)
    }
}
