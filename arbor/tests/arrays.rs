mod common;

use arbor::{wrap, Error, EventKind, Value};
use common::{change_watcher, json};
use serde_json::json;

#[test]
fn push_bubbles_exactly_once() {
    let state = wrap(json(json!({"list": [1, 2]})));

    let (watcher, check) = change_watcher();
    let _root = {
        let watcher = watcher.clone();
        state.listen(EventKind::Change, move |event| watcher(format!("root: {}", event.value)))
    };
    let _index = {
        let watcher = watcher.clone();
        state.at("list.2").listen(EventKind::Change, move |event| watcher(format!("index: {}", event.value)))
    };

    let length = state.child("list").push(3).unwrap();
    assert_eq!(length, 3);
    assert_eq!(check(), ["index: 3", "root: 3"]);
}

#[test]
fn mutations_notify_without_prior_index_resolution() {
    // nothing below the root is resolved before the mutations run
    let state = wrap(json(json!({"list": [1, 2]})));

    let (watcher, check) = change_watcher();
    let _root = {
        let watcher = watcher.clone();
        state.listen(EventKind::Change, move |event| {
            watcher(format!("root: {} (was {})", event.value, event.old_value))
        })
    };

    state.child("list").push(3).unwrap();
    assert_eq!(check(), ["root: 3 (was undefined)"]);

    state.child("list").shift().unwrap();
    // [1,2,3] -> [2,3]: the last changed index is 2, which fell off the end
    assert_eq!(check(), ["root: undefined (was 3)"]);
}

#[test]
fn multi_element_moves_bubble_once_per_mutation() {
    let state = wrap(json(json!([1, 2, 3])));

    let (watcher, check) = change_watcher();
    let guards: Vec<_> = (0..3usize)
        .map(|index| {
            let watcher = watcher.clone();
            state.child(index).listen(EventKind::Change, move |event| watcher(format!("{index}: {}", event.value)))
        })
        .collect();
    let _root = {
        let watcher = watcher.clone();
        state.listen(EventKind::Change, move |event| watcher(format!("root: {}", event.value)))
    };

    state.reverse().unwrap();
    // the middle element stayed put and stays silent; only the last changed
    // index bubbles, so the root hears the whole reversal as one change
    assert_eq!(check(), ["0: 3", "2: 1", "root: 1"]);
    drop(guards);
}

#[test]
fn unchanged_mutations_emit_nothing() {
    let palindrome = wrap(json(json!([1, 2, 1])));
    let sorted = wrap(json(json!([1, 2, 3])));
    let empty = wrap(json(json!([])));

    let (watcher, check) = change_watcher();
    let guards: Vec<_> = [&palindrome, &sorted, &empty]
        .into_iter()
        .map(|node| {
            let watcher = watcher.clone();
            node.listen(EventKind::Change, move |event| watcher(format!("{}", event.value)))
        })
        .collect();

    palindrome.reverse().unwrap();
    sorted.sort().unwrap();
    assert_eq!(empty.pop().unwrap(), Value::Undefined);
    assert_eq!(empty.shift().unwrap(), Value::Undefined);

    assert_eq!(check(), Vec::<String>::new());
    drop(guards);
}

#[test]
fn splice_reports_indices_past_the_removed_range() {
    let state = wrap(json(json!(["a", "b", "c", "d"])));

    let (watcher, check) = change_watcher();
    let guards: Vec<_> = (0..4usize)
        .map(|index| {
            let watcher = watcher.clone();
            state.child(index).listen(EventKind::Change, move |event| watcher(format!("{index}: {}", event.value)))
        })
        .collect();

    let removed = state.splice(1, 2, ["x"]).unwrap();
    assert_eq!(removed, [Value::from("b"), Value::from("c")]);
    // ["a","b","c","d"] -> ["a","x","d"]: index 1 changed in place, index 2
    // shifted, index 3 fell off the end
    assert_eq!(check(), ["1: x", "2: d", "3: undefined"]);
    drop(guards);
}

#[test]
fn shift_and_unshift_return_values() {
    let state = wrap(json(json!([10, 20])));
    assert_eq!(state.shift().unwrap(), 10);
    assert_eq!(state.unshift(5).unwrap(), 2);
    assert_eq!(state.values(), [Value::from(5), Value::from(20)]);
}

#[test]
fn sort_uses_string_coercion_order() {
    let state = wrap(json(json!([10, 9, 100])));
    state.sort().unwrap();
    assert_eq!(state.values(), [Value::from(10), Value::from(100), Value::from(9)]);

    state.sort_by(|a, b| a.as_number().total_cmp(&b.as_number())).unwrap();
    assert_eq!(state.values(), [Value::from(9), Value::from(10), Value::from(100)]);
}

#[test]
fn array_methods_reject_non_arrays() {
    let state = wrap(json(json!({"name": "ada"})));
    match state.push(1) {
        Err(Error::NotAnArray { method, .. }) => assert_eq!(method, "push"),
        other => panic!("expected NotAnArray, got {other:?}"),
    }
    assert!(state.child("name").reverse().is_err());
}

#[test]
fn mutations_through_nested_paths() {
    let state = wrap(json(json!({"queue": {"items": ["a"]}})));

    let (watcher, check) = change_watcher();
    let _root = {
        let watcher = watcher.clone();
        state.listen(EventKind::Change, move |event| watcher(format!("{:?}", event.key)))
    };

    state.at("queue.items").push("b").unwrap();
    // the event detail names the mutated index, not the hop it reached
    assert_eq!(check(), ["Some(Index(1))"]);
}
