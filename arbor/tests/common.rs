use std::sync::{Arc, Mutex};

use arbor::Value;

/// Accumulates what listeners saw; `check` drains and returns it.
#[allow(unused)]
pub fn change_watcher() -> (Arc<dyn Fn(String) + Send + Sync>, Box<dyn Fn() -> Vec<String>>) {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let watcher = {
        let changes = changes.clone();
        Arc::new(move |entry: String| {
            changes.lock().unwrap().push(entry);
        })
    };

    let check = Box::new(move || {
        let changes: Vec<String> = changes.lock().unwrap().drain(..).collect();
        changes
    });

    (watcher, check)
}

#[allow(unused)]
pub fn json(json: serde_json::Value) -> Value { json.into() }

#[allow(unused)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
