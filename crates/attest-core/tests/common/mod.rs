//! Shared helpers for the integration suites
//!
//! Each integration binary includes this module and uses a subset of it.
#![allow(dead_code)]

use attest_core::{handler_table, Event, Handler, HandlerTable, KeyString};
use std::sync::{Arc, Mutex};

/// Everything the recording handlers saw, in dispatch order
pub type Emitted = Arc<Mutex<Vec<(Event, Vec<String>, Vec<KeyString>)>>>;

/// A handler table covering every reserved event, recording into `events`
pub fn recording(events: &Emitted) -> HandlerTable {
    let shared = Arc::clone(events);
    let handler: Handler = Arc::new(move |event, scopes, logs| {
        shared
            .lock()
            .unwrap()
            .push((event, scopes.to_vec(), logs.to_vec()));
        true
    });
    handler_table(vec![Some(handler); Event::RESERVED as usize])
}

/// A handler table with no slots at all
pub fn empty_handlers() -> HandlerTable {
    handler_table(Vec::new())
}

/// First value logged under `key`, if any
pub fn logged(logs: &[KeyString], key: &str) -> Option<String> {
    logs.iter()
        .find(|entry| entry.key.as_deref() == Some(key))
        .map(|entry| entry.value.clone())
}

/// Render a log the way a plain console reporter would
pub fn render_log(logs: &[KeyString]) -> String {
    logs.iter()
        .map(|entry| match &entry.key {
            Some(key) => format!("{}: {}", key, entry.value),
            None => entry.value.clone(),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
