//! Event kinds, handlers, and shared counters
//!
//! An [`Event`] is an open integer tag: the reserved core set covers the
//! outcomes the runner and adapters emit, and hosts may define further
//! kinds above [`Event::RESERVED`]. Handler tables and counter arrays are
//! indexed by the tag; an index past the end of either is silently not
//! dispatched or counted.

use crate::diagnostic::KeyString;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Open event tag with a reserved core subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event(pub u32);

impl Event {
    /// An assertion did not hold
    pub const FAILURE: Event = Event(0);
    /// An assertion held
    pub const SUCCESS: Event = Event(1);
    /// A test body raised an error
    pub const EXCEPTION: Event = Event(2);
    /// A timing measurement
    pub const TIMING: Event = Event(3);
    /// A test was intentionally not run
    pub const SKIPPED: Event = Event(4);
    /// An error propagated out of a scope
    pub const TRACEBACK: Event = Event(5);

    /// Number of reserved tags; host extensions start here
    pub const RESERVED: u32 = 6;

    /// Index into handler tables and counter arrays
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Event {
    fn from(tag: u32) -> Self {
        Event(tag)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Event::FAILURE => f.write_str("Failure"),
            Event::SUCCESS => f.write_str("Success"),
            Event::EXCEPTION => f.write_str("Exception"),
            Event::TIMING => f.write_str("Timing"),
            Event::SKIPPED => f.write_str("Skipped"),
            Event::TRACEBACK => f.write_str("Traceback"),
            Event(tag) => write!(f, "{}", tag),
        }
    }
}

/// Caller-supplied capability invoked once per emitted event of one kind
///
/// Receives the event, the scope path active at emission, and the
/// rendered log. Returns whether the event was consumed.
pub type Handler = Arc<dyn Fn(Event, &[String], &[KeyString]) -> bool + Send + Sync>;

/// Table of optional handlers indexed by event tag
pub type HandlerTable = Arc<[Option<Handler>]>;

/// Build a handler table from per-event slots
pub fn handler_table<I>(slots: I) -> HandlerTable
where
    I: IntoIterator<Item = Option<Handler>>,
{
    slots.into_iter().collect()
}

/// Shared per-event counters, incremented on every emit
///
/// Counters are diagnostic, not synchronizing; all access is relaxed.
#[derive(Debug)]
pub struct EventCounters {
    counts: Box<[AtomicU64]>,
}

impl EventCounters {
    /// Counters for the reserved core events
    pub fn new() -> Self {
        EventCounters::with_len(Event::RESERVED as usize)
    }

    /// Counters covering `len` event tags
    pub fn with_len(len: usize) -> Self {
        let counts = (0..len).map(|_| AtomicU64::new(0)).collect();
        EventCounters { counts }
    }

    /// Number of tags covered
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no tags are covered
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Zero every counter
    pub fn reset(&self) {
        for count in self.counts.iter() {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// Increment the counter for `event` if it is covered
    pub fn increment(&self, event: Event) {
        if let Some(count) = self.counts.get(event.index()) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read the counter for `event`, `None` if not covered
    pub fn get(&self, event: Event) -> Option<u64> {
        self.counts
            .get(event.index())
            .map(|count| count.load(Ordering::Relaxed))
    }

    /// Copy out every counter in tag order
    pub fn snapshot(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect()
    }
}

impl Default for EventCounters {
    fn default() -> Self {
        EventCounters::new()
    }
}
