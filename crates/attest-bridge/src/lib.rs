//! Embedding-host facade over the attest test registry
//!
//! A [`Bridge`] wraps a [`Suite`] with the narrow surface an embedding
//! runtime drives: enumerate cases, inspect one by index, and run one
//! invocation with caller-supplied handlers, returning the result value,
//! elapsed time, per-event counts, and any captured output in a single
//! serializable [`RunReport`].
//!
//! # Examples
//!
//! ```
//! use attest_bridge::{Bridge, RunOptions};
//! use attest_core::{Context, TestCase};
//!
//! let bridge = Bridge::new();
//! bridge.add_test(TestCase::new("double", |_ctx: &mut Context, n: i64| n * 2));
//!
//! let options = RunOptions::new().with_pack(vec![21i64.into()]);
//! let report = bridge.run_test(0, options).unwrap();
//! assert_eq!(report.value.view_as::<i64>().unwrap(), 42);
//! ```

use attest_core::{
    run, ArgList, Capture, Event, EventCounters, HandlerTable, Suite, TestCase, TestError, Value,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the host sees of one registered case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestInfo {
    pub name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub comment: String,
    /// Number of pre-bound parameter lists selectable by index
    pub parameter_count: usize,
}

impl TestInfo {
    fn of(case: &TestCase) -> Self {
        TestInfo {
            name: case.name.clone(),
            file: case.location.as_ref().map(|loc| loc.file.clone()),
            line: case.location.as_ref().map(|loc| loc.line),
            comment: case.comment.clone(),
            parameter_count: case.parameters.len(),
        }
    }
}

/// Where one invocation's arguments come from
#[derive(Debug, Clone)]
pub enum ArgSource {
    /// An explicit argument pack
    Pack(ArgList),
    /// One of the case's pre-bound parameter lists, by index
    Parameter(usize),
}

impl Default for ArgSource {
    fn default() -> Self {
        ArgSource::Pack(ArgList::new())
    }
}

/// Per-invocation options supplied by the host
#[derive(Clone, Default)]
pub struct RunOptions {
    pub args: ArgSource,
    /// One optional handler per event tag
    pub handlers: HandlerTable,
    pub capture_out: bool,
    pub capture_err: bool,
    /// Skip the bridge's exclusivity lock for this run
    pub release_lock: bool,
}

impl RunOptions {
    /// Options with no arguments, no handlers, and no capture
    pub fn new() -> Self {
        RunOptions::default()
    }

    /// Pass an explicit argument pack
    pub fn with_pack(mut self, args: ArgList) -> Self {
        self.args = ArgSource::Pack(args);
        self
    }

    /// Select a pre-bound parameter list by index
    pub fn with_parameter(mut self, index: usize) -> Self {
        self.args = ArgSource::Parameter(index);
        self
    }

    /// Attach the host's handler table
    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    /// Capture test output into the report
    pub fn capture_out(mut self) -> Self {
        self.capture_out = true;
        self
    }

    /// Capture test error text into the report
    pub fn capture_err(mut self) -> Self {
        self.capture_err = true;
        self
    }

    /// Run without holding the bridge's exclusivity lock
    ///
    /// Lets a reentrant host start another bridged run from inside a
    /// handler or test body without deadlocking on the bridge itself.
    pub fn release_lock(mut self) -> Self {
        self.release_lock = true;
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("args", &self.args)
            .field("handlers", &self.handlers.len())
            .field("capture_out", &self.capture_out)
            .field("capture_err", &self.capture_err)
            .field("release_lock", &self.release_lock)
            .finish()
    }
}

/// Everything one invocation produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// The result value, empty after a contained failure or skip
    pub value: Value,
    pub elapsed_seconds: f64,
    /// Final counter per event tag, in tag order
    pub counts: Vec<u64>,
    /// Captured test output, empty unless requested
    pub out: String,
    /// Captured test error text, empty unless requested
    pub err: String,
}

/// Crate identity and versions, for host-side version checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub core_version: &'static str,
}

/// Name and version metadata of this bridge and its core
pub fn build_info() -> BuildInfo {
    BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: VERSION,
        core_version: attest_core::VERSION,
    }
}

/// Host-facing handle on one test catalogue
///
/// Runs hold an internal exclusivity lock so only one bridged invocation
/// executes at a time unless the host opts out per run; the shared
/// cancellation flag is advisory and reaches every running context.
pub struct Bridge {
    suite: Arc<Suite>,
    run_lock: Mutex<()>,
    cancel: Arc<AtomicBool>,
}

impl Bridge {
    /// A bridge over a fresh, empty suite
    pub fn new() -> Self {
        Bridge::with_suite(Arc::new(Suite::new()))
    }

    /// A bridge over an existing suite
    pub fn with_suite(suite: Arc<Suite>) -> Self {
        Bridge {
            suite,
            run_lock: Mutex::new(()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The wrapped suite, for direct registration
    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    /// Number of registered cases
    pub fn test_count(&self) -> usize {
        self.suite.count()
    }

    /// Every case name, in registration order
    pub fn test_names(&self) -> Vec<String> {
        self.suite.names()
    }

    /// Index of the first case with this name
    pub fn find_test(&self, name: &str) -> Option<usize> {
        self.suite.find(name)
    }

    /// Metadata of the case at `index`
    pub fn test_info(&self, index: usize) -> Result<TestInfo, TestError> {
        Ok(TestInfo::of(&self.suite.get(index)?))
    }

    /// Number of pre-bound parameter lists of the case at `index`
    pub fn parameter_count(&self, index: usize) -> Result<usize, TestError> {
        Ok(self.suite.get(index)?.parameters.len())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run the case at `index` once
    ///
    /// Counters cover at least the reserved events, growing to the
    /// handler table's length when the host registered more slots.
    /// `Client` errors propagate; every other failure has already been
    /// emitted as events and yields a report with an empty value.
    pub fn run_test(&self, index: usize, options: RunOptions) -> Result<RunReport, TestError> {
        let case = self.suite.get(index)?;
        let args = match options.args {
            ArgSource::Pack(args) => args,
            ArgSource::Parameter(selected) => {
                case.parameters
                    .get(selected)
                    .cloned()
                    .ok_or(TestError::IndexOutOfRange {
                        index: selected,
                        count: case.parameters.len(),
                    })?
            }
        };

        let slots = options.handlers.len().max(Event::RESERVED as usize);
        let counters = Arc::new(EventCounters::with_len(slots));
        let out = options.capture_out.then(Capture::out);
        let err = options.capture_err.then(Capture::err);
        let guard = if options.release_lock {
            None
        } else {
            Some(self.run_lock.lock().expect("bridge run lock poisoned"))
        };

        let (value, elapsed_seconds) = run(
            &case,
            args,
            options.handlers,
            Some(Arc::clone(&counters)),
            Some(Arc::clone(&self.cancel)),
        )?;
        drop(guard);

        Ok(RunReport {
            value,
            elapsed_seconds,
            counts: counters.snapshot(),
            out: out.map(Capture::finish).unwrap_or_default(),
            err: err.map(Capture::finish).unwrap_or_default(),
        })
    }

    // ------------------------------------------------------------------
    // Registration pass-throughs
    // ------------------------------------------------------------------

    /// Register a case, returning its index
    pub fn add_test(&self, case: TestCase) -> usize {
        self.suite.add(case)
    }

    /// Append a constant-value entry
    pub fn add_value(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) -> usize {
        self.suite.add_value(name, value, comment)
    }

    /// Replace every same-named entry with one constant-value entry
    pub fn set_value(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) -> bool {
        self.suite.set_value(name, value, comment)
    }

    /// Value of the first entry with this name
    pub fn get_value(&self, name: &str, allow_missing: bool) -> Result<Value, TestError> {
        self.suite.get_value(name, allow_missing)
    }

    /// Empty the catalogue, e.g. between host sessions
    pub fn clear(&self) {
        self.suite.clear();
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Request cooperative cancellation of running tests
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Withdraw a cancellation request before further runs
    pub fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Bridge::new()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("tests", &self.test_count())
            .field("cancelled", &self.cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::Context;

    #[test]
    fn build_info_names_both_crates() {
        let info = build_info();
        assert_eq!(info.name, "attest-bridge");
        assert_eq!(info.version, VERSION);
        assert_eq!(info.core_version, attest_core::VERSION);
    }

    #[test]
    fn options_builder_sets_every_flag() {
        let options = RunOptions::new()
            .with_parameter(3)
            .capture_out()
            .capture_err()
            .release_lock();
        assert!(matches!(options.args, ArgSource::Parameter(3)));
        assert!(options.capture_out);
        assert!(options.capture_err);
        assert!(options.release_lock);
    }

    #[test]
    fn default_options_run_with_an_empty_pack() {
        let bridge = Bridge::new();
        bridge.add_test(TestCase::new("plain", |_ctx: &mut Context| 1i64));
        let report = bridge.run_test(0, RunOptions::new()).unwrap();
        assert_eq!(report.value.view_as::<i64>().unwrap(), 1);
    }

    #[test]
    fn cancellation_toggles() {
        let bridge = Bridge::new();
        assert!(!bridge.cancelled());
        bridge.cancel();
        assert!(bridge.cancelled());
        bridge.clear_cancel();
        assert!(!bridge.cancelled());
    }
}
