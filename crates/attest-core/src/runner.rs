//! Single-invocation driver
//!
//! [`run`] executes one test case with a fresh context: counters reset,
//! scope set to the case name, elapsed wall-clock measured around the
//! invocation. Per-test errors are contained here; by the time the
//! adapter has propagated one, its events have already fired, so the
//! caller gets an empty result rather than an error. Client errors are
//! the exception and abort the whole run.

use crate::case::TestCase;
use crate::context::Context;
use crate::error::TestError;
use crate::event::{EventCounters, HandlerTable};
use crate::value::{ArgList, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Run one case to completion
///
/// Returns the result value and elapsed seconds. Skips, arity mismatches,
/// and raised errors have already been emitted as events and yield an
/// empty value; `Client` errors propagate.
pub fn run(
    case: &TestCase,
    args: ArgList,
    handlers: HandlerTable,
    counters: Option<Arc<EventCounters>>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<(Value, f64), TestError> {
    if let Some(counters) = &counters {
        counters.reset();
    }
    let mut ctx = Context::new(case.name.as_str()).with_handlers(handlers);
    if let Some(counters) = counters {
        ctx = ctx.with_counters(counters);
    }
    if let Some(cancel) = cancel {
        ctx = ctx.with_cancel(cancel);
    }

    let start = Instant::now();
    let outcome = case.call(&mut ctx, args);
    let elapsed = start.elapsed().as_secs_f64();

    match outcome {
        Ok(value) => Ok((value, elapsed)),
        Err(err @ TestError::Client { .. }) => Err(err),
        Err(_) => Ok((Value::Empty, elapsed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::KeyString;
    use crate::error::ErrorKind;
    use crate::event::{handler_table, Event, Handler};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    type Emitted = Arc<Mutex<Vec<(Event, Vec<String>, Vec<KeyString>)>>>;

    fn recording(events: &Emitted) -> HandlerTable {
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

    fn empty_handlers() -> HandlerTable {
        handler_table(Vec::new())
    }

    #[test]
    fn success_returns_value_and_elapsed() {
        let case = TestCase::new("add-two", |_ctx: &mut Context, a: i64, b: i64| a + b);
        let (value, elapsed) = run(
            &case,
            vec![Value::from(2i64), Value::from(3i64)],
            empty_handlers(),
            None,
            None,
        )
        .unwrap();
        assert_eq!(value.view_as::<i64>().unwrap(), 5);
        assert!(elapsed >= 0.0);
    }

    #[test]
    fn counters_reset_before_each_run() {
        let counters = Arc::new(EventCounters::new());
        counters.increment(Event::FAILURE);
        let case = TestCase::new("quiet", |_ctx: &mut Context| ());
        run(
            &case,
            Vec::new(),
            empty_handlers(),
            Some(Arc::clone(&counters)),
            None,
        )
        .unwrap();
        assert_eq!(counters.get(Event::FAILURE), Some(0));
    }

    #[test]
    fn skips_yield_empty_results_not_errors() {
        let counters = Arc::new(EventCounters::new());
        let case = TestCase::new("later", |_ctx: &mut Context| -> Result<i64, TestError> {
            Err(TestError::skip("reason"))
        });
        let (value, _) = run(
            &case,
            Vec::new(),
            empty_handlers(),
            Some(Arc::clone(&counters)),
            None,
        )
        .unwrap();
        assert!(!value.has_value());
        assert_eq!(counters.get(Event::SKIPPED), Some(1));
        assert_eq!(counters.get(Event::EXCEPTION), Some(0));
    }

    #[test]
    fn raised_errors_are_contained_after_their_events() {
        let counters = Arc::new(EventCounters::new());
        let case = TestCase::new("boom", |_ctx: &mut Context| -> Result<(), TestError> {
            Err(TestError::raised("exploded"))
        });
        let (value, _) = run(
            &case,
            Vec::new(),
            empty_handlers(),
            Some(Arc::clone(&counters)),
            None,
        )
        .unwrap();
        assert!(!value.has_value());
        assert_eq!(counters.get(Event::EXCEPTION), Some(1));
        assert_eq!(counters.get(Event::TRACEBACK), Some(1));
    }

    #[test]
    fn client_errors_abort_the_run() {
        let case = TestCase::new("broken", |_ctx: &mut Context| -> Result<(), TestError> {
            Err(TestError::client("bad wiring"))
        });
        let err = run(&case, Vec::new(), empty_handlers(), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
    }

    #[test]
    fn handlers_see_the_case_name_as_scope() {
        let events: Emitted = Arc::new(Mutex::new(Vec::new()));
        let case = TestCase::new("scoped", |ctx: &mut Context| {
            ctx.require(true);
        });
        run(&case, Vec::new(), recording(&events), None, None).unwrap();
        let emitted = events.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, Event::SUCCESS);
        assert_eq!(emitted[0].1, vec!["scoped".to_string()]);
    }

    #[test]
    fn cancellation_flag_reaches_the_body() {
        let cancel = Arc::new(AtomicBool::new(false));
        cancel.store(true, Ordering::SeqCst);
        let case = TestCase::new("poll", |ctx: &mut Context| ctx.cancelled());
        let (value, _) = run(&case, Vec::new(), empty_handlers(), None, Some(cancel)).unwrap();
        assert!(value.view_as::<bool>().unwrap());
    }
}
