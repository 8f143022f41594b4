//! runner_tests.rs — full invocations through the runner: containment,
//! skip reporting, timing events, and pipelines between registered cases

mod common;

use attest_core::{
    run, Context, ErrorKind, Event, EventCounters, Suite, TestCase, TestError, Value,
};
use common::{empty_handlers, logged, recording, Emitted};
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

fn observed() -> (Emitted, Arc<EventCounters>) {
    let events: Emitted = Arc::new(Mutex::new(Vec::new()));
    (events, Arc::new(EventCounters::new()))
}

#[test]
fn add_two_returns_its_sum() {
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
fn skip_reports_its_reason_without_an_exception() {
    let case = TestCase::new("later", |_ctx: &mut Context| -> Result<(), TestError> {
        Err(TestError::skip("reason"))
    });
    let (events, counters) = observed();
    let (value, _) = run(
        &case,
        Vec::new(),
        recording(&events),
        Some(Arc::clone(&counters)),
        None,
    )
    .unwrap();
    assert!(!value.has_value());
    assert_eq!(counters.get(Event::SKIPPED), Some(1));
    assert_eq!(counters.get(Event::EXCEPTION), Some(0));
    let emitted = events.lock().unwrap();
    assert_eq!(emitted[0].0, Event::SKIPPED);
    assert_eq!(logged(&emitted[0].2, "__comment").as_deref(), Some("reason"));
}

#[test]
fn arity_mismatch_is_skipped_with_both_counts_in_the_reason() {
    let case = TestCase::new("pair", |_ctx: &mut Context, _a: i64, _b: i64| ());
    let (events, counters) = observed();
    let (value, _) = run(
        &case,
        vec![Value::from(1i64)],
        recording(&events),
        Some(Arc::clone(&counters)),
        None,
    )
    .unwrap();
    assert!(!value.has_value());
    assert_eq!(counters.get(Event::SKIPPED), Some(1));
    let emitted = events.lock().unwrap();
    assert_eq!(
        logged(&emitted[0].2, "__comment").as_deref(),
        Some("wrong number of arguments (expected 2, got 1)")
    );
}

#[test]
fn raised_errors_leave_their_events_behind() {
    let case = TestCase::new("boom", |_ctx: &mut Context| -> Result<i64, TestError> {
        Err(TestError::raised("exploded"))
    });
    let (events, counters) = observed();
    let (value, elapsed) = run(
        &case,
        Vec::new(),
        recording(&events),
        Some(Arc::clone(&counters)),
        None,
    )
    .unwrap();
    assert!(!value.has_value());
    assert!(elapsed >= 0.0);
    let emitted = events.lock().unwrap();
    assert_eq!(emitted[0].0, Event::EXCEPTION);
    assert_eq!(
        logged(&emitted[0].2, "__comment").as_deref(),
        Some("exploded")
    );
    assert_eq!(emitted[1].0, Event::TRACEBACK);
}

#[test]
fn client_errors_are_never_contained() {
    let case = TestCase::new("broken", |_ctx: &mut Context| -> Result<(), TestError> {
        Err(TestError::client("bad wiring"))
    });
    let err = run(&case, Vec::new(), empty_handlers(), None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
}

#[test]
fn stale_counters_reset_at_the_start_of_each_run() {
    let counters = Arc::new(EventCounters::new());
    counters.increment(Event::FAILURE);
    counters.increment(Event::SUCCESS);
    let case = TestCase::new("single", |ctx: &mut Context| {
        ctx.require(true);
    });
    run(
        &case,
        Vec::new(),
        empty_handlers(),
        Some(Arc::clone(&counters)),
        None,
    )
    .unwrap();
    assert_eq!(counters.snapshot(), vec![0, 1, 0, 0, 0, 0]);
}

#[test]
fn timing_events_flow_through_a_run() {
    let case = TestCase::new("measured", |ctx: &mut Context| {
        let doubled = ctx.timed(|| 21i64 * 2);
        ctx.timing(5, || {});
        doubled
    });
    let (events, counters) = observed();
    let (value, _) = run(
        &case,
        Vec::new(),
        recording(&events),
        Some(Arc::clone(&counters)),
        None,
    )
    .unwrap();
    assert_eq!(value.view_as::<i64>().unwrap(), 42);
    assert_eq!(counters.get(Event::TIMING), Some(2));
    let emitted = events.lock().unwrap();
    assert_eq!(logged(&emitted[0].2, "value").as_deref(), Some("42"));
    assert_eq!(logged(&emitted[1].2, "repeats").as_deref(), Some("5"));
}

#[test]
fn sections_inside_a_run_report_under_their_scope() {
    let case = TestCase::new("phased", |ctx: &mut Context| -> Result<(), TestError> {
        ctx.section("setup", |s| {
            s.require(true);
            Ok(())
        })?;
        ctx.section("verify", |s| {
            s.require(false);
            Ok(())
        })
    });
    let (events, counters) = observed();
    run(
        &case,
        Vec::new(),
        recording(&events),
        Some(Arc::clone(&counters)),
        None,
    )
    .unwrap();
    assert_eq!(counters.get(Event::SUCCESS), Some(1));
    assert_eq!(counters.get(Event::FAILURE), Some(1));
    let emitted = events.lock().unwrap();
    assert_eq!(emitted[0].1, ["phased", "setup"]);
    assert_eq!(emitted[1].1, ["phased", "verify"]);
}

#[test]
fn pipelines_call_registered_cases_from_inside_a_run() {
    let suite = Arc::new(Suite::new());
    suite.add(TestCase::new(
        "add-two",
        |_ctx: &mut Context, a: i64, b: i64| a + b,
    ));
    let upstream = Arc::clone(&suite);
    suite.add(TestCase::new(
        "pipeline",
        move |ctx: &mut Context| -> Result<i64, TestError> {
            let sum = upstream
                .call(
                    "add-two",
                    ctx,
                    vec![Value::from(2i64), Value::from(3i64)],
                )?
                .view_as::<i64>()?;
            Ok(sum * 10)
        },
    ));
    let case = suite.get(1).unwrap();
    let (value, _) = run(&case, Vec::new(), empty_handlers(), None, None).unwrap();
    assert_eq!(value.view_as::<i64>().unwrap(), 50);
}

#[test]
fn cancellation_is_advisory_and_observable() {
    let cancel = Arc::new(AtomicBool::new(false));
    let case = TestCase::new("loop", |ctx: &mut Context| {
        let mut iterations = 0i64;
        while !ctx.cancelled() && iterations < 3 {
            iterations += 1;
        }
        iterations
    });
    // Flag already raised: the body observes it on the first check.
    cancel.store(true, std::sync::atomic::Ordering::SeqCst);
    let (value, _) = run(
        &case,
        Vec::new(),
        empty_handlers(),
        None,
        Some(Arc::clone(&cancel)),
    )
    .unwrap();
    assert_eq!(value.view_as::<i64>().unwrap(), 0);
}
