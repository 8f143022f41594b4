//! concurrency_tests.rs — the suite's reader/writer contract under real
//! threads: concurrent registration, stable enumeration, parallel runs

mod common;

use attest_core::{run, Context, EventCounters, Suite, TestCase, Value};
use common::empty_handlers;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const WRITERS: usize = 8;
const PER_WRITER: usize = 25;

#[test]
fn concurrent_adds_all_land_exactly_once() {
    let suite = Arc::new(Suite::new());
    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let suite = Arc::clone(&suite);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    suite.add_value(format!("case-{w}-{i}"), (w * PER_WRITER + i) as i64, "");
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(suite.count(), WRITERS * PER_WRITER);
    let names: HashSet<String> = suite.names().into_iter().collect();
    assert_eq!(names.len(), WRITERS * PER_WRITER);
    for w in 0..WRITERS {
        for i in 0..PER_WRITER {
            assert!(names.contains(&format!("case-{w}-{i}")));
        }
    }
}

#[test]
fn readers_observe_consistent_prefixes_while_a_writer_appends() {
    let suite = Arc::new(Suite::new());
    let writer = {
        let suite = Arc::clone(&suite);
        thread::spawn(move || {
            for i in 0..200usize {
                suite.add_value(format!("entry-{i:03}"), i as i64, "");
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let suite = Arc::clone(&suite);
            thread::spawn(move || {
                for _ in 0..50 {
                    // Appends never reorder, so every snapshot must be a
                    // prefix of the final insertion order.
                    let names = suite.names();
                    for (i, name) in names.iter().enumerate() {
                        assert_eq!(name, &format!("entry-{i:03}"));
                    }
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(suite.count(), 200);
}

#[test]
fn concurrent_set_value_leaves_one_entry() {
    let suite = Arc::new(Suite::new());
    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let suite = Arc::clone(&suite);
            thread::spawn(move || {
                for _ in 0..PER_WRITER {
                    suite.set_value("contested", w as i64, "");
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    assert_eq!(suite.count(), 1);
    let value = suite.get_value("contested", false).unwrap();
    assert!((0..WRITERS as i64).contains(&value.view_as::<i64>().unwrap()));
}

#[test]
fn distinct_invocations_run_in_parallel_against_one_suite() {
    let suite = Arc::new(Suite::new());
    suite.add(TestCase::new(
        "square",
        |ctx: &mut Context, n: i64| {
            ctx.require(n >= 0);
            n * n
        },
    ));
    let case = Arc::new(suite.get(0).unwrap());

    let runs: Vec<_> = (0..WRITERS as i64)
        .map(|n| {
            let case = Arc::clone(&case);
            thread::spawn(move || {
                // Each invocation owns its context and counters; only the
                // suite itself is shared.
                let counters = Arc::new(EventCounters::new());
                let (value, _) = run(
                    &case,
                    vec![Value::from(n)],
                    empty_handlers(),
                    Some(Arc::clone(&counters)),
                    None,
                )
                .unwrap();
                (value.view_as::<i64>().unwrap(), counters.snapshot())
            })
        })
        .collect();

    for (n, handle) in runs.into_iter().enumerate() {
        let (squared, counts) = handle.join().unwrap();
        assert_eq!(squared, (n * n) as i64);
        assert_eq!(counts, vec![0, 1, 0, 0, 0, 0]);
    }
}

#[test]
fn lookups_proceed_while_bodies_run() {
    let suite = Arc::new(Suite::new());
    let registrar = Arc::clone(&suite);
    suite.add(TestCase::new("self-modifying", move |_ctx: &mut Context| {
        // Registration from inside a body must not deadlock: the suite
        // lock is released before invocation.
        registrar.add_value("registered-from-inside", 1i64, "");
        registrar.find("self-modifying").is_some()
    }));
    let case = suite.get(0).unwrap();
    let (value, _) = run(&case, Vec::new(), empty_handlers(), None, None).unwrap();
    assert!(value.view_as::<bool>().unwrap());
    assert!(suite.find("registered-from-inside").is_some());
}
