//! Per-invocation execution context
//!
//! A [`Context`] owns the pending log buffer, the scope-name stack, a
//! start instant, and handles to the caller's handler table, counter
//! array, and cancellation flag. Every assertion, timing, and skip
//! operation funnels into [`Context::handle`]: pending logs plus the
//! call's structural fields render to strings, the handler for the event
//! (if any) fires, the event's counter advances, and the buffer truncates
//! back to its reserved prefix.
//!
//! A context is exclusively owned by the thread running its test; only
//! the counter array and cancellation flag are shared.

use crate::approx::{self, Approx, Near};
use crate::diagnostic::{comparison, KeyString, KeyValue, Op, KEY_COMMENT, KEY_FILE, KEY_LINE};
use crate::error::{ErrorKind, TestError};
use crate::event::{Event, EventCounters, HandlerTable};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Execution context for one test invocation or section
#[derive(Clone)]
pub struct Context {
    handlers: HandlerTable,
    scopes: Vec<String>,
    start_time: Instant,
    counters: Option<Arc<EventCounters>>,
    cancel: Option<Arc<AtomicBool>>,
    logs: Vec<KeyValue>,
    reserved_logs: usize,
}

impl Context {
    /// Bare context with one scope name and no handlers or counters
    pub fn new(scope: impl Into<String>) -> Self {
        Context {
            handlers: Arc::from(Vec::new()),
            scopes: vec![scope.into()],
            start_time: Instant::now(),
            counters: None,
            cancel: None,
            logs: Vec::new(),
            reserved_logs: 0,
        }
    }

    /// Attach the caller's handler table
    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    /// Attach a shared counter array
    pub fn with_counters(mut self, counters: Arc<EventCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Attach a shared cancellation flag
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Scope names from the test case down to the innermost section
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Seconds since this context (or section) started
    pub fn elapsed(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Read the shared counter for `event`, `None` without counters
    pub fn count(&self, event: Event) -> Option<u64> {
        self.counters.as_ref().and_then(|c| c.get(event))
    }

    /// Whether cooperative cancellation has been requested
    pub fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    // ------------------------------------------------------------------
    // Logging
    // ------------------------------------------------------------------

    /// Append a positional entry to the pending log
    pub fn info(&mut self, value: impl Into<Value>) -> &mut Self {
        self.logs.push(KeyValue::positional(value));
        self
    }

    /// Append a labeled entry to the pending log
    pub fn info_kv(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.logs.push(KeyValue::keyed(key, value));
        self
    }

    /// Append several entries to the pending log
    pub fn log(&mut self, entries: impl IntoIterator<Item = KeyValue>) -> &mut Self {
        self.logs.extend(entries);
        self
    }

    /// Append entries into the sticky prefix that survives emits
    pub fn capture(&mut self, entries: impl IntoIterator<Item = KeyValue>) -> &mut Self {
        let at = self.reserved_logs;
        let entries: Vec<KeyValue> = entries.into_iter().collect();
        self.reserved_logs += entries.len();
        self.logs.splice(at..at, entries);
        self
    }

    /// Capture one labeled entry
    pub fn capture_kv(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.capture([KeyValue::keyed(key, value)])
    }

    /// Attach the call site as structural fields on the pending log
    pub fn locate(&mut self, file: impl Into<String>, line: u32) -> &mut Self {
        self.info_kv(KEY_FILE, file.into());
        self.info_kv(KEY_LINE, i64::from(line))
    }

    /// Attach a free-text comment as a structural field
    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.info_kv(KEY_COMMENT, text.into())
    }

    /// Emit an event: render pending logs plus `extra`, dispatch, count
    ///
    /// The handler fires only when the event's slot is occupied; the
    /// counter advances whenever the event is covered, dispatched or not.
    /// Afterwards the pending log truncates back to the captured prefix.
    pub fn handle(&mut self, event: Event, extra: impl IntoIterator<Item = KeyValue>) {
        self.logs.extend(extra);
        if let Some(Some(handler)) = self.handlers.get(event.index()) {
            let rendered: Vec<KeyString> = self.logs.iter().map(KeyString::render).collect();
            handler(event, &self.scopes, &rendered);
        }
        if let Some(counters) = &self.counters {
            counters.increment(event);
        }
        self.logs.truncate(self.reserved_logs);
    }

    fn check(&mut self, ok: bool, extra: impl IntoIterator<Item = KeyValue>) -> bool {
        let event = if ok { Event::SUCCESS } else { Event::FAILURE };
        self.handle(event, extra);
        ok
    }

    // ------------------------------------------------------------------
    // Assertions
    // ------------------------------------------------------------------

    /// Assert a boolean, logging it under `value`
    pub fn require(&mut self, ok: bool) -> bool {
        self.check(ok, [KeyValue::keyed("value", ok)])
    }

    /// Assert a boolean with extra fields attached to the emitted log
    pub fn require_with(&mut self, ok: bool, extra: impl IntoIterator<Item = KeyValue>) -> bool {
        self.log(extra);
        self.require(ok)
    }

    /// Assert `l == r` with a comparison record
    pub fn equal<L, R>(&mut self, l: L, r: R) -> bool
    where
        L: PartialEq<R> + fmt::Display,
        R: fmt::Display,
    {
        let ok = l == r;
        let record = comparison(l.to_string(), r.to_string(), Op::Eq);
        self.check(ok, record)
    }

    /// Assert `l != r` with a comparison record
    pub fn not_equal<L, R>(&mut self, l: L, r: R) -> bool
    where
        L: PartialEq<R> + fmt::Display,
        R: fmt::Display,
    {
        let ok = l != r;
        let record = comparison(l.to_string(), r.to_string(), Op::Ne);
        self.check(ok, record)
    }

    /// Assert `l < r` with a comparison record
    pub fn less<L, R>(&mut self, l: L, r: R) -> bool
    where
        L: PartialOrd<R> + fmt::Display,
        R: fmt::Display,
    {
        let ok = l < r;
        let record = comparison(l.to_string(), r.to_string(), Op::Lt);
        self.check(ok, record)
    }

    /// Assert `l > r` with a comparison record
    pub fn greater<L, R>(&mut self, l: L, r: R) -> bool
    where
        L: PartialOrd<R> + fmt::Display,
        R: fmt::Display,
    {
        let ok = l > r;
        let record = comparison(l.to_string(), r.to_string(), Op::Gt);
        self.check(ok, record)
    }

    /// Assert `l <= r` with a comparison record
    pub fn less_eq<L, R>(&mut self, l: L, r: R) -> bool
    where
        L: PartialOrd<R> + fmt::Display,
        R: fmt::Display,
    {
        let ok = l <= r;
        let record = comparison(l.to_string(), r.to_string(), Op::Le);
        self.check(ok, record)
    }

    /// Assert `l >= r` with a comparison record
    pub fn greater_eq<L, R>(&mut self, l: L, r: R) -> bool
    where
        L: PartialOrd<R> + fmt::Display,
        R: fmt::Display,
    {
        let ok = l >= r;
        let record = comparison(l.to_string(), r.to_string(), Op::Ge);
        self.check(ok, record)
    }

    /// Assert approximate equality with the operand types' epsilon
    pub fn near<L: Approx, R: Approx>(&mut self, l: L, r: R) -> bool {
        self.near_with(Near::of::<L, R>(), l, r)
    }

    /// Assert approximate equality with an explicit comparison
    pub fn near_with<L: Approx, R: Approx>(&mut self, near: Near, l: L, r: R) -> bool {
        let ok = near.accepts(l.approx_value(), r.approx_value());
        let record = comparison(l.to_string(), r.to_string(), Op::Near);
        self.check(ok, record)
    }

    /// Assert `max(l-r, r-l) < tolerance`, short-circuiting exact equality
    pub fn within<L: Approx, R: Approx>(&mut self, tolerance: f64, l: L, r: R) -> bool {
        let (lv, rv) = (l.approx_value(), r.approx_value());
        let ok = approx::within(tolerance, lv, rv);
        let mut extra: Vec<KeyValue> =
            comparison(l.to_string(), r.to_string(), Op::Near).into();
        extra.push(KeyValue::keyed("tolerance", tolerance));
        extra.push(KeyValue::keyed("difference", rv - lv));
        self.check(ok, extra)
    }

    /// Assert the relative form `max((l-r)/r, (r-l)/l) < tolerance`
    pub fn within_log<L: Approx, R: Approx>(&mut self, tolerance: f64, l: L, r: R) -> bool {
        let (lv, rv) = (l.approx_value(), r.approx_value());
        let ok = approx::within_log(tolerance, lv, rv);
        let mut extra: Vec<KeyValue> =
            comparison(l.to_string(), r.to_string(), Op::Near).into();
        extra.push(KeyValue::keyed("tolerance", tolerance));
        extra.push(KeyValue::keyed("difference", (rv - lv) / lv));
        self.check(ok, extra)
    }

    /// Assert the operand is neither infinite nor NaN
    pub fn is_finite<T: Approx>(&mut self, value: T) -> bool {
        let ok = value.approx_value().is_finite();
        self.check(ok, [KeyValue::keyed("value", value.to_string())])
    }

    /// Assert `f` fails with exactly this error kind
    ///
    /// Success, no error, or a different kind is a failure; the error is
    /// consumed. A client error of a different kind propagates instead.
    pub fn expect_err<O>(
        &mut self,
        kind: ErrorKind,
        f: impl FnOnce() -> Result<O, TestError>,
    ) -> Result<bool, TestError> {
        match f() {
            Ok(_) => Ok(self.check(false, [])),
            Err(err) if err.kind() == kind => Ok(self.check(true, [])),
            Err(err @ TestError::Client { .. }) => Err(err),
            Err(_) => Ok(self.check(false, [])),
        }
    }

    /// Assert `f` succeeds; client errors always propagate
    pub fn expect_ok<O>(
        &mut self,
        f: impl FnOnce() -> Result<O, TestError>,
    ) -> Result<bool, TestError> {
        match f() {
            Ok(_) => Ok(self.check(true, [])),
            Err(err @ TestError::Client { .. }) => Err(err),
            Err(_) => Ok(self.check(false, [])),
        }
    }

    // ------------------------------------------------------------------
    // Element-wise assertions
    // ------------------------------------------------------------------

    /// Lock-step comparison of two sequences with a custom predicate
    ///
    /// Fails when the lengths differ or any element pair fails; both
    /// sequences render into the comparison record.
    pub fn all_by<L, R>(
        &mut self,
        op: Op,
        cmp: impl Fn(&L, &R) -> bool,
        ls: impl IntoIterator<Item = L>,
        rs: impl IntoIterator<Item = R>,
    ) -> bool
    where
        L: fmt::Display,
        R: fmt::Display,
    {
        let ls: Vec<L> = ls.into_iter().collect();
        let rs: Vec<R> = rs.into_iter().collect();
        let ok = ls.len() == rs.len() && ls.iter().zip(rs.iter()).all(|(l, r)| cmp(l, r));
        let record = comparison(render_sequence(&ls), render_sequence(&rs), op);
        self.check(ok, record)
    }

    /// Element-wise `==` across two sequences
    pub fn all_equal<L, R>(
        &mut self,
        ls: impl IntoIterator<Item = L>,
        rs: impl IntoIterator<Item = R>,
    ) -> bool
    where
        L: PartialEq<R> + fmt::Display,
        R: fmt::Display,
    {
        self.all_by(Op::Eq, |l, r| l == r, ls, rs)
    }

    /// Element-wise approximate equality across two sequences
    pub fn all_near<L: Approx, R: Approx>(
        &mut self,
        ls: impl IntoIterator<Item = L>,
        rs: impl IntoIterator<Item = R>,
    ) -> bool {
        let near = Near::of::<L, R>();
        self.all_by(
            Op::Near,
            move |l: &L, r: &R| near.accepts(l.approx_value(), r.approx_value()),
            ls,
            rs,
        )
    }

    // ------------------------------------------------------------------
    // Timing, sections, skipping
    // ------------------------------------------------------------------

    /// Run `f` once and emit a Timing event with elapsed seconds
    ///
    /// A result with a payload is attached under `value`; the result is
    /// returned either way.
    pub fn timed<O>(&mut self, f: impl FnOnce() -> O) -> O
    where
        O: Into<Value> + Clone,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed().as_secs_f64();
        let mut extra = vec![KeyValue::keyed("seconds", elapsed)];
        let value: Value = result.clone().into();
        if value.has_value() {
            extra.push(KeyValue::keyed("value", value));
        }
        self.handle(Event::TIMING, extra);
        result
    }

    /// Run `f` in a tight loop and emit one Timing event
    ///
    /// Logs total seconds, the repeat count, and the per-iteration
    /// average; returns total seconds.
    pub fn timing(&mut self, repeats: usize, mut f: impl FnMut()) -> f64 {
        let start = Instant::now();
        for _ in 0..repeats {
            f();
        }
        let elapsed = start.elapsed().as_secs_f64();
        let average = if repeats == 0 {
            0.0
        } else {
            elapsed / repeats as f64
        };
        self.handle(
            Event::TIMING,
            [
                KeyValue::keyed("seconds", elapsed),
                KeyValue::keyed("repeats", repeats as i64),
                KeyValue::keyed("average", average),
            ],
        );
        elapsed
    }

    /// Run `f` in a child context with `name` pushed onto the scope stack
    ///
    /// The child shares handlers, counters, and the cancellation flag but
    /// gets a fresh start time and log buffer. An error emits Traceback
    /// from the child before propagating.
    pub fn section<O, F>(&self, name: impl Into<String>, f: F) -> Result<O, TestError>
    where
        F: FnOnce(&mut Context) -> Result<O, TestError>,
    {
        let mut scopes = self.scopes.clone();
        scopes.push(name.into());
        let mut child = Context {
            handlers: self.handlers.clone(),
            scopes,
            start_time: Instant::now(),
            counters: self.counters.clone(),
            cancel: self.cancel.clone(),
            logs: Vec::new(),
            reserved_logs: 0,
        };
        match f(&mut child) {
            Ok(result) => Ok(result),
            Err(err) => {
                child.handle(
                    Event::TRACEBACK,
                    [KeyValue::keyed(KEY_COMMENT, err.to_string())],
                );
                Err(err)
            }
        }
    }

    /// Emit a Skipped event with a reason comment
    pub fn skipped(&mut self, reason: impl Into<String>) {
        self.handle(
            Event::SKIPPED,
            [KeyValue::keyed(KEY_COMMENT, reason.into())],
        );
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("scopes", &self.scopes)
            .field("pending_logs", &self.logs.len())
            .field("reserved_logs", &self.reserved_logs)
            .finish()
    }
}

fn render_sequence<T: fmt::Display>(items: &[T]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&item.to_string());
    }
    out.push(']');
    out
}
