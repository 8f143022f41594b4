//! Attest Core - Test execution engine
//!
//! This library provides the complete test execution core including:
//! - Type-erased value storage and typed extraction
//! - A thread-safe registry of named, parametrized test cases
//! - Per-invocation execution contexts with event-driven diagnostics
//! - A single-invocation runner and capturable output sinks

/// Attest core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod approx;
pub mod case;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod runner;
pub mod stream;
pub mod suite;
pub mod value;

// Re-export commonly used types
pub use approx::{Approx, Near, F32_EPSILON, F64_EPSILON};
pub use case::{DynTestFn, IntoTestFn, IntoTestResult, SourceLocation, TestCase, TestFn};
pub use context::Context;
pub use diagnostic::{
    KeyString, KeyValue, Op, KEY_COMMENT, KEY_FILE, KEY_LHS, KEY_LINE, KEY_OP, KEY_RHS,
};
pub use error::{ErrorKind, TestError};
pub use event::{handler_table, Event, EventCounters, Handler, HandlerTable};
pub use runner::run;
pub use stream::{err, out, Capture, Sink};
pub use suite::{suite, Suite};
pub use value::{set_type_namer, type_name_of, ArgList, FromValue, Opaque, Target, Value};
