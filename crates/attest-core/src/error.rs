//! Error taxonomy for registry, conversion, and invocation failures.
//!
//! Every fallible operation in the crate returns [`TestError`]. The
//! variants split along how a runner treats them: `Skipped` and
//! `WrongArity` surface as Skipped events, `Client` always propagates,
//! everything else normalizes to an Exception event and an empty result.

use thiserror::Error;

/// Error type for suite lookup, value conversion, and test invocation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TestError {
    /// Name lookup miss
    #[error("test not found: {name}")]
    NotFound { name: String },
    /// Bad numeric index into the suite or a parameter pack
    #[error("index {index} out of range ({count} available)")]
    IndexOutOfRange { index: usize, count: usize },
    /// Argument count mismatch, reported as skipped by the adapter
    #[error("wrong number of arguments (expected {expected}, got {got})")]
    WrongArity { expected: usize, got: usize },
    /// Typed extraction mismatch
    #[error("no conversion from {stored} to {requested} (value: {value})")]
    NoConversion {
        /// Rendered form of the stored value
        value: String,
        /// Human-readable name of the stored type
        stored: String,
        /// Human-readable name of the requested type
        requested: String,
    },
    /// Intentional early termination of a single test
    #[error("test skipped: {reason}")]
    Skipped { reason: String },
    /// Configuration or programming mistake, fatal to the whole run
    #[error("client error: {message}")]
    Client { message: String },
    /// Failure payload raised by a test body
    #[error("{message}")]
    Raised { message: String },
}

impl TestError {
    /// Skip the current test with a reason
    pub fn skip(reason: impl Into<String>) -> Self {
        TestError::Skipped {
            reason: reason.into(),
        }
    }

    /// Fatal configuration error, never contained by the runner
    pub fn client(message: impl Into<String>) -> Self {
        TestError::Client {
            message: message.into(),
        }
    }

    /// Ordinary test failure raised from a test body
    pub fn raised(message: impl Into<String>) -> Self {
        TestError::Raised {
            message: message.into(),
        }
    }

    /// Fieldless discriminant for matching without destructuring
    pub fn kind(&self) -> ErrorKind {
        match self {
            TestError::NotFound { .. } => ErrorKind::NotFound,
            TestError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            TestError::WrongArity { .. } => ErrorKind::WrongArity,
            TestError::NoConversion { .. } => ErrorKind::NoConversion,
            TestError::Skipped { .. } => ErrorKind::Skipped,
            TestError::Client { .. } => ErrorKind::Client,
            TestError::Raised { .. } => ErrorKind::Raised,
        }
    }
}

/// Discriminant of [`TestError`], used by `expect_err` and runners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    IndexOutOfRange,
    WrongArity,
    NoConversion,
    Skipped,
    Client,
    Raised,
}
