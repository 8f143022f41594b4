//! Thread-safe catalogue of test cases
//!
//! A [`Suite`] is an ordered, `RwLock`-guarded collection of [`TestCase`]
//! entries. Lookup is by name (first match wins; duplicates may coexist)
//! or by index. The lock is never held while a test body runs, so a body
//! may register further cases or read values without deadlocking.

use crate::case::{IntoTestFn, TestCase, TestFn};
use crate::context::Context;
use crate::error::TestError;
use crate::value::{ArgList, Value};
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of named test cases
#[derive(Debug, Default)]
pub struct Suite {
    cases: RwLock<Vec<TestCase>>,
}

impl Suite {
    /// An empty suite
    pub fn new() -> Self {
        Suite {
            cases: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<TestCase>> {
        self.cases.read().expect("suite lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<TestCase>> {
        self.cases.write().expect("suite lock poisoned")
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Append a case, returning its index
    pub fn add(&self, case: TestCase) -> usize {
        let mut cases = self.write();
        cases.push(case);
        cases.len() - 1
    }

    /// Wrap and append a typed callable
    ///
    /// An empty `parameters` keeps the case's default lists (one empty
    /// list for zero-argument callables).
    pub fn add_raw<Args, F>(
        &self,
        name: impl Into<String>,
        function: F,
        comment: impl Into<String>,
        parameters: Vec<ArgList>,
    ) -> usize
    where
        F: IntoTestFn<Args>,
    {
        let mut case = TestCase::new(name, function).with_comment(comment);
        if !parameters.is_empty() {
            case = case.with_parameters(parameters);
        }
        self.add(case)
    }

    /// Append a constant-value entry without removing same-named ones
    pub fn add_value(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) -> usize {
        self.add(TestCase::constant(name, value).with_comment(comment))
    }

    /// Replace every entry of this name with one constant-value entry
    ///
    /// Returns whether any existing entry was removed.
    pub fn set_value(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) -> bool {
        let name = name.into();
        let mut cases = self.write();
        let before = cases.len();
        cases.retain(|case| case.name != name);
        let removed = cases.len() != before;
        cases.push(TestCase::constant(name, value).with_comment(comment));
        removed
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.write().clear();
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Index of the first entry with this name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.read().iter().position(|case| case.name == name)
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Whether the suite holds no entries
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Clone of the entry at `index`
    pub fn get(&self, index: usize) -> Result<TestCase, TestError> {
        let cases = self.read();
        cases.get(index).cloned().ok_or(TestError::IndexOutOfRange {
            index,
            count: cases.len(),
        })
    }

    /// Every entry name, in insertion order
    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|case| case.name.clone()).collect()
    }

    // ------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------

    /// Value of the first entry with this name
    ///
    /// Constant entries return their value directly. Computed entries run
    /// with a bare context and no arguments, outside the lock. A missing
    /// name yields `Empty` when `allow_missing`, `NotFound` otherwise.
    pub fn get_value(&self, name: &str, allow_missing: bool) -> Result<Value, TestError> {
        let function = {
            let cases = self.read();
            match cases.iter().find(|case| case.name == name) {
                Some(case) => case.function.clone(),
                None if allow_missing => return Ok(Value::Empty),
                None => {
                    return Err(TestError::NotFound {
                        name: name.to_string(),
                    })
                }
            }
        };
        match function {
            TestFn::Constant(value) => Ok(value),
            dynamic => {
                let mut ctx = Context::new(name);
                dynamic.call(&mut ctx, ArgList::new())
            }
        }
    }

    /// Invoke the first entry with this name using the caller's context
    ///
    /// The erased function is cloned under the read lock and invoked after
    /// release, so the callee may touch the suite itself.
    pub fn call(&self, name: &str, ctx: &mut Context, args: ArgList) -> Result<Value, TestError> {
        let function = {
            let cases = self.read();
            match cases.iter().find(|case| case.name == name) {
                Some(case) => case.function.clone(),
                None => {
                    return Err(TestError::NotFound {
                        name: name.to_string(),
                    })
                }
            }
        };
        function.call(ctx, args)
    }
}

static DEFAULT: OnceLock<Suite> = OnceLock::new();

/// The process-wide default suite
///
/// Registration convenience for hosts that assume one catalogue per
/// process; embedders that need isolated catalogues construct their own
/// [`Suite`] values instead.
pub fn suite() -> &'static Suite {
    DEFAULT.get_or_init(Suite::new)
}
