//! Test cases and the uniform invocation adapter
//!
//! A [`TestCase`] couples a name with an erased function of shape
//! `(&mut Context, ArgList) -> Result<Value, TestError>`. Typed callables
//! wrap into that shape through [`IntoTestFn`], which checks arity,
//! extracts each argument with `view_as`, and erases the return value.
//! [`TestFn::call`] is the normalization boundary: skips and arity
//! mismatches emit Skipped, client errors pass through untouched, and
//! everything else emits Exception and Traceback before propagating.

use crate::context::Context;
use crate::error::TestError;
use crate::event::Event;
use crate::value::{ArgList, FromValue, Value};
use std::fmt;
use std::sync::Arc;

/// File and line recorded at registration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// Fully erased test function
pub type DynTestFn = Arc<dyn Fn(&mut Context, ArgList) -> Result<Value, TestError> + Send + Sync>;

/// Erased invocation form of a test case
#[derive(Clone)]
pub enum TestFn {
    /// A constant entry; invocation returns the value and ignores arguments
    Constant(Value),
    /// A wrapped callable
    Dynamic(DynTestFn),
}

impl TestFn {
    /// Whether this is the constant-value form
    pub fn is_constant(&self) -> bool {
        matches!(self, TestFn::Constant(_))
    }

    /// Invoke with error normalization
    ///
    /// Skipped and WrongArity errors emit a Skipped event carrying the
    /// message as a comment; client errors pass through without touching
    /// the context; any other error emits Exception and then Traceback.
    /// The error always propagates to the caller afterwards.
    pub fn call(&self, ctx: &mut Context, args: ArgList) -> Result<Value, TestError> {
        match self {
            TestFn::Constant(value) => Ok(value.clone()),
            TestFn::Dynamic(function) => match function(ctx, args) {
                Ok(value) => Ok(value),
                Err(err) => {
                    match &err {
                        TestError::Skipped { reason } => ctx.skipped(reason.clone()),
                        TestError::WrongArity { .. } => ctx.skipped(err.to_string()),
                        TestError::Client { .. } => {}
                        other => {
                            ctx.comment(other.to_string());
                            ctx.handle(Event::EXCEPTION, []);
                            ctx.handle(Event::TRACEBACK, []);
                        }
                    }
                    Err(err)
                }
            },
        }
    }
}

impl fmt::Debug for TestFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestFn::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            TestFn::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

/// A named, commented, possibly parametrized test case
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Lookup identity; duplicates may coexist, `find` takes the first
    pub name: String,
    /// Free-text description
    pub comment: String,
    /// Registration site, if the registrar supplied one
    pub location: Option<SourceLocation>,
    /// Erased invocation function
    pub function: TestFn,
    /// Pre-bound argument lists selectable by index at run time
    pub parameters: Vec<ArgList>,
}

impl TestCase {
    /// Wrap a typed callable
    ///
    /// Zero-argument callables get one empty parameter list so that a
    /// pack-driven runner executes them once.
    pub fn new<Args, F>(name: impl Into<String>, function: F) -> Self
    where
        F: IntoTestFn<Args>,
    {
        let parameters = if F::ARITY == 0 {
            vec![ArgList::new()]
        } else {
            Vec::new()
        };
        TestCase {
            name: name.into(),
            comment: String::new(),
            location: None,
            function: function.into_test_fn(),
            parameters,
        }
    }

    /// Constant-value entry
    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        TestCase {
            name: name.into(),
            comment: String::new(),
            location: None,
            function: TestFn::Constant(value.into()),
            parameters: Vec::new(),
        }
    }

    /// Entry from an already-erased function
    pub fn raw(name: impl Into<String>, function: DynTestFn) -> Self {
        TestCase {
            name: name.into(),
            comment: String::new(),
            location: None,
            function: TestFn::Dynamic(function),
            parameters: Vec::new(),
        }
    }

    /// Attach a free-text comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Record the registration site
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    /// Replace the pre-bound parameter lists
    pub fn with_parameters(mut self, parameters: Vec<ArgList>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Invoke through the normalization boundary
    pub fn call(&self, ctx: &mut Context, args: ArgList) -> Result<Value, TestError> {
        self.function.call(ctx, args)
    }
}

fn check_arity(expected: usize, got: usize) -> Result<(), TestError> {
    if expected == got {
        Ok(())
    } else {
        Err(TestError::WrongArity { expected, got })
    }
}

// ============================================================================
// Typed-callable adapters
// ============================================================================

/// Conversion from a typed callable into the erased [`TestFn`]
///
/// `Args` is a marker tuple of the callable's argument types after the
/// leading context parameter; it exists so the impls for different
/// arities do not overlap.
pub trait IntoTestFn<Args> {
    /// Declared argument count, checked against the ArgList length
    const ARITY: usize;

    /// Erase the callable
    fn into_test_fn(self) -> TestFn;
}

impl<F, O> IntoTestFn<()> for F
where
    F: Fn(&mut Context) -> O + Send + Sync + 'static,
    O: IntoTestResult,
{
    const ARITY: usize = 0;

    fn into_test_fn(self) -> TestFn {
        TestFn::Dynamic(Arc::new(move |ctx, args| {
            check_arity(0, args.len())?;
            self(ctx).into_test_result()
        }))
    }
}

impl<F, O, T1> IntoTestFn<(T1,)> for F
where
    F: Fn(&mut Context, T1) -> O + Send + Sync + 'static,
    O: IntoTestResult,
    T1: FromValue,
{
    const ARITY: usize = 1;

    fn into_test_fn(self) -> TestFn {
        TestFn::Dynamic(Arc::new(move |ctx, args| {
            check_arity(1, args.len())?;
            let a1 = args[0].view_as::<T1>()?;
            self(ctx, a1).into_test_result()
        }))
    }
}

impl<F, O, T1, T2> IntoTestFn<(T1, T2)> for F
where
    F: Fn(&mut Context, T1, T2) -> O + Send + Sync + 'static,
    O: IntoTestResult,
    T1: FromValue,
    T2: FromValue,
{
    const ARITY: usize = 2;

    fn into_test_fn(self) -> TestFn {
        TestFn::Dynamic(Arc::new(move |ctx, args| {
            check_arity(2, args.len())?;
            let a1 = args[0].view_as::<T1>()?;
            let a2 = args[1].view_as::<T2>()?;
            self(ctx, a1, a2).into_test_result()
        }))
    }
}

impl<F, O, T1, T2, T3> IntoTestFn<(T1, T2, T3)> for F
where
    F: Fn(&mut Context, T1, T2, T3) -> O + Send + Sync + 'static,
    O: IntoTestResult,
    T1: FromValue,
    T2: FromValue,
    T3: FromValue,
{
    const ARITY: usize = 3;

    fn into_test_fn(self) -> TestFn {
        TestFn::Dynamic(Arc::new(move |ctx, args| {
            check_arity(3, args.len())?;
            let a1 = args[0].view_as::<T1>()?;
            let a2 = args[1].view_as::<T2>()?;
            let a3 = args[2].view_as::<T3>()?;
            self(ctx, a1, a2, a3).into_test_result()
        }))
    }
}

impl<F, O, T1, T2, T3, T4> IntoTestFn<(T1, T2, T3, T4)> for F
where
    F: Fn(&mut Context, T1, T2, T3, T4) -> O + Send + Sync + 'static,
    O: IntoTestResult,
    T1: FromValue,
    T2: FromValue,
    T3: FromValue,
    T4: FromValue,
{
    const ARITY: usize = 4;

    fn into_test_fn(self) -> TestFn {
        TestFn::Dynamic(Arc::new(move |ctx, args| {
            check_arity(4, args.len())?;
            let a1 = args[0].view_as::<T1>()?;
            let a2 = args[1].view_as::<T2>()?;
            let a3 = args[2].view_as::<T3>()?;
            let a4 = args[3].view_as::<T4>()?;
            self(ctx, a1, a2, a3, a4).into_test_result()
        }))
    }
}

// ============================================================================
// Return-value erasure
// ============================================================================

/// Conversion from a callable's return type into the erased result
pub trait IntoTestResult {
    /// Erase the return value
    fn into_test_result(self) -> Result<Value, TestError>;
}

impl IntoTestResult for () {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::Empty)
    }
}

impl IntoTestResult for bool {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for i32 {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for i64 {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for u32 {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for u64 {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for usize {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for f32 {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for f64 {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for String {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for &'static str {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for Arc<str> {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for Vec<u8> {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for serde_json::Value {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(Value::from(self))
    }
}

impl IntoTestResult for Value {
    fn into_test_result(self) -> Result<Value, TestError> {
        Ok(self)
    }
}

impl<T, E> IntoTestResult for Result<T, E>
where
    T: IntoTestResult,
    E: Into<TestError>,
{
    fn into_test_result(self) -> Result<Value, TestError> {
        self.map_err(Into::into)?.into_test_result()
    }
}
