//! Type-erased value model
//!
//! [`Value`] stores exactly one payload behind a closed set of primitive
//! variants plus one opaque extension variant for host-defined types.
//! Extraction is type-directed: [`Value::target`] borrows the payload on
//! an exact type match, [`Value::view_as`] additionally applies a fixed
//! widening table (integer to wider integer, integer to bool, numeric to
//! float, shared string to owned string). Anything else fails with
//! [`TestError::NoConversion`] naming both types through the pluggable
//! type namer.

use crate::error::TestError;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Erased argument vector passed positionally into a test invocation
pub type ArgList = Vec<Value>;

/// Host-defined payload stored behind [`Value::Opaque`]
///
/// Implementors supply the two operations the diagnostic pipeline needs
/// without the pipeline knowing the concrete type: a short tag for
/// conversion errors and a rendering for logs. `as_any` enables
/// [`Value::downcast_ref`].
pub trait Opaque: Any + Send + Sync {
    /// Short human-readable tag naming the concrete type
    fn type_tag(&self) -> &str;
    /// Render the payload for diagnostic logs
    fn render(&self) -> String;
    /// Upcast for downcasting back to the concrete type
    fn as_any(&self) -> &dyn Any;
}

/// Erased value: one payload, cheap to clone, total stringification
#[derive(Clone, Default)]
pub enum Value {
    /// No payload; renders as the empty string
    #[default]
    Empty,
    /// Boolean payload
    Bool(bool),
    /// Integer payload (all integer constructions normalize to i64)
    Int(i64),
    /// Floating payload (f32 constructions widen to f64)
    Real(f64),
    /// String payload (reference-counted, immutable)
    Str(Arc<str>),
    /// Binary payload (reference-counted, immutable)
    Bytes(Arc<[u8]>),
    /// Structured payload for composite data crossing the host bridge
    Json(Arc<serde_json::Value>),
    /// Host-defined payload behind the [`Opaque`] interface
    Opaque(Arc<dyn Opaque>),
}

impl Value {
    /// Wrap a host-defined payload
    pub fn opaque(payload: impl Opaque) -> Self {
        Value::Opaque(Arc::new(payload))
    }

    /// Whether a payload is stored
    pub fn has_value(&self) -> bool {
        !matches!(self, Value::Empty)
    }

    /// Human-readable name of the stored type, through the configured namer
    pub fn type_name(&self) -> String {
        let raw = match self {
            Value::Empty => "()",
            Value::Bool(_) => "bool",
            Value::Int(_) => "i64",
            Value::Real(_) => "f64",
            Value::Str(_) => "str",
            Value::Bytes(_) => "[u8]",
            Value::Json(_) => "json",
            Value::Opaque(payload) => return payload.type_tag().to_string(),
        };
        apply_namer(raw)
    }

    /// Borrow the payload on an exact type match, `None` otherwise
    ///
    /// Exact means the variant's own payload type: `i64` for `Int`, `str`
    /// for `Str`, `[u8]` for `Bytes`, and so on. Host payloads stored via
    /// [`Value::opaque`] are recovered with [`Value::downcast_ref`].
    pub fn target<T: Target + ?Sized>(&self) -> Option<&T> {
        T::target_in(self)
    }

    /// Borrow an opaque payload as its concrete type
    pub fn downcast_ref<T: Opaque>(&self) -> Option<&T> {
        match self {
            Value::Opaque(payload) => payload.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Extract a typed copy, applying the documented widening table
    ///
    /// Exact matches come back unchanged. An empty value yields the
    /// target type's default. Stored integers widen to any integral type
    /// (range-checked), to `bool` by nonzero test, and to floats; stored
    /// strings convert to `Arc<str>` cheaply or `String` by copy. Any
    /// other pairing fails [`TestError::NoConversion`].
    pub fn view_as<T: FromValue>(&self) -> Result<T, TestError> {
        T::from_value(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write_escaped(f, s),
            Value::Bytes(bytes) => {
                for byte in bytes.iter() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Json(j) => write!(f, "{}", j),
            Value::Opaque(payload) => f.write_str(&payload.render()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "Empty"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Real(n) => f.debug_tuple("Real").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Value::Json(j) => f.debug_tuple("Json").field(j).finish(),
            Value::Opaque(payload) => write!(f, "Opaque({})", payload.type_tag()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Int(l), Value::Int(r)) => l == r,
            (Value::Real(l), Value::Real(r)) => l == r,
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::Bytes(l), Value::Bytes(r)) => l == r,
            (Value::Json(l), Value::Json(r)) => l == r,
            (Value::Opaque(l), Value::Opaque(r)) => Arc::ptr_eq(l, r),
            _ => false,
        }
    }
}

// Each payload serializes as its natural type; opaque payloads
// serialize as their rendered text. No Deserialize: opaque payloads
// cannot be reconstructed from data.
impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Empty => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Real(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => serializer.serialize_bytes(bytes),
            Value::Json(j) => serde::Serialize::serialize(j.as_ref(), serializer),
            Value::Opaque(payload) => serializer.serialize_str(&payload.render()),
        }
    }
}

// Escaping keeps printable ASCII, non-ASCII text, newline, and tab
// literal; control bytes get named or hex escapes.
fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let clean = s
        .bytes()
        .all(|b| (b >= 0x20 && b != 0x7F) || b == b'\n' || b == b'\t');
    if clean {
        return f.write_str(s);
    }
    for ch in s.chars() {
        match ch {
            '\n' | '\t' => write!(f, "{}", ch)?,
            '\u{07}' => f.write_str("\\a")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0B}' => f.write_str("\\v")?,
            '\u{0C}' => f.write_str("\\f")?,
            '\r' => f.write_str("\\r")?,
            c if (c as u32) < 0x20 || c == '\u{7F}' => write!(f, "\\x{:02X}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    Ok(())
}

// ============================================================================
// Construction
// ============================================================================

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Empty
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i8> for Value {
    fn from(n: i8) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<isize> for Value {
    fn from(n: isize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

// The top bit wraps; extraction back out is range-checked, so an
// out-of-range u64 surfaces as NoConversion rather than a bad read.
impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Real(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(Arc::from(bytes))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(Arc::from(bytes))
    }
}

impl From<Arc<[u8]>> for Value {
    fn from(bytes: Arc<[u8]>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(Arc::new(j))
    }
}

// ============================================================================
// Exact-type borrowing
// ============================================================================

/// Payload types borrowable through [`Value::target`]
pub trait Target {
    /// Borrow the payload if `value` stores exactly this type
    fn target_in(value: &Value) -> Option<&Self>;
}

impl Target for bool {
    fn target_in(value: &Value) -> Option<&Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl Target for i64 {
    fn target_in(value: &Value) -> Option<&Self> {
        match value {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }
}

impl Target for f64 {
    fn target_in(value: &Value) -> Option<&Self> {
        match value {
            Value::Real(n) => Some(n),
            _ => None,
        }
    }
}

impl Target for str {
    fn target_in(value: &Value) -> Option<&Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl Target for [u8] {
    fn target_in(value: &Value) -> Option<&Self> {
        match value {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl Target for serde_json::Value {
    fn target_in(value: &Value) -> Option<&Self> {
        match value {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }
}

// ============================================================================
// Typed extraction with widening
// ============================================================================

/// Types extractable through [`Value::view_as`]
pub trait FromValue: Sized {
    /// Extract from an erased value
    ///
    /// # Errors
    ///
    /// Returns [`TestError::NoConversion`] when the stored payload is
    /// neither the target type nor covered by the widening table.
    fn from_value(value: &Value) -> Result<Self, TestError>;
}

fn no_conversion<T: ?Sized>(value: &Value) -> TestError {
    TestError::NoConversion {
        value: value.to_string(),
        stored: value.type_name(),
        requested: type_name_of::<T>(),
    }
}

// Integers extract from Int only, range-checked.

impl FromValue for i8 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => i8::try_from(*n).map_err(|_| no_conversion::<i8>(value)),
            _ => Err(no_conversion::<i8>(value)),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => i16::try_from(*n).map_err(|_| no_conversion::<i16>(value)),
            _ => Err(no_conversion::<i16>(value)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => i32::try_from(*n).map_err(|_| no_conversion::<i32>(value)),
            _ => Err(no_conversion::<i32>(value)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => Ok(*n),
            _ => Err(no_conversion::<i64>(value)),
        }
    }
}

impl FromValue for isize {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => isize::try_from(*n).map_err(|_| no_conversion::<isize>(value)),
            _ => Err(no_conversion::<isize>(value)),
        }
    }
}

impl FromValue for u8 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => u8::try_from(*n).map_err(|_| no_conversion::<u8>(value)),
            _ => Err(no_conversion::<u8>(value)),
        }
    }
}

impl FromValue for u16 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => u16::try_from(*n).map_err(|_| no_conversion::<u16>(value)),
            _ => Err(no_conversion::<u16>(value)),
        }
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => u32::try_from(*n).map_err(|_| no_conversion::<u32>(value)),
            _ => Err(no_conversion::<u32>(value)),
        }
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => u64::try_from(*n).map_err(|_| no_conversion::<u64>(value)),
            _ => Err(no_conversion::<u64>(value)),
        }
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0),
            Value::Int(n) => usize::try_from(*n).map_err(|_| no_conversion::<usize>(value)),
            _ => Err(no_conversion::<usize>(value)),
        }
    }
}

// Bool extracts from Bool exactly or from Int by nonzero test.

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            _ => Err(no_conversion::<bool>(value)),
        }
    }
}

// Floats extract from Real first, then widen from Int.

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0.0),
            Value::Real(n) => Ok(*n as f32),
            Value::Int(n) => Ok(*n as f32),
            _ => Err(no_conversion::<f32>(value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(0.0),
            Value::Real(n) => Ok(*n),
            Value::Int(n) => Ok(*n as f64),
            _ => Err(no_conversion::<f64>(value)),
        }
    }
}

// Strings: the shared buffer clones cheaply, an owned String copies.

impl FromValue for Arc<str> {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(Arc::from("")),
            Value::Str(s) => Ok(s.clone()),
            _ => Err(no_conversion::<Arc<str>>(value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(String::new()),
            Value::Str(s) => Ok(s.to_string()),
            _ => Err(no_conversion::<String>(value)),
        }
    }
}

// Binary payloads.

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(Vec::new()),
            Value::Bytes(bytes) => Ok(bytes.to_vec()),
            _ => Err(no_conversion::<Vec<u8>>(value)),
        }
    }
}

impl FromValue for Arc<[u8]> {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(Arc::from(Vec::new())),
            Value::Bytes(bytes) => Ok(bytes.clone()),
            _ => Err(no_conversion::<Arc<[u8]>>(value)),
        }
    }
}

// Structured payloads.

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        match value {
            Value::Empty => Ok(serde_json::Value::Null),
            Value::Json(j) => Ok((**j).clone()),
            _ => Err(no_conversion::<serde_json::Value>(value)),
        }
    }
}

// Identity, for callables that take an erased parameter as-is.

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, TestError> {
        Ok(value.clone())
    }
}

// ============================================================================
// Pluggable type naming
// ============================================================================

static TYPE_NAMER: RwLock<fn(&str) -> String> = RwLock::new(default_type_name);

/// Replace the process-wide type namer used in conversion errors
pub fn set_type_namer(namer: fn(&str) -> String) {
    *TYPE_NAMER.write().expect("type namer lock poisoned") = namer;
}

/// Human-readable name of `T`, through the configured namer
pub fn type_name_of<T: ?Sized>() -> String {
    apply_namer(std::any::type_name::<T>())
}

fn apply_namer(raw: &str) -> String {
    let namer = *TYPE_NAMER.read().expect("type namer lock poisoned");
    namer(raw)
}

/// Default namer: drop module paths, keep generic structure
pub fn default_type_name(raw: &str) -> String {
    match raw {
        "serde_json::value::Value" => "json".to_string(),
        _ => {
            let mut out = String::with_capacity(raw.len());
            let mut segment = String::new();
            for ch in raw.chars() {
                match ch {
                    ':' => segment.clear(),
                    '<' | '>' | ',' | ' ' | '&' | '(' | ')' | '[' | ']' => {
                        out.push_str(&segment);
                        segment.clear();
                        out.push(ch);
                    }
                    _ => segment.push(ch),
                }
            }
            out.push_str(&segment);
            out
        }
    }
}
