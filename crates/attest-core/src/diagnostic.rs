//! Diagnostic log protocol
//!
//! Every emitted event carries an ordered list of key/value pairs. Keys
//! beginning with a double underscore are structural and reserved for the
//! protocol itself; all other keys are free-form user labels, and an
//! absent key means the entry is positional. Pending entries hold erased
//! [`Value`]s; at dispatch time they render into [`KeyString`]s, which is
//! the only form handlers see.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source file of the emitting assertion
pub const KEY_FILE: &str = "__file";
/// Source line of the emitting assertion
pub const KEY_LINE: &str = "__line";
/// Free-text comment attached to an event
pub const KEY_COMMENT: &str = "__comment";
/// Rendered left operand of a comparison
pub const KEY_LHS: &str = "__lhs";
/// Rendered right operand of a comparison
pub const KEY_RHS: &str = "__rhs";
/// Operator symbol of a comparison
pub const KEY_OP: &str = "__op";

/// One pending log entry: optional key plus an erased value
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    /// Label, `None` for positional entries
    pub key: Option<String>,
    /// Erased payload, rendered at dispatch time
    pub value: Value,
}

impl KeyValue {
    /// Positional entry
    pub fn positional(value: impl Into<Value>) -> Self {
        KeyValue {
            key: None,
            value: value.into(),
        }
    }

    /// Labeled entry
    pub fn keyed(key: impl Into<String>, value: impl Into<Value>) -> Self {
        KeyValue {
            key: Some(key.into()),
            value: value.into(),
        }
    }
}

/// One rendered log entry as delivered to handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyString {
    /// Label, `None` for positional entries
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
    /// Stringified payload
    pub value: String,
}

impl KeyString {
    /// Render a pending entry
    pub fn render(entry: &KeyValue) -> Self {
        KeyString {
            key: entry.key.clone(),
            value: entry.value.to_string(),
        }
    }

    /// Whether the key is one of the reserved structural fields
    pub fn is_structural(&self) -> bool {
        self.key.as_deref().is_some_and(|k| k.starts_with("__"))
    }
}

/// Comparison operator attached to assertion diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `~`, tolerance-aware equality
    Near,
}

impl Op {
    /// Operator symbol as it appears under `__op`
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::Near => "~",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Structural record for a failed or passed comparison
pub(crate) fn comparison(lhs: String, rhs: String, op: Op) -> [KeyValue; 3] {
    [
        KeyValue::keyed(KEY_LHS, lhs),
        KeyValue::keyed(KEY_RHS, rhs),
        KeyValue::keyed(KEY_OP, op.symbol()),
    ]
}
