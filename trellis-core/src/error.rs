//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Errors fall into
//! two groups:
//!
//! - Construction errors (bad attribute shapes, invalid setup return values,
//!   two-way attributes without a writable signal). These are returned to the
//!   caller of `build()` and fail fast.
//! - Notification-time errors (a reconciler failing to build a child while
//!   reacting to a signal). These are reported on the debug channel and never
//!   unwind the notification that triggered them.

use serde_json::Value;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the reactive core and the view engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An attribute was given a value whose shape it cannot apply.
    #[error("invalid `{attr}` attribute: expected {expected}, got {actual}")]
    InvalidAttribute {
        attr: String,
        expected: &'static str,
        actual: String,
    },

    /// A component setup function returned something other than a DOM node,
    /// a blueprint or nothing.
    #[error("component `{component}` returned {actual}; expected a DOM node, a blueprint or nothing")]
    InvalidRender { component: String, actual: String },

    /// A two-way (`$$`) attribute was not backed by a writable signal.
    #[error("two-way attribute `{attr}` must be bound to a writable signal")]
    NotWritable { attr: String },

    /// A repeat source emitted something other than a list.
    #[error("repeat expects an array, got {actual}")]
    NotAnArray { actual: String },

    /// A value of an unrecognized shape reached a boundary.
    #[error("expected {expected}, got {actual}")]
    UnexpectedShape {
        expected: &'static str,
        actual: String,
    },

    /// A user computation failed; delivered to observers through
    /// `Signal::emit_error`.
    #[error("computation failed: {0}")]
    Computation(String),
}

impl Error {
    /// Describe the shape of a dynamic value for error messages.
    pub fn shape_of(value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => format!("a boolean ({b})"),
            Value::Number(n) => format!("a number ({n})"),
            Value::String(s) => format!("a string ({s:?})"),
            Value::Array(items) => format!("an array of {} items", items.len()),
            Value::Object(_) => "an object".to_string(),
        }
    }

    pub(crate) fn invalid_attribute(attr: &str, expected: &'static str, actual: String) -> Self {
        Self::InvalidAttribute {
            attr: attr.to_string(),
            expected,
            actual,
        }
    }
}
