//! Attribute values.
//!
//! An [`Attr`] is what a blueprint carries for each attribute key: a plain
//! value, a cell to stay in sync with, a writable cell for two-way binding,
//! an event handler, or a nested map/list (for `class` and `style`).
//!
//! The helpers at the bottom of this module define how dynamic values turn
//! into DOM strings: truthiness, text conversion, boolean attributes and
//! the `px` suffix for numeric style properties.

use std::fmt::Debug;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::dom::{Event, Node};
use crate::reactive::{Memo, ReadSignal, Signal};

/// An event handler attached through an `on*` attribute.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

/// The value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    /// A plain value, applied once.
    Static(Value),
    /// A read-only cell; the attribute follows it while connected.
    Bound(ReadSignal<Value>),
    /// A writable cell. `value` binds two-way; elsewhere it reads like `Bound`.
    Writable(Signal<Value>),
    /// An event handler.
    Handler(Handler),
    /// A cell of handlers, resolved when the event fires.
    HandlerCell(ReadSignal<Handler>),
    /// Named entries: class names to flags, or style properties to values.
    Map(IndexMap<String, Attr>),
    /// A list, flattened recursively (classes).
    List(Vec<Attr>),
    /// Receives the element's node while connected.
    Ref(Signal<Option<Node>>),
}

impl Attr {
    /// An event handler attribute.
    pub fn handler(f: impl Fn(&Event) + 'static) -> Self {
        Attr::Handler(Handler::new(f))
    }

    /// A map attribute built from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Attr>,
    {
        Attr::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether this attribute is backed by a cell.
    pub fn is_bound(&self) -> bool {
        matches!(
            self,
            Attr::Bound(_) | Attr::Writable(_) | Attr::HandlerCell(_)
        )
    }

    /// Current value of a value-like attribute.
    pub fn current(&self) -> Option<Value> {
        match self {
            Attr::Static(value) => Some(value.clone()),
            Attr::Bound(cell) => Some(cell.get()),
            Attr::Writable(cell) => Some(cell.get()),
            _ => None,
        }
    }

    /// A cell over a value-like attribute.
    pub fn as_cell(&self) -> Option<ReadSignal<Value>> {
        match self {
            Attr::Static(value) => Some(ReadSignal::constant(value.clone())),
            Attr::Bound(cell) => Some(cell.clone()),
            Attr::Writable(cell) => Some(cell.read_only()),
            _ => None,
        }
    }

    /// Human-readable shape, for error messages.
    pub fn shape(&self) -> String {
        match self {
            Attr::Static(value) => crate::Error::shape_of(value),
            Attr::Bound(_) => "a read-only cell".to_string(),
            Attr::Writable(_) => "a writable cell".to_string(),
            Attr::Handler(_) => "a handler".to_string(),
            Attr::HandlerCell(_) => "a cell of handlers".to_string(),
            Attr::Map(_) => "a map".to_string(),
            Attr::List(_) => "a list".to_string(),
            Attr::Ref(_) => "a node ref".to_string(),
        }
    }
}

impl From<Value> for Attr {
    fn from(value: Value) -> Self {
        Attr::Static(value)
    }
}

impl From<&str> for Attr {
    fn from(value: &str) -> Self {
        Attr::Static(Value::from(value))
    }
}

macro_rules! impl_static_attr {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Attr {
                fn from(value: $ty) -> Self {
                    Attr::Static(Value::from(value))
                }
            }
        )*
    };
}

impl_static_attr!(String, bool, i32, i64, u32, u64, usize, f64);

impl From<Signal<Value>> for Attr {
    fn from(cell: Signal<Value>) -> Self {
        Attr::Writable(cell)
    }
}

impl From<&Signal<Value>> for Attr {
    fn from(cell: &Signal<Value>) -> Self {
        Attr::Writable(cell.clone())
    }
}

impl From<ReadSignal<Value>> for Attr {
    fn from(cell: ReadSignal<Value>) -> Self {
        Attr::Bound(cell)
    }
}

impl From<Memo<Value>> for Attr {
    fn from(cell: Memo<Value>) -> Self {
        Attr::Bound(cell.read_only())
    }
}

// Cells of plain types bind read-only through a converting memo.
macro_rules! impl_bound_attr {
    ($($ty:ty),*) => {
        $(
            impl From<Signal<$ty>> for Attr {
                fn from(cell: Signal<$ty>) -> Self {
                    Attr::Bound(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }

            impl From<&Signal<$ty>> for Attr {
                fn from(cell: &Signal<$ty>) -> Self {
                    Attr::Bound(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }

            impl From<Memo<$ty>> for Attr {
                fn from(cell: Memo<$ty>) -> Self {
                    Attr::Bound(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }

            impl From<ReadSignal<$ty>> for Attr {
                fn from(cell: ReadSignal<$ty>) -> Self {
                    Attr::Bound(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }
        )*
    };
}

impl_bound_attr!(String, bool, i32, i64, f64);

impl From<Handler> for Attr {
    fn from(handler: Handler) -> Self {
        Attr::Handler(handler)
    }
}

impl From<ReadSignal<Handler>> for Attr {
    fn from(cell: ReadSignal<Handler>) -> Self {
        Attr::HandlerCell(cell)
    }
}

impl From<Signal<Handler>> for Attr {
    fn from(cell: Signal<Handler>) -> Self {
        Attr::HandlerCell(cell.read_only())
    }
}

impl From<Signal<Option<Node>>> for Attr {
    fn from(cell: Signal<Option<Node>>) -> Self {
        Attr::Ref(cell)
    }
}

impl From<IndexMap<String, Attr>> for Attr {
    fn from(map: IndexMap<String, Attr>) -> Self {
        Attr::Map(map)
    }
}

impl<K: Into<String>, V: Into<Attr>, const N: usize> From<[(K, V); N]> for Attr {
    fn from(entries: [(K, V); N]) -> Self {
        Attr::map(entries)
    }
}

impl From<Vec<Attr>> for Attr {
    fn from(list: Vec<Attr>) -> Self {
        Attr::List(list)
    }
}

/// An ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs(IndexMap<String, Attr>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Attr>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Attr>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Attr> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attr)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Attr>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attrs::new();
        for (key, value) in iter {
            attrs.insert(key, value);
        }
        attrs
    }
}

impl IntoIterator for Attrs {
    type Item = (String, Attr);
    type IntoIter = indexmap::map::IntoIter<String, Attr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ----------------------------------------------------------------------------
// Value coercion
// ----------------------------------------------------------------------------

/// Attributes whose presence alone means "on".
pub const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen",
    "async",
    "autofocus",
    "autoplay",
    "checked",
    "controls",
    "default",
    "defer",
    "disabled",
    "formnovalidate",
    "hidden",
    "inert",
    "ismap",
    "itemscope",
    "loop",
    "multiple",
    "muted",
    "nomodule",
    "novalidate",
    "open",
    "playsinline",
    "readonly",
    "required",
    "reversed",
    "selected",
];

pub fn is_boolean_attribute(name: &str) -> bool {
    BOOLEAN_ATTRIBUTES.contains(&name)
}

/// Loose truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of a value as it would appear in the DOM.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// The DOM string for an attribute, or `None` to remove it.
pub fn attribute_text(name: &str, value: &Value) -> Option<String> {
    if !truthy(value) {
        return None;
    }
    if is_boolean_attribute(name) {
        Some(String::new())
    } else {
        Some(to_text(value))
    }
}

/// The DOM string for a style property, or `None` to remove it.
///
/// Numbers get a `px` suffix unless the property is a custom property.
pub fn style_text(property: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if property.starts_with("--") => Some(n.to_string()),
        Value::Number(n) => Some(format!("{n}px")),
        other => Some(to_text(other)),
    }
}

/// Parse `"color: red; width: 10px"` into property/value pairs.
pub fn parse_style(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            (!property.is_empty()).then(|| (property.to_string(), value.to_string()))
        })
        .collect()
}

/// Convert a DOM string to the type of `previous`: numbers parse, booleans
/// are true unless empty or `"false"`, anything else stays a string.
///
/// Returns `None` when a number fails to parse.
pub fn coerce_like(previous: &Value, input: &str) -> Option<Value> {
    match previous {
        Value::Number(_) => {
            let trimmed = input.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                Some(Value::from(int))
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }
        }
        Value::Bool(_) => Some(Value::Bool(!input.is_empty() && input != "false")),
        _ => Some(Value::String(input.to_string())),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_loose_rules() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!(-1.5)));
    }

    #[test]
    fn boolean_attributes_render_empty() {
        assert_eq!(attribute_text("disabled", &json!(true)), Some(String::new()));
        assert_eq!(attribute_text("disabled", &json!("yes")), Some(String::new()));
        assert_eq!(attribute_text("disabled", &json!(false)), None);
        assert_eq!(attribute_text("title", &json!("hi")), Some("hi".to_string()));
        assert_eq!(attribute_text("tabindex", &json!(2)), Some("2".to_string()));
        assert_eq!(attribute_text("title", &json!(null)), None);
    }

    #[test]
    fn numeric_styles_get_px_except_custom_properties() {
        assert_eq!(style_text("width", &json!(10)), Some("10px".to_string()));
        assert_eq!(style_text("--gap", &json!(4)), Some("4".to_string()));
        assert_eq!(style_text("color", &json!("red")), Some("red".to_string()));
        assert_eq!(style_text("color", &json!(null)), None);
    }

    #[test]
    fn style_strings_parse_into_declarations() {
        assert_eq!(
            parse_style("color: red; width:10px;; :bad"),
            vec![
                ("color".to_string(), "red".to_string()),
                ("width".to_string(), "10px".to_string()),
            ]
        );
    }

    #[test]
    fn coercion_follows_the_previous_type() {
        assert_eq!(coerce_like(&json!(1), "42"), Some(json!(42)));
        assert_eq!(coerce_like(&json!(1), "2.5"), Some(json!(2.5)));
        assert_eq!(coerce_like(&json!(1), "abc"), None);
        assert_eq!(coerce_like(&json!(false), "on"), Some(json!(true)));
        assert_eq!(coerce_like(&json!(true), "false"), Some(json!(false)));
        assert_eq!(coerce_like(&json!(true), ""), Some(json!(false)));
        assert_eq!(coerce_like(&json!("x"), "7"), Some(json!("7")));
        assert_eq!(coerce_like(&json!(null), "7"), Some(json!("7")));
    }

    #[test]
    fn attrs_builder_keeps_insertion_order() {
        let attrs = Attrs::new()
            .with("id", "main")
            .with("class", [("active", true), ("hidden", false)])
            .with("tabindex", 3);

        let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "class", "tabindex"]);
        assert!(matches!(attrs.get("class"), Some(Attr::Map(map)) if map.len() == 2));
    }

    #[test]
    fn cells_of_plain_types_bind_read_only() {
        let flag = Signal::new(true);
        let attr = Attr::from(&flag);
        assert!(attr.is_bound());
        assert_eq!(attr.current(), Some(json!(true)));

        flag.set(false);
        assert_eq!(attr.current(), Some(json!(false)));
    }
}
