//! Element View
//!
//! Turns a tag, an attribute map and child blueprints into a live element,
//! and keeps cell-backed attributes in sync while connected.
//!
//! # How Bindings Work
//!
//! Building the view applies every static attribute immediately and turns
//! each cell-backed attribute into a *binding*: a closure that subscribes
//! when the view connects and yields one [`Subscription`]. All of them are
//! kept in a single list and unsubscribed on disconnect.
//!
//! | key        | accepts                                        | behavior |
//! |------------|------------------------------------------------|----------|
//! | `value`    | value, cell, writable cell                     | writable cells bind two-way through `input` events |
//! | `class`    | string, map of flags, list, cell               | whole-cell changes re-apply on the next frame |
//! | `style`    | string, map of properties, cell                | numbers get `px`, custom properties don't |
//! | `on*`      | handler, cell of handlers                      | cells are read when the event fires |
//! | `ref`      | `Signal<Option<Node>>`                         | holds the node while connected |
//! | other      | value, cell                                    | falsy removes the attribute |
//!
//! A whole-cell `class` or `style` binding applies its first value while
//! connecting. Later values are coalesced and written on the next animation
//! frame (see [`crate::dom::Document::flush_frames`]).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::attrs::{attribute_text, coerce_like, parse_style, style_text, to_text, truthy, Attr, Attrs};
use super::blueprint::Blueprint;
use super::{connect_chain, AnyView, BuildContext, ElementContext, View};
use crate::debug::DebugChannel;
use crate::dom::{Document, Event, FrameHandle, Namespace, Node};
use crate::error::{Error, Result};
use crate::reactive::{ReadSignal, Signal, Subscription};

/// Starts one attribute binding; runs on every connect.
type Binding = Box<dyn Fn() -> Subscription>;

/// A DOM element with its attribute bindings and child views.
pub struct ElementView {
    node: Node,
    bindings: Vec<Binding>,
    refs: Vec<Signal<Option<Node>>>,
    children: Vec<AnyView>,
    subscriptions: RefCell<Vec<Subscription>>,
    connected: Cell<bool>,
}

impl ElementView {
    /// Create the element, apply static attributes and build the children.
    pub fn build(tag: &str, attrs: &Attrs, children: &[Blueprint], ctx: &BuildContext) -> Result<Self> {
        let is_svg = ctx.element.is_svg || tag == "svg";
        let namespace = if is_svg { Namespace::Svg } else { Namespace::Html };

        let mut view = Self {
            node: ctx.app.document().create_element(tag, namespace),
            bindings: Vec::new(),
            refs: Vec::new(),
            children: Vec::new(),
            subscriptions: RefCell::new(Vec::new()),
            connected: Cell::new(false),
        };

        let scope = BindScope {
            document: ctx.app.document().clone(),
            channel: ctx.app.framework_channel(),
        };
        for (key, attr) in attrs.iter() {
            view.apply(key, attr, &scope)?;
        }

        let child_ctx = ctx.with_element(ElementContext { is_svg });
        view.children = children
            .iter()
            .map(|child| child.build(&child_ctx))
            .collect::<Result<_>>()?;

        Ok(view)
    }

    pub fn children(&self) -> &[AnyView] {
        &self.children
    }

    fn apply(&mut self, key: &str, attr: &Attr, scope: &BindScope) -> Result<()> {
        match key {
            "value" => self.apply_value(attr, scope),
            "class" => {
                let owners = ClassOwners::new(&self.node);
                self.apply_class(attr, &owners, scope)
            }
            "style" => self.apply_style(attr, scope),
            "ref" => match attr {
                Attr::Ref(cell) => {
                    self.refs.push(cell.clone());
                    Ok(())
                }
                other => Err(Error::invalid_attribute("ref", "a node ref", other.shape())),
            },
            _ if is_event_key(key) => self.apply_event(key, attr),
            _ => self.apply_attribute(key, attr),
        }
    }

    // ------------------------------------------------------------------------
    // Generic attributes and events
    // ------------------------------------------------------------------------

    fn apply_attribute(&mut self, key: &str, attr: &Attr) -> Result<()> {
        let cell = match attr {
            Attr::Static(value) => {
                if let Some(text) = attribute_text(key, value) {
                    self.node.set_attribute(key, text);
                }
                return Ok(());
            }
            Attr::Bound(cell) => cell.clone(),
            Attr::Writable(cell) => cell.read_only(),
            other => return Err(Error::invalid_attribute(key, "a value or a cell", other.shape())),
        };

        let node = self.node.clone();
        let name = key.to_string();
        self.bindings.push(Box::new(move || {
            let node = node.clone();
            let name = name.clone();
            cell.subscribe(move |value: &Value| match attribute_text(&name, value) {
                Some(text) => node.set_attribute(&name, text),
                None => node.remove_attribute(&name),
            })
        }));
        Ok(())
    }

    fn apply_event(&mut self, key: &str, attr: &Attr) -> Result<()> {
        let event = key[2..].to_lowercase();
        match attr {
            Attr::Handler(handler) => {
                let handler = handler.clone();
                self.node
                    .add_event_listener(&event, Rc::new(move |e: &Event| handler.call(e)));
            }
            Attr::HandlerCell(cell) => {
                let cell = cell.clone();
                self.node
                    .add_event_listener(&event, Rc::new(move |e: &Event| cell.get().call(e)));
            }
            Attr::Static(Value::Null) => {}
            other => {
                return Err(Error::invalid_attribute(
                    key,
                    "a handler or a cell of handlers",
                    other.shape(),
                ))
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // value
    // ------------------------------------------------------------------------

    fn apply_value(&mut self, attr: &Attr, scope: &BindScope) -> Result<()> {
        let node = self.node.clone();
        match attr {
            Attr::Static(value) => node.set_value(to_text(value)),
            Attr::Bound(cell) => {
                let cell = cell.clone();
                self.bindings.push(Box::new(move || {
                    let node = node.clone();
                    cell.subscribe(move |value: &Value| write_value(&node, value))
                }));
            }
            Attr::Writable(cell) => {
                let cell = cell.clone();
                let channel = scope.channel.clone();
                self.bindings
                    .push(Box::new(move || bind_two_way(&node, &cell, &channel)));
            }
            other => return Err(Error::invalid_attribute("value", "a value or a cell", other.shape())),
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // class
    // ------------------------------------------------------------------------

    fn apply_class(&mut self, attr: &Attr, owners: &ClassOwners, scope: &BindScope) -> Result<()> {
        match attr {
            Attr::Static(value) => {
                for name in class_names(value)? {
                    owners.add(&name);
                }
            }
            Attr::Bound(cell) => self.bind_whole(Target::Class(owners.clone()), cell.clone(), scope),
            Attr::Writable(cell) => self.bind_whole(Target::Class(owners.clone()), cell.read_only(), scope),
            Attr::Map(entries) => {
                for (name, flag) in entries {
                    let cell = match flag {
                        Attr::Static(value) => {
                            if truthy(value) {
                                owners.add(name);
                            }
                            continue;
                        }
                        Attr::Bound(cell) => cell.clone(),
                        Attr::Writable(cell) => cell.read_only(),
                        other => {
                            return Err(Error::invalid_attribute(
                                "class",
                                "a flag or a cell of flags",
                                other.shape(),
                            ))
                        }
                    };

                    // Whether this flag currently holds the name; kept across
                    // reconnects like the node's classes are.
                    let held = Rc::new(Cell::new(false));
                    let owners = owners.clone();
                    let name = name.clone();
                    self.bindings.push(Box::new(move || {
                        let (owners, name, held) = (owners.clone(), name.clone(), held.clone());
                        cell.subscribe(move |flag: &Value| {
                            let on = truthy(flag);
                            if on != held.replace(on) {
                                if on {
                                    owners.add(&name);
                                } else {
                                    owners.remove(&name);
                                }
                            }
                        })
                    }));
                }
            }
            Attr::List(items) => {
                for item in items {
                    self.apply_class(item, owners, scope)?;
                }
            }
            other => {
                return Err(Error::invalid_attribute(
                    "class",
                    "a string, map, list or cell",
                    other.shape(),
                ))
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // style
    // ------------------------------------------------------------------------

    fn apply_style(&mut self, attr: &Attr, scope: &BindScope) -> Result<()> {
        match attr {
            Attr::Static(value) => {
                for (property, text) in style_declarations(value)? {
                    write_style(&self.node, &property, text);
                }
            }
            Attr::Bound(cell) => self.bind_whole(Target::Style, cell.clone(), scope),
            Attr::Writable(cell) => self.bind_whole(Target::Style, cell.read_only(), scope),
            Attr::Map(entries) => {
                for (property, value) in entries {
                    let cell = match value {
                        Attr::Static(value) => {
                            write_style(&self.node, property, style_text(property, value));
                            continue;
                        }
                        Attr::Bound(cell) => cell.clone(),
                        Attr::Writable(cell) => cell.read_only(),
                        other => {
                            return Err(Error::invalid_attribute(
                                "style",
                                "a value or a cell",
                                other.shape(),
                            ))
                        }
                    };

                    let node = self.node.clone();
                    let property = property.clone();
                    self.bindings.push(Box::new(move || {
                        let node = node.clone();
                        let property = property.clone();
                        cell.subscribe(move |value: &Value| {
                            write_style(&node, &property, style_text(&property, value))
                        })
                    }));
                }
            }
            other => return Err(Error::invalid_attribute("style", "a string, map or cell", other.shape())),
        }
        Ok(())
    }

    fn bind_whole(&mut self, target: Target, cell: ReadSignal<Value>, scope: &BindScope) {
        let state = Rc::new(WholeValue {
            node: self.node.clone(),
            target,
            document: scope.document.clone(),
            channel: scope.channel.clone(),
            applied: RefCell::new(Vec::new()),
            pending: RefCell::new(None),
            frame: Cell::new(None),
        });

        self.bindings.push(Box::new(move || {
            let first = Cell::new(true);
            let observer = state.clone();
            let outer = cell.subscribe(move |value: &Value| {
                if first.replace(false) {
                    observer.apply(value);
                } else {
                    WholeValue::schedule(&observer, value);
                }
            });

            let state = state.clone();
            Subscription::from_teardown(move || {
                outer.unsubscribe();
                state.cancel();
            })
        }));
    }
}

impl View for ElementView {
    fn node(&self) -> Node {
        self.node.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        if self.connected.replace(true) {
            parent.insert_after(&self.node, after);
            return;
        }

        let subscriptions: Vec<Subscription> = self.bindings.iter().map(|bind| bind()).collect();
        *self.subscriptions.borrow_mut() = subscriptions;

        connect_chain(&self.children, &self.node, None);
        parent.insert_after(&self.node, after);

        for cell in &self.refs {
            cell.set(Some(self.node.clone()));
        }
    }

    fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }

        let subscriptions = self.subscriptions.take();
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        for child in &self.children {
            child.disconnect();
        }
        self.node.remove();

        for cell in &self.refs {
            cell.set(None);
        }
    }

    fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }
}

/// Shared services for the bindings of one element.
struct BindScope {
    document: Document,
    channel: DebugChannel,
}

fn is_event_key(key: &str) -> bool {
    key.len() > 2 && key.starts_with("on")
}

// ----------------------------------------------------------------------------
// Two-way value binding
// ----------------------------------------------------------------------------

fn write_value(node: &Node, value: &Value) {
    // Leave the DOM alone when it already holds an equivalent string, so
    // typing "2.50" into a number field is not rewritten to "2.5".
    if coerce_like(value, &node.value()).as_ref() != Some(value) {
        node.set_value(to_text(value));
    }
}

fn bind_two_way(node: &Node, cell: &Signal<Value>, channel: &DebugChannel) -> Subscription {
    let target = node.clone();
    let outbound = cell.subscribe(move |value: &Value| write_value(&target, value));

    let writer = cell.clone();
    let channel = channel.clone();
    let listener = node.add_event_listener(
        "input",
        Rc::new(move |event: &Event| {
            let input = event.target().value();
            let previous = writer.get();
            match coerce_like(&previous, &input) {
                Some(next) => {
                    writer.set(next);
                }
                None => channel.warn(format!(
                    "ignoring input {input:?}: not a number (value stays {previous})"
                )),
            }
        }),
    );

    let node = node.clone();
    Subscription::from_teardown(move || {
        outbound.unsubscribe();
        node.remove_event_listener(listener);
    })
}

// ----------------------------------------------------------------------------
// Whole-value class and style bindings
// ----------------------------------------------------------------------------

enum Target {
    Class(ClassOwners),
    Style,
}

/// Contributor counts for the class names of one element's `class`
/// attribute. Static entries, flag cells and whole-value cells in the same
/// list may add the same name; it leaves the node with its last contributor.
#[derive(Clone)]
struct ClassOwners {
    node: Node,
    counts: Rc<RefCell<HashMap<String, usize>>>,
}

impl ClassOwners {
    fn new(node: &Node) -> Self {
        Self {
            node: node.clone(),
            counts: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    fn add(&self, name: &str) {
        let mut counts = self.counts.borrow_mut();
        let count = counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.node.add_class(name);
        }
    }

    fn remove(&self, name: &str) {
        let mut counts = self.counts.borrow_mut();
        match counts.get_mut(name) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(name);
                self.node.remove_class(name);
            }
            None => {}
        }
    }
}

/// State of a `class` or `style` attribute bound to a single cell.
///
/// `applied` survives reconnects so a value that changed while the view was
/// disconnected still clears what the previous value added.
struct WholeValue {
    node: Node,
    target: Target,
    document: Document,
    channel: DebugChannel,
    /// Class names or style properties written by the last apply.
    applied: RefCell<Vec<String>>,
    pending: RefCell<Option<Value>>,
    frame: Cell<Option<FrameHandle>>,
}

impl WholeValue {
    fn apply(&self, value: &Value) {
        let result = match &self.target {
            Target::Class(owners) => class_names(value).map(|names| {
                // New names first, so a name kept by both values stays put.
                for name in &names {
                    owners.add(name);
                }
                self.clear();
                names
            }),
            Target::Style => style_declarations(value).map(|declarations| {
                self.clear();
                let mut written = Vec::with_capacity(declarations.len());
                for (property, text) in declarations {
                    if text.is_some() {
                        written.push(property.clone());
                    }
                    write_style(&self.node, &property, text);
                }
                written
            }),
        };

        match result {
            Ok(applied) => *self.applied.borrow_mut() = applied,
            Err(error) => self.channel.error(error),
        }
    }

    fn clear(&self) {
        for name in self.applied.take() {
            match &self.target {
                Target::Class(owners) => owners.remove(&name),
                Target::Style => self.node.remove_style(&name),
            }
        }
    }

    /// Keep the latest value and write it on the next frame.
    fn schedule(this: &Rc<Self>, value: &Value) {
        *this.pending.borrow_mut() = Some(value.clone());
        if this.frame.get().is_some() {
            return;
        }

        let weak = Rc::downgrade(this);
        let handle = this.document.request_frame(move || {
            if let Some(state) = weak.upgrade() {
                state.flush();
            }
        });
        this.frame.set(Some(handle));
    }

    fn flush(&self) {
        self.frame.set(None);
        let pending = self.pending.take();
        if let Some(value) = pending {
            self.apply(&value);
        }
    }

    fn cancel(&self) {
        if let Some(handle) = self.frame.take() {
            self.document.frames().cancel(handle);
        }
        self.pending.take();
    }
}

fn class_names(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => Ok(text.split_whitespace().map(str::to_string).collect()),
        Value::Array(items) => {
            let mut names = Vec::new();
            for item in items {
                names.extend(class_names(item)?);
            }
            Ok(names)
        }
        Value::Object(flags) => Ok(flags
            .iter()
            .filter(|(_, flag)| truthy(flag))
            .map(|(name, _)| name.clone())
            .collect()),
        other => Err(Error::invalid_attribute(
            "class",
            "a string, object or array",
            Error::shape_of(other),
        )),
    }
}

fn style_declarations(value: &Value) -> Result<Vec<(String, Option<String>)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => Ok(parse_style(text)
            .into_iter()
            .map(|(property, value)| (property, Some(value)))
            .collect()),
        Value::Object(properties) => Ok(properties
            .iter()
            .map(|(property, value)| (property.clone(), style_text(property, value)))
            .collect()),
        other => Err(Error::invalid_attribute(
            "style",
            "a string or object",
            Error::shape_of(other),
        )),
    }
}

fn write_style(node: &Node, property: &str, text: Option<String>) {
    match text {
        Some(text) => node.set_style(property, text),
        None => node.remove_style(property),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
