//! DOM Nodes
//!
//! A minimal, single-threaded node tree with the operations the view engine
//! needs: creation, insert-after, removal, attributes, class list, style
//! properties, the `value` property and event listeners.
//!
//! Children are held strongly by their parent; the parent link is weak, so
//! detaching a subtree is enough to free it.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    fn new() -> Self {
        thread_local! {
            static COUNTER: Cell<u64> = const { Cell::new(0) };
        }
        COUNTER.with(|counter| {
            let id = counter.get();
            counter.set(id + 1);
            Self(id)
        })
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Element namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Html,
    Svg,
}

/// What kind of node this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String, namespace: Namespace },
    Text,
    Comment,
}

/// Handle for a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An event delivered to listeners.
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    target: Node,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: Node) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }

    /// Event type, e.g. `"click"` or `"input"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> &Node {
        &self.target
    }
}

/// An event listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

#[derive(Default)]
struct NodeData {
    /// Content of text and comment nodes.
    text: String,
    attributes: IndexMap<String, String>,
    classes: IndexSet<String>,
    style: IndexMap<String, String>,
    /// The `value` property of form elements.
    value: String,
    listeners: Vec<(ListenerId, String, Listener)>,
    next_listener: u64,
}

struct NodeInner {
    id: NodeId,
    kind: NodeKind,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    data: RefCell<NodeData>,
}

/// A node in the document tree. Cloning clones the handle.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    fn with_kind(kind: NodeKind, text: String) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId::new(),
                kind,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                data: RefCell::new(NodeData {
                    text,
                    ..NodeData::default()
                }),
            }),
        }
    }

    /// Create an HTML element.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::element_ns(tag, Namespace::Html)
    }

    /// Create an element in the given namespace.
    pub fn element_ns(tag: impl Into<String>, namespace: Namespace) -> Self {
        Self::with_kind(
            NodeKind::Element {
                tag: tag.into(),
                namespace,
            },
            String::new(),
        )
    }

    /// Create a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text, content.into())
    }

    /// Create a comment node.
    pub fn comment(content: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Comment, content.into())
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    /// Tag name of an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.inner.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<Namespace> {
        match &self.inner.kind {
            NodeKind::Element { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Element { .. })
    }

    // ------------------------------------------------------------------------
    // Tree structure
    // ------------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Position of `child` among this node's children.
    pub fn index_of(&self, child: &Node) -> Option<usize> {
        self.inner.children.borrow().iter().position(|c| c == child)
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = parent.index_of(self)?;
        let next = parent.inner.children.borrow().get(index + 1).cloned();
        next
    }

    /// Append `child` as the last child, moving it if it is already attached.
    pub fn append_child(&self, child: &Node) {
        self.insert_after(child, None);
    }

    /// Insert `child` immediately after `after`, or append it when `after`
    /// is `None` or not a child of this node.
    ///
    /// A child that already sits right after `after` is left untouched.
    pub fn insert_after(&self, child: &Node, after: Option<&Node>) {
        if after == Some(child) {
            return;
        }

        let target = after.and_then(|a| self.index_of(a));
        if after.is_some() && target.is_none() {
            tracing::warn!(node = ?child.id(), "insert anchor is not a child of the parent; appending");
        }

        if let Some(current) = self.index_of(child) {
            let in_place = match target {
                Some(anchor) => current == anchor + 1,
                None => current + 1 == self.child_count(),
            };
            if in_place {
                return;
            }
        }

        child.remove();
        let mut children = self.inner.children.borrow_mut();
        let index = after
            .and_then(|a| children.iter().position(|c| c == a))
            .map_or(children.len(), |i| i + 1);
        children.insert(index, child.clone());
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
    }

    /// Detach this node from its parent. No-op when already detached.
    pub fn remove(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent.inner.children.borrow_mut().retain(|c| c != self);
        *self.inner.parent.borrow_mut() = Weak::new();
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    /// Text of a text/comment node, or the concatenated text of an
    /// element's descendants.
    pub fn text_content(&self) -> String {
        match self.inner.kind {
            NodeKind::Text => self.inner.data.borrow().text.clone(),
            NodeKind::Comment => String::new(),
            NodeKind::Element { .. } => self
                .inner
                .children
                .borrow()
                .iter()
                .map(Node::text_content)
                .collect(),
        }
    }

    /// Replace the content of a text or comment node.
    pub fn set_text(&self, content: impl Into<String>) {
        self.inner.data.borrow_mut().text = content.into();
    }

    // ------------------------------------------------------------------------
    // Attributes, classes, style, value
    // ------------------------------------------------------------------------

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        self.inner
            .data
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.inner.data.borrow_mut().attributes.shift_remove(name);
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.data.borrow().attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.data.borrow().attributes.contains_key(name)
    }

    pub fn add_class(&self, name: &str) {
        self.inner.data.borrow_mut().classes.insert(name.to_string());
    }

    pub fn remove_class(&self, name: &str) {
        self.inner.data.borrow_mut().classes.shift_remove(name);
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.inner.data.borrow().classes.contains(name)
    }

    /// Space-separated class list.
    pub fn class_name(&self) -> String {
        let data = self.inner.data.borrow();
        data.classes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
    }

    pub fn set_style(&self, property: &str, value: impl Into<String>) {
        self.inner
            .data
            .borrow_mut()
            .style
            .insert(property.to_string(), value.into());
    }

    pub fn remove_style(&self, property: &str) {
        self.inner.data.borrow_mut().style.shift_remove(property);
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.inner.data.borrow().style.get(property).cloned()
    }

    /// Remove every inline style property.
    pub fn clear_style(&self) {
        self.inner.data.borrow_mut().style.clear();
    }

    /// Inline style serialized as `prop: value; prop: value`.
    pub fn style_text(&self) -> String {
        let data = self.inner.data.borrow();
        data.style
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn set_value(&self, value: impl Into<String>) {
        self.inner.data.borrow_mut().value = value.into();
    }

    pub fn value(&self) -> String {
        self.inner.data.borrow().value.clone()
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn add_event_listener(&self, kind: &str, listener: Listener) -> ListenerId {
        let mut data = self.inner.data.borrow_mut();
        let id = ListenerId(data.next_listener);
        data.next_listener += 1;
        data.listeners.push((id, kind.to_string(), listener));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) {
        self.inner
            .data
            .borrow_mut()
            .listeners
            .retain(|(listener_id, _, _)| *listener_id != id);
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner
            .data
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| k == kind)
            .count()
    }

    /// Dispatch an event of the given type to this node's listeners.
    pub fn dispatch(&self, kind: &str) {
        let listeners: Vec<Listener> = self
            .inner
            .data
            .borrow()
            .listeners
            .iter()
            .filter(|(_, k, _)| k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();

        let event = Event::new(kind, self.clone());
        for listener in listeners {
            listener(&event);
        }
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Serializable copy of this subtree.
    pub fn snapshot(&self) -> NodeSnapshot {
        let data = self.inner.data.borrow();
        match &self.inner.kind {
            NodeKind::Text => NodeSnapshot::Text {
                content: data.text.clone(),
            },
            NodeKind::Comment => NodeSnapshot::Comment {
                content: data.text.clone(),
            },
            NodeKind::Element { tag, namespace } => NodeSnapshot::Element {
                tag: tag.clone(),
                namespace: *namespace,
                attributes: data.attributes.clone(),
                classes: data.classes.iter().cloned().collect(),
                style: data.style.clone(),
                children: self.children().iter().map(Node::snapshot).collect(),
            },
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner.kind {
            NodeKind::Element { tag, .. } => write!(f, "<{tag}#{}>", self.inner.id.0),
            NodeKind::Text => write!(f, "#text({:?})", self.inner.data.borrow().text),
            NodeKind::Comment => write!(f, "<!--{}-->", self.inner.data.borrow().text),
        }
    }
}

/// Serializable view of a node subtree, for debugging and assertions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeSnapshot {
    Element {
        tag: String,
        namespace: Namespace,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        attributes: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        classes: Vec<String>,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        style: IndexMap<String, String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeSnapshot>,
    },
    Text {
        content: String,
    },
    Comment {
        content: String,
    },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(parent: &Node) -> Vec<String> {
        parent
            .children()
            .iter()
            .map(|c| c.tag().map(str::to_string).unwrap_or_else(|| c.text_content()))
            .collect()
    }

    #[test]
    fn insert_after_places_child_behind_anchor() {
        let parent = Node::element("ul");
        let a = Node::element("a");
        let b = Node::element("b");
        let c = Node::element("c");

        parent.append_child(&a);
        parent.append_child(&c);
        parent.insert_after(&b, Some(&a));
        assert_eq!(tags(&parent), vec!["a", "b", "c"]);
        assert_eq!(b.parent(), Some(parent.clone()));
    }

    #[test]
    fn insert_after_moves_attached_nodes() {
        let parent = Node::element("ul");
        let nodes: Vec<_> = ["a", "b", "c"].iter().map(|t| Node::element(*t)).collect();
        for node in &nodes {
            parent.append_child(node);
        }

        parent.insert_after(&nodes[0], Some(&nodes[2]));
        assert_eq!(tags(&parent), vec!["b", "c", "a"]);
        assert_eq!(parent.child_count(), 3);
    }

    #[test]
    fn remove_detaches_and_is_idempotent() {
        let parent = Node::element("div");
        let child = Node::text("hi");
        parent.append_child(&child);

        child.remove();
        child.remove();
        assert!(child.parent().is_none());
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let div = Node::element("div");
        let span = Node::element("span");
        span.append_child(&Node::text("world"));
        div.append_child(&Node::text("hello "));
        div.append_child(&Node::comment("marker"));
        div.append_child(&span);
        assert_eq!(div.text_content(), "hello world");
    }

    #[test]
    fn listeners_receive_events_until_removed() {
        let button = Node::element("button");
        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();
        let id = button.add_event_listener("click", Rc::new(move |event: &Event| {
            assert_eq!(event.kind(), "click");
            c.set(c.get() + 1);
        }));

        button.dispatch("click");
        button.dispatch("input");
        button.remove_event_listener(id);
        button.dispatch("click");
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn snapshot_serializes_structure() {
        let div = Node::element("div");
        div.add_class("card");
        div.set_style("width", "10px");
        div.append_child(&Node::text("x"));

        let json = serde_json::to_value(div.snapshot()).unwrap();
        assert_eq!(json["tag"], "div");
        assert_eq!(json["classes"][0], "card");
        assert_eq!(json["style"]["width"], "10px");
        assert_eq!(json["children"][0]["content"], "x");
    }
}
