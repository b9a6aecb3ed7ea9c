//! Leaf views: text nodes and pre-built DOM nodes.

use std::cell::{Cell, RefCell};

use serde_json::Value;

use super::attrs::to_text;
use super::View;
use crate::dom::Node;
use crate::reactive::{ReadSignal, Subscription};

/// A text node, either fixed or following a cell.
pub struct TextView {
    node: Node,
    source: Option<ReadSignal<Value>>,
    subscription: RefCell<Option<Subscription>>,
    connected: Cell<bool>,
}

impl TextView {
    pub fn new(node: Node, source: Option<ReadSignal<Value>>) -> Self {
        Self {
            node,
            source,
            subscription: RefCell::new(None),
            connected: Cell::new(false),
        }
    }
}

impl View for TextView {
    fn node(&self) -> Node {
        self.node.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        if !self.connected.replace(true) {
            if let Some(source) = &self.source {
                let node = self.node.clone();
                let subscription = source.subscribe(move |value: &Value| node.set_text(to_text(value)));
                *self.subscription.borrow_mut() = Some(subscription);
            }
        }
        parent.insert_after(&self.node, after);
    }

    fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        self.node.remove();
    }

    fn subscription_count(&self) -> usize {
        usize::from(self.subscription.borrow().is_some())
    }
}

/// A DOM node handed to the renderer as-is.
pub struct NodeView {
    node: Node,
    connected: Cell<bool>,
}

impl NodeView {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            connected: Cell::new(false),
        }
    }
}

impl View for NodeView {
    fn node(&self) -> Node {
        self.node.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        self.connected.set(true);
        parent.insert_after(&self.node, after);
    }

    fn disconnect(&self) {
        if self.connected.replace(false) {
            self.node.remove();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
