//! Ordered list projection without a wrapping element.

use std::rc::Rc;

use super::Slot;
use crate::dom::Node;
use crate::reactive::ReadSignal;
use crate::view::{AnyView, Blueprint, Renderable, View};

struct FragmentView {
    slot: Rc<Slot>,
    source: ReadSignal<Vec<Renderable>>,
}

/// Render `items` in order with no wrapping element.
pub fn fragment(items: Vec<Renderable>) -> Blueprint {
    fragment_cell(ReadSignal::constant(items))
}

/// Render the list `source` holds. Every emission disconnects the current
/// children and rebuilds the whole list.
pub fn fragment_cell(source: impl Into<ReadSignal<Vec<Renderable>>>) -> Blueprint {
    let source = source.into();
    Blueprint::from_fn("fragment", move |ctx| {
        let view: AnyView = Rc::new(FragmentView {
            slot: Rc::new(Slot::new("fragment", ctx)),
            source: source.clone(),
        });
        Ok(view)
    })
}

impl View for FragmentView {
    fn node(&self) -> Node {
        self.slot.placeholder.clone()
    }

    fn last_node(&self) -> Node {
        self.slot.last_node()
    }

    fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        if !self.slot.attach(parent, after) {
            return;
        }
        let slot = Rc::downgrade(&self.slot);
        let subscription = self.source.subscribe(move |items: &Vec<Renderable>| {
            if let Some(slot) = slot.upgrade() {
                let blueprints = items
                    .iter()
                    .cloned()
                    .flat_map(Renderable::into_blueprints)
                    .collect();
                slot.replace("fragment", blueprints);
            }
        });
        self.slot.set_subscription(subscription);
    }

    fn disconnect(&self) {
        self.slot.detach();
    }

    fn subscription_count(&self) -> usize {
        self.slot.subscription_count()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
