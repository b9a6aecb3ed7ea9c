//! Reconcilers
//!
//! Views that derive their children from a changing cell.
//!
//! | Reconciler | Source                      | On every emission                         |
//! |------------|-----------------------------|-------------------------------------------|
//! | [`outlet`]   | `ReadSignal<Renderable>`    | disconnect everything, build the new content |
//! | [`fragment`] | a fixed or changing list    | disconnect everything, rebuild the list   |
//! | [`repeat`]   | a list of items             | keyed diff, reusing item views            |
//!
//! # How Reconcilers Work
//!
//! 1. Every reconciler owns a comment node as its placeholder. The placeholder
//!    is the reconciler's [`View::node`]; children are chained after it, and
//!    [`View::last_node`] is the last node of the last child.
//!
//! 2. The first `connect` inserts the placeholder and then subscribes to the
//!    source. The subscription replays the current value synchronously, so
//!    the initial children are in place when `connect` returns.
//!
//! 3. A `connect` while connected moves the placeholder and repositions the
//!    children after it. No second subscription is created.
//!
//! 4. `disconnect` unsubscribes, disconnects every child and removes the
//!    placeholder.
//!
//! Subscription callbacks hold a `Weak` reference to the reconciler, so a
//! dropped view never stays alive through its source. Errors raised while
//! building children are logged on the framework channel and the update is
//! abandoned; the subscription stays intact.

mod fragment;
mod outlet;
mod portal;
mod repeat;

pub use fragment::{fragment, fragment_cell};
pub use outlet::{cond, outlet};
pub use portal::portal;
pub use repeat::{repeat, repeat_keyed, IntoItems};

use std::cell::{Cell, RefCell};

use crate::debug::DebugChannel;
use crate::dom::Node;
use crate::reactive::Subscription;
use crate::view::{connect_chain, AnyView, Blueprint, BuildContext, View};

/// State shared by every reconciler: placeholder, children and the one
/// source subscription.
pub(crate) struct Slot {
    pub(crate) placeholder: Node,
    pub(crate) build: BuildContext,
    pub(crate) channel: DebugChannel,
    children: RefCell<Vec<AnyView>>,
    subscription: RefCell<Option<Subscription>>,
    connected: Cell<bool>,
}

impl Slot {
    pub(crate) fn new(name: &str, build: &BuildContext) -> Self {
        Self {
            placeholder: build.app.document().create_comment(name),
            build: build.clone(),
            channel: build.app.framework_channel(),
            children: RefCell::new(Vec::new()),
            subscription: RefCell::new(None),
            connected: Cell::new(false),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Insert the placeholder. Returns `true` on the first connect, when the
    /// caller must subscribe; otherwise the children are repositioned.
    pub(crate) fn attach(&self, parent: &Node, after: Option<&Node>) -> bool {
        parent.insert_after(&self.placeholder, after);
        if !self.connected.replace(true) {
            return true;
        }
        let children = self.children.borrow().clone();
        connect_chain(&children, parent, Some(&self.placeholder));
        false
    }

    pub(crate) fn set_subscription(&self, subscription: Subscription) {
        // The source may have been disconnected during its own replay.
        if self.connected.get() {
            *self.subscription.borrow_mut() = Some(subscription);
        } else {
            subscription.unsubscribe();
        }
    }

    /// Unsubscribe, disconnect the children and remove the placeholder.
    pub(crate) fn detach(&self) {
        if !self.connected.replace(false) {
            return;
        }
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        for child in self.children.take() {
            child.disconnect();
        }
        self.placeholder.remove();
    }

    pub(crate) fn last_node(&self) -> Node {
        self.children
            .borrow()
            .last()
            .map_or_else(|| self.placeholder.clone(), |child| child.last_node())
    }

    pub(crate) fn subscription_count(&self) -> usize {
        usize::from(self.subscription.borrow().is_some())
    }

    /// Swap the children out. The caller owns disconnecting them.
    fn take_children(&self) -> Vec<AnyView> {
        self.children.take()
    }

    /// Connect `views` in order after the placeholder and keep them as the
    /// children.
    pub(crate) fn place(&self, views: Vec<AnyView>) {
        if let Some(parent) = self.placeholder.parent() {
            connect_chain(&views, &parent, Some(&self.placeholder));
        }
        *self.children.borrow_mut() = views;
    }

    /// Disconnect every child, then build and connect `blueprints`.
    pub(crate) fn replace(&self, what: &str, blueprints: Vec<Blueprint>) {
        for child in self.take_children() {
            child.disconnect();
        }

        let mut views = Vec::with_capacity(blueprints.len());
        for blueprint in &blueprints {
            match blueprint.build(&self.build) {
                Ok(view) => views.push(view),
                Err(err) => {
                    self.channel
                        .error(format!("{what}: failed to build {}: {err}", blueprint.describe()));
                    return;
                }
            }
        }
        self.place(views);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppContext;
    use crate::view::{h, Attrs};

    #[test]
    fn replace_chains_children_after_placeholder() {
        let slot = Slot::new("slot", &BuildContext::new(AppContext::default()));
        let parent = Node::element("ul");
        let tail = Node::element("footer");
        parent.append_child(&tail);

        assert!(slot.attach(&parent, None));
        parent.insert_after(&tail, Some(&slot.placeholder));
        slot.replace(
            "test",
            vec![h("li", Attrs::new(), vec!["a".into()]), h("li", Attrs::new(), vec!["b".into()])],
        );

        let tags: Vec<_> = parent
            .children()
            .iter()
            .map(|n| n.tag().unwrap_or("#comment").to_string())
            .collect();
        assert_eq!(tags, ["#comment", "li", "li", "footer"]);
        assert_eq!(slot.last_node().text_content(), "b");
    }

    #[test]
    fn detach_is_idempotent() {
        let slot = Slot::new("slot", &BuildContext::new(AppContext::default()));
        let parent = Node::element("div");
        slot.attach(&parent, None);
        slot.replace("test", vec![h("p", Attrs::new(), vec![])]);
        assert_eq!(parent.child_count(), 2);

        slot.detach();
        slot.detach();
        assert_eq!(parent.child_count(), 0);
        assert!(!slot.is_connected());
    }
}
