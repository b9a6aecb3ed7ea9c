//! Full-replace reconciler.

use std::rc::Rc;

use super::Slot;
use crate::dom::Node;
use crate::reactive::ReadSignal;
use crate::view::{AnyView, Blueprint, Renderable, View};

struct OutletView {
    slot: Rc<Slot>,
    source: ReadSignal<Renderable>,
}

/// Render whatever `source` currently holds.
///
/// Every emission disconnects all current children and builds the new
/// content from scratch; nothing is reused. `null` and empty content render
/// nothing.
///
/// ```rust
/// use trellis_core::reactive::Signal;
/// use trellis_core::reconcile::outlet;
/// use trellis_core::view::{h, Attrs, Renderable};
///
/// let page = Signal::new(Renderable::from(h("p", Attrs::new(), vec!["home".into()])));
/// let blueprint = outlet(&page);
/// # let _ = blueprint;
/// ```
pub fn outlet(source: impl Into<ReadSignal<Renderable>>) -> Blueprint {
    let source = source.into();
    Blueprint::from_fn("outlet", move |ctx| {
        let view: AnyView = Rc::new(OutletView {
            slot: Rc::new(Slot::new("outlet", ctx)),
            source: source.clone(),
        });
        Ok(view)
    })
}

/// Render `then` while `condition` is true and `otherwise` while it is false.
pub fn cond(
    condition: impl Into<ReadSignal<bool>>,
    then: impl Into<Renderable>,
    otherwise: impl Into<Renderable>,
) -> Blueprint {
    let (then, otherwise) = (then.into(), otherwise.into());
    let content = condition.into().map(move |on: &bool| {
        if *on {
            then.clone()
        } else {
            otherwise.clone()
        }
    });
    outlet(content)
}

impl View for OutletView {
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
        let subscription = self.source.subscribe(move |content: &Renderable| {
            if let Some(slot) = slot.upgrade() {
                slot.replace("outlet", content.clone().into_blueprints());
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppContext;
    use crate::component::Component;
    use crate::reactive::Signal;
    use crate::view::{h, Attrs, BuildContext};
    use serde_json::{json, Value};
    use std::cell::Cell;

    fn connect(blueprint: &Blueprint) -> (AnyView, Node) {
        let view = blueprint.build(&BuildContext::new(AppContext::default())).unwrap();
        let parent = Node::element("main");
        view.connect(&parent, None);
        (view, parent)
    }

    #[test]
    fn replaces_content_wholesale() {
        let a = h("p", Attrs::new(), vec!["A".into()]);
        let b = h("p", Attrs::new(), vec!["B".into()]);
        let content = Signal::new(Renderable::from(a));

        let (view, parent) = connect(&outlet(&content));
        assert_eq!(parent.text_content(), "A");
        let first = view.last_node();

        content.set(Renderable::Value(Value::Null));
        assert_eq!(parent.text_content(), "");
        assert_eq!(parent.child_count(), 1);
        assert!(first.parent().is_none());

        content.set(Renderable::from(b));
        assert_eq!(parent.text_content(), "B");
        assert_ne!(view.last_node(), first);
    }

    #[test]
    fn rebuilt_components_run_setup_again() {
        let setups = Rc::new(Cell::new(0));
        let component = {
            let setups = setups.clone();
            Component::new("page", move |_| {
                setups.set(setups.get() + 1);
                Ok(h("section", Attrs::new(), vec![]).into())
            })
        };
        let content = Signal::new(Renderable::from(h(&component, Attrs::new(), vec![])));
        let (_view, _parent) = connect(&outlet(&content));

        content.set(Renderable::Empty);
        content.set(Renderable::from(h(&component, Attrs::new(), vec![])));
        assert_eq!(setups.get(), 2);
    }

    #[test]
    fn arrays_and_lazy_content_flatten() {
        let content = Signal::new(Renderable::Value(json!(["a", 1, null, true])));
        let (_view, parent) = connect(&outlet(&content));
        assert_eq!(parent.text_content(), "a1true");

        content.set(Renderable::lazy(|| "lazy".into()));
        assert_eq!(parent.text_content(), "lazy");
    }

    #[test]
    fn reconnect_keeps_single_subscription() {
        let content = Signal::new(Renderable::from("x"));
        let (view, parent) = connect(&outlet(&content));
        view.connect(&parent, None);
        assert_eq!(content.observer_count(), 1);
        assert_eq!(parent.text_content(), "x");

        view.disconnect();
        view.disconnect();
        assert_eq!(content.observer_count(), 0);
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn siblings_stay_after_changing_content() {
        let content = Signal::new(Renderable::from("one"));
        let blueprint = h(
            "div",
            Attrs::new(),
            vec![outlet(&content).into(), "|end".into()],
        );
        let (view, _) = connect(&blueprint);

        content.set(Renderable::List(vec!["two".into(), "three".into()]));
        assert_eq!(view.node().text_content(), "twothree|end");
    }

    #[test]
    fn cond_switches_branches() {
        let on = Signal::new(true);
        let (_view, parent) = connect(&cond(&on, "yes", "no"));
        assert_eq!(parent.text_content(), "yes");

        on.set(false);
        assert_eq!(parent.text_content(), "no");
    }

    #[test]
    fn build_errors_are_contained() {
        let bad = Component::new("bad", |_| Ok("text".into()));
        let content = Signal::new(Renderable::from("ok"));
        let (view, parent) = connect(&outlet(&content));

        content.set(Renderable::from(h(&bad, Attrs::new(), vec![])));
        assert_eq!(parent.text_content(), "");
        assert!(view.is_connected());

        content.set(Renderable::from("recovered"));
        assert_eq!(parent.text_content(), "recovered");
    }
}
