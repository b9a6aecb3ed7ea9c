//! Content rendered into a node outside the owner's parent.

use std::cell::Cell;
use std::rc::Rc;

use crate::dom::Node;
use crate::error::Result;
use crate::view::{connect_chain, AnyView, Blueprint, Renderable, View};

struct PortalView {
    /// Marks the portal's position in the owner's tree.
    placeholder: Node,
    target: Node,
    content: Vec<AnyView>,
    connected: Cell<bool>,
}

/// Render `content` at the end of `target` for as long as the portal itself
/// is connected. The portal occupies only a comment node where it is placed.
pub fn portal(content: impl Into<Renderable>, target: Node) -> Blueprint {
    let blueprints = content.into().into_blueprints();
    Blueprint::from_fn("portal", move |ctx| {
        let content = blueprints
            .iter()
            .map(|blueprint| blueprint.build(ctx))
            .collect::<Result<Vec<_>>>()?;
        let view: AnyView = Rc::new(PortalView {
            placeholder: ctx.app.document().create_comment("portal"),
            target: target.clone(),
            content,
            connected: Cell::new(false),
        });
        Ok(view)
    })
}

impl View for PortalView {
    fn node(&self) -> Node {
        self.placeholder.clone()
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        parent.insert_after(&self.placeholder, after);
        if self.connected.replace(true) {
            return;
        }
        let anchor = self.target.children().last().cloned();
        connect_chain(&self.content, &self.target, anchor.as_ref());
    }

    fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        for view in &self.content {
            view.disconnect();
        }
        self.placeholder.remove();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
