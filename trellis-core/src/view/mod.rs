//! Blueprints and Views
//!
//! A [`Blueprint`] is an inert description of something to render. Building
//! it produces a [`View`]: the live counterpart that owns DOM nodes and
//! subscriptions.
//!
//! # How Views Work
//!
//! 1. `Blueprint::build(ctx)` creates DOM nodes and validates attributes.
//!    Nothing is subscribed yet and nothing is inserted.
//!
//! 2. `connect(parent, after)` starts every binding (each cell replays its
//!    current value synchronously), connects children, then inserts the view's
//!    nodes into `parent` right after `after` (or at the end).
//!
//! 3. `connect` on a view that is already connected only moves its nodes.
//!    Bindings and lifecycle hooks are not run again.
//!
//! 4. `disconnect()` unsubscribes everything the view and its children
//!    registered and detaches the nodes. A second call is a no-op.
//!
//! A view occupies a contiguous run of sibling nodes from [`View::node`] to
//! [`View::last_node`]; the next sibling view is anchored after `last_node`.

mod attrs;
mod blueprint;
mod element;
mod text;

pub use attrs::{
    attribute_text, coerce_like, is_boolean_attribute, parse_style, style_text, to_text, truthy,
    Attr, Attrs, Handler, BOOLEAN_ATTRIBUTES,
};
pub use blueprint::{h, Blueprint, Renderable, Tag};
pub use element::ElementView;
pub use text::{NodeView, TextView};

use std::rc::Rc;

use futures_util::future::{self, LocalBoxFuture};

use crate::app::AppContext;
use crate::component::PreloadControls;
use crate::dom::Node;

/// Ambient flags that flow from a parent element to its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementContext {
    /// Building inside an `<svg>` subtree.
    pub is_svg: bool,
}

impl ElementContext {
    /// A copy with SVG mode switched on.
    pub fn svg(self) -> Self {
        Self { is_svg: true }
    }
}

/// Everything `build` needs.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub app: AppContext,
    pub element: ElementContext,
}

impl BuildContext {
    pub fn new(app: AppContext) -> Self {
        Self {
            app,
            element: ElementContext::default(),
        }
    }

    /// The same app with a different element context.
    pub fn with_element(&self, element: ElementContext) -> Self {
        Self {
            app: self.app.clone(),
            element,
        }
    }
}

/// Options for [`View::disconnect_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectOptions {
    /// Await the view's transition-out callback before removing its nodes.
    pub allow_transition_out: bool,
}

/// A live, connectable view.
pub trait View {
    /// The first DOM node of this view. Composite views return the node of
    /// their innermost DOM-backed descendant.
    fn node(&self) -> Node;

    /// The last DOM node of this view; siblings are anchored after it.
    fn last_node(&self) -> Node {
        self.node()
    }

    fn is_connected(&self) -> bool;

    /// Mount into `parent` right after `after`, or append when `after` is
    /// `None`. Reconnecting a connected view only repositions it.
    fn connect(&self, parent: &Node, after: Option<&Node>);

    /// Unsubscribe everything and detach. No-op when not connected.
    fn disconnect(&self);

    /// Number of live subscriptions owned directly by this view.
    fn subscription_count(&self) -> usize {
        0
    }

    /// Disconnect, optionally letting the view play a transition-out first.
    fn disconnect_with(&self, _options: DisconnectOptions) -> LocalBoxFuture<'static, ()> {
        self.disconnect();
        Box::pin(future::ready(()))
    }

    /// Run the view's preload callback, if it has one, with the given
    /// controls. Resolves immediately for views without one.
    fn preload(&self, controls: PreloadControls) -> LocalBoxFuture<'static, ()> {
        controls.done();
        Box::pin(future::ready(()))
    }
}

/// A shared, type-erased view.
pub type AnyView = Rc<dyn View>;

/// Connect `views` one after another, starting after `after`. Returns the
/// last node placed, which is where the next sibling goes.
pub(crate) fn connect_chain(views: &[AnyView], parent: &Node, after: Option<&Node>) -> Option<Node> {
    let mut anchor = after.cloned();
    for view in views {
        view.connect(parent, anchor.as_ref());
        anchor = Some(view.last_node());
    }
    anchor
}
