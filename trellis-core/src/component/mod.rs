//! Component Runtime
//!
//! A component is a named setup function. The runtime turns it, plus the
//! attributes and children it was invoked with, into a [`ComponentView`].
//!
//! # How Components Work
//!
//! 1. **Split**: attributes are sorted into plain values, cell-bound values,
//!    handlers and two-way (`$$`) states. A `$$` attribute that is not a
//!    writable signal fails the build with [`crate::Error::NotWritable`].
//!
//! 2. **Setup**: the setup function runs once, at build time, with a
//!    [`ComponentContext`]. It reads attributes, registers lifecycle hooks
//!    and observers, and returns what to render: a blueprint, a DOM node or
//!    nothing. Anything else fails the build with
//!    [`crate::Error::InvalidRender`].
//!
//! 3. **Connect**: cell-bound attributes start mirroring into the component's
//!    attribute signal, before-connect hooks run, the rendered view is
//!    inserted, deferred observers start, after-connect hooks run.
//!
//! 4. **Disconnect**: the same in reverse. Every mirror and observer is
//!    unsubscribed.
//!
//! # Extension points
//!
//! - **Preload**: a one-shot async callback run when the view is mounted as a
//!   route layer. It gets [`PreloadControls`] and finishes when it calls
//!   `done()` or when its future completes, whichever comes first.
//! - **Transition-out**: a one-shot async callback awaited by
//!   `disconnect_with(DisconnectOptions { allow_transition_out: true })`
//!   before the nodes are removed. Only the view the call is made on waits;
//!   descendants disconnect immediately.

mod context;
mod preload;
mod view;

pub use context::ComponentContext;
pub use preload::PreloadControls;
pub use view::ComponentView;

use std::fmt::Debug;
use std::rc::Rc;

use crate::error::Result;
use crate::view::Renderable;

type SetupFn = Rc<dyn Fn(&ComponentContext) -> Result<Renderable>>;

/// A named setup function.
///
/// # Example
///
/// ```rust
/// use trellis_core::component::Component;
/// use trellis_core::view::{h, Attrs, Renderable};
///
/// let greeting = Component::new("greeting", |ctx| {
///     let name = ctx.attr("name");
///     Ok(h("p", Attrs::new(), vec!["Hello, ".into(), name.into()]).into())
/// });
///
/// let blueprint = h(&greeting, Attrs::new().with("name", "world"), vec![]);
/// # let _ = blueprint;
/// ```
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    setup: SetupFn,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        setup: impl Fn(&ComponentContext) -> Result<Renderable> + 'static,
    ) -> Self {
        let name: String = name.into();
        Self {
            name: name.into(),
            setup: Rc::new(setup),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn setup(&self, ctx: &ComponentContext) -> Result<Renderable> {
        (self.setup)(ctx)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.setup, &other.setup)
    }
}

impl Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component({})", self.name)
    }
}
