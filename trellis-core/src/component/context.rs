//! The surface a component's setup function works with.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use super::preload::PreloadControls;
use crate::app::AppContext;
use crate::debug::DebugChannel;
use crate::error::{Error, Result};
use crate::reactive::{Effect, Memo, ReadSignal, Signal};
use crate::reconcile::fragment;
use crate::view::{Attr, Attrs, Blueprint, BuildContext, Handler, Renderable};

pub(crate) type Hook = Rc<dyn Fn(&ComponentContext)>;
pub(crate) type PreloadFn = Box<dyn FnOnce(PreloadControls) -> LocalBoxFuture<'static, ()>>;
pub(crate) type TransitionFn = Box<dyn FnOnce() -> LocalBoxFuture<'static, ()>>;

/// Lifecycle hooks in registration order.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) before_connect: SmallVec<[Hook; 2]>,
    pub(crate) after_connect: SmallVec<[Hook; 2]>,
    pub(crate) before_disconnect: SmallVec<[Hook; 2]>,
    pub(crate) after_disconnect: SmallVec<[Hook; 2]>,
}

/// Everything a component instance owns apart from its rendered view.
pub(crate) struct ComponentState {
    pub(crate) name: String,
    pub(crate) build: BuildContext,
    pub(crate) debug: DebugChannel,

    /// The attributes as passed in.
    pub(crate) attrs: Attrs,
    /// Cell-bound attributes, mirrored into `values` while connected.
    pub(crate) bound: IndexMap<String, ReadSignal<Value>>,
    /// Two-way (`$$`) attributes, keyed without the sigil.
    pub(crate) states: IndexMap<String, Signal<Value>>,
    /// Current value of every plain and bound attribute.
    pub(crate) values: Signal<IndexMap<String, Value>>,

    pub(crate) children: Vec<Blueprint>,
    pub(crate) hooks: RefCell<Hooks>,
    pub(crate) observers: RefCell<Vec<Effect>>,
    pub(crate) preload: RefCell<Option<PreloadFn>>,
    pub(crate) transition_out: RefCell<Option<TransitionFn>>,
    pub(crate) connected: Cell<bool>,
}

impl ComponentState {
    /// Split `attrs` into plain values, bound cells and two-way states.
    pub(crate) fn new(
        name: &str,
        attrs: &Attrs,
        children: &[Blueprint],
        build: &BuildContext,
    ) -> Result<Self> {
        let mut values = IndexMap::new();
        let mut bound = IndexMap::new();
        let mut states = IndexMap::new();

        for (key, attr) in attrs.iter() {
            if let Some(state) = key.strip_prefix("$$") {
                match attr {
                    Attr::Writable(cell) => {
                        states.insert(state.to_string(), cell.clone());
                    }
                    _ => return Err(Error::NotWritable { attr: key.clone() }),
                }
                continue;
            }

            match attr {
                Attr::Static(value) => {
                    values.insert(key.clone(), value.clone());
                }
                Attr::Bound(cell) => {
                    values.insert(key.clone(), cell.get());
                    bound.insert(key.clone(), cell.clone());
                }
                Attr::Writable(cell) => {
                    values.insert(key.clone(), cell.get());
                    bound.insert(key.clone(), cell.read_only());
                }
                // Handlers, maps, lists and refs stay reachable through `raw_attr`.
                _ => {}
            }
        }

        Ok(Self {
            name: name.to_string(),
            build: build.clone(),
            debug: build.app.channel(name),
            attrs: attrs.clone(),
            bound,
            states,
            values: Signal::new(values),
            children: children.to_vec(),
            hooks: RefCell::new(Hooks::default()),
            observers: RefCell::new(Vec::new()),
            preload: RefCell::new(None),
            transition_out: RefCell::new(None),
            connected: Cell::new(false),
        })
    }

    /// Run one list of hooks. The list is copied first, so hooks may
    /// register further hooks.
    pub(crate) fn run_hooks(self: &Rc<Self>, select: impl Fn(&Hooks) -> &SmallVec<[Hook; 2]>) {
        let hooks: SmallVec<[Hook; 2]> = select(&self.hooks.borrow()).clone();
        let ctx = ComponentContext {
            state: Rc::clone(self),
        };
        for hook in hooks {
            hook(&ctx);
        }
    }
}

/// Handed to a component's setup function and to its lifecycle hooks.
#[derive(Clone)]
pub struct ComponentContext {
    pub(crate) state: Rc<ComponentState>,
}

impl ComponentContext {
    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn app(&self) -> &AppContext {
        &self.state.build.app
    }

    /// The component's debug channel, named after the component.
    pub fn debug(&self) -> &DebugChannel {
        &self.state.debug
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.get()
    }

    // ------------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------------

    /// A read-only cell over one attribute, whether it was passed as a plain
    /// value or a binding. Missing attributes read as `null`.
    pub fn attr(&self, name: &str) -> Memo<Value> {
        let name = name.to_string();
        self.state
            .values
            .map(move |values| values.get(&name).cloned().unwrap_or(Value::Null))
    }

    /// Current value of one attribute.
    pub fn attr_value(&self, name: &str) -> Value {
        match self.state.bound.get(name) {
            Some(cell) => cell.get(),
            None => self
                .state
                .values
                .with(|values| values.get(name).cloned().unwrap_or(Value::Null)),
        }
    }

    /// All plain and bound attribute values.
    pub fn attrs(&self) -> ReadSignal<IndexMap<String, Value>> {
        self.state.values.read_only()
    }

    /// An attribute exactly as it was passed.
    pub fn raw_attr(&self, name: &str) -> Option<Attr> {
        self.state.attrs.get(name).cloned()
    }

    /// The writable signal behind a `$$name` attribute.
    pub fn state(&self, name: &str) -> Option<Signal<Value>> {
        self.state.states.get(name).cloned()
    }

    /// A handler passed as `name`. Cells of handlers are read when called.
    pub fn handler(&self, name: &str) -> Option<Handler> {
        match self.state.attrs.get(name)? {
            Attr::Handler(handler) => Some(handler.clone()),
            Attr::HandlerCell(cell) => {
                let cell = cell.clone();
                Some(Handler::new(move |event| cell.get().call(event)))
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------------

    pub fn children(&self) -> &[Blueprint] {
        &self.state.children
    }

    /// A fragment rendering the children this component was invoked with.
    pub fn outlet(&self) -> Blueprint {
        fragment(
            self.state
                .children
                .iter()
                .cloned()
                .map(Renderable::Blueprint)
                .collect(),
        )
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Runs before the component's nodes are inserted.
    pub fn before_connect(&self, hook: impl Fn(&ComponentContext) + 'static) {
        self.state.hooks.borrow_mut().before_connect.push(Rc::new(hook));
    }

    /// Runs after the component's nodes are inserted.
    pub fn after_connect(&self, hook: impl Fn(&ComponentContext) + 'static) {
        self.state.hooks.borrow_mut().after_connect.push(Rc::new(hook));
    }

    /// Runs before the component's nodes are removed.
    pub fn before_disconnect(&self, hook: impl Fn(&ComponentContext) + 'static) {
        self.state.hooks.borrow_mut().before_disconnect.push(Rc::new(hook));
    }

    /// Runs after the component's nodes are removed.
    pub fn after_disconnect(&self, hook: impl Fn(&ComponentContext) + 'static) {
        self.state.hooks.borrow_mut().after_disconnect.push(Rc::new(hook));
    }

    /// Observe a cell for as long as the component is connected.
    ///
    /// Called during setup, observation starts once the component has been
    /// connected. Called while connected, it starts immediately.
    pub fn observe<T>(&self, source: impl Into<ReadSignal<T>>, callback: impl FnMut(&T) + 'static) -> Effect
    where
        T: Clone + PartialEq + 'static,
    {
        let effect = Effect::new_lazy(source, callback);
        if self.state.connected.get() {
            effect.start();
        }
        self.state.observers.borrow_mut().push(effect.clone());
        effect
    }

    /// Observe several cells together; the callback gets every latest value.
    pub fn observe_all<T>(
        &self,
        sources: Vec<ReadSignal<T>>,
        mut callback: impl FnMut(&[T]) + 'static,
    ) -> Effect
    where
        T: Clone + PartialEq + 'static,
    {
        let merged = Memo::merge_all(sources, |values: &[T]| values.to_vec());
        self.observe(merged, move |values: &Vec<T>| callback(values))
    }

    // ------------------------------------------------------------------------
    // Extension points
    // ------------------------------------------------------------------------

    /// Register the one-shot preload callback.
    pub fn on_preload<F, Fut>(&self, preload: F)
    where
        F: FnOnce(PreloadControls) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let preload: PreloadFn = Box::new(move |controls: PreloadControls| -> LocalBoxFuture<'static, ()> {
            Box::pin(preload(controls))
        });
        *self.state.preload.borrow_mut() = Some(preload);
    }

    /// Register the one-shot transition-out callback.
    pub fn on_transition_out<F, Fut>(&self, transition: F)
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let transition: TransitionFn =
            Box::new(move || -> LocalBoxFuture<'static, ()> { Box::pin(transition()) });
        *self.state.transition_out.borrow_mut() = Some(transition);
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("name", &self.state.name)
            .field("connected", &self.state.connected.get())
            .finish()
    }
}
