//! The live view of a component instance.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures_util::future::{self, LocalBoxFuture};
use serde_json::Value;

use super::context::{ComponentContext, ComponentState};
use super::preload::PreloadControls;
use super::Component;
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::reactive::Subscription;
use crate::view::{AnyView, Attrs, Blueprint, BuildContext, DisconnectOptions, NodeView, Renderable, View};

/// A built component: its state plus the view its setup returned.
#[derive(Clone)]
pub struct ComponentView {
    inner: Rc<ComponentInner>,
}

struct ComponentInner {
    state: Rc<ComponentState>,
    view: AnyView,
    /// Attribute mirrors, live while connected.
    mirrors: RefCell<Vec<Subscription>>,
    /// Set between the start of a disconnect and the removal of the nodes.
    disconnecting: Cell<bool>,
}

impl ComponentView {
    /// Split attributes, run setup and build what it returned.
    pub fn build(
        component: &Component,
        attrs: &Attrs,
        children: &[Blueprint],
        ctx: &BuildContext,
    ) -> Result<Self> {
        let state = Rc::new(ComponentState::new(component.name(), attrs, children, ctx)?);
        let setup_ctx = ComponentContext {
            state: state.clone(),
        };

        let view: AnyView = match component.setup(&setup_ctx)? {
            Renderable::Blueprint(blueprint) => blueprint.build(ctx)?,
            Renderable::Node(node) => Rc::new(NodeView::new(node)),
            Renderable::Empty | Renderable::Value(Value::Null) => {
                Rc::new(NodeView::new(ctx.app.document().create_comment(component.name())))
            }
            other => {
                return Err(Error::InvalidRender {
                    component: component.name().to_string(),
                    actual: describe(&other),
                })
            }
        };

        state.debug.log("built");
        Ok(Self {
            inner: Rc::new(ComponentInner {
                state,
                view,
                mirrors: RefCell::new(Vec::new()),
                disconnecting: Cell::new(false),
            }),
        })
    }

    /// The context the setup function received.
    pub fn context(&self) -> ComponentContext {
        ComponentContext {
            state: self.inner.state.clone(),
        }
    }

    /// The view the setup function rendered.
    pub fn inner_view(&self) -> &AnyView {
        &self.inner.view
    }
}

impl ComponentInner {
    /// First half of a disconnect: hooks, observers and mirrors. Returns
    /// `false` when the component was not connected.
    fn begin_disconnect(&self) -> bool {
        if !self.state.connected.get() {
            return false;
        }
        self.state.run_hooks(|hooks| &hooks.before_disconnect);

        for effect in self.state.observers.borrow().iter() {
            effect.stop();
        }
        let mirrors = self.mirrors.take();
        for mirror in mirrors {
            mirror.unsubscribe();
        }

        self.state.connected.set(false);
        self.disconnecting.set(true);
        true
    }

    /// Second half: remove the nodes and run after-disconnect hooks.
    fn finish_disconnect(&self) {
        if !self.disconnecting.replace(false) {
            return;
        }
        self.view.disconnect();
        self.state.run_hooks(|hooks| &hooks.after_disconnect);
        self.state.debug.log("disconnected");
    }
}

impl View for ComponentView {
    fn node(&self) -> Node {
        self.inner.view.node()
    }

    fn last_node(&self) -> Node {
        self.inner.view.last_node()
    }

    fn is_connected(&self) -> bool {
        self.inner.state.connected.get()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        let inner = &self.inner;
        let state = &inner.state;
        if state.connected.get() {
            inner.view.connect(parent, after);
            return;
        }
        // A transition-out still in flight loses its nodes now.
        inner.finish_disconnect();

        let mirrors: Vec<Subscription> = state
            .bound
            .iter()
            .map(|(name, cell)| {
                let values = state.values.clone();
                let name = name.clone();
                cell.subscribe(move |value: &Value| {
                    values.update(|values| {
                        values.insert(name.clone(), value.clone());
                    });
                })
            })
            .collect();
        *inner.mirrors.borrow_mut() = mirrors;

        state.run_hooks(|hooks| &hooks.before_connect);
        inner.view.connect(parent, after);
        state.connected.set(true);

        let observers = state.observers.borrow().clone();
        for effect in observers {
            effect.start();
        }
        state.run_hooks(|hooks| &hooks.after_connect);
        state.debug.log("connected");
    }

    fn disconnect(&self) {
        self.inner.begin_disconnect();
        self.inner.finish_disconnect();
    }

    fn subscription_count(&self) -> usize {
        let running = self
            .inner
            .state
            .observers
            .borrow()
            .iter()
            .filter(|effect| effect.is_running())
            .count();
        self.inner.mirrors.borrow().len() + running
    }

    fn disconnect_with(&self, options: DisconnectOptions) -> LocalBoxFuture<'static, ()> {
        let transition = if options.allow_transition_out && self.is_connected() {
            self.inner.state.transition_out.borrow_mut().take()
        } else {
            None
        };

        let Some(transition) = transition else {
            self.disconnect();
            return Box::pin(future::ready(()));
        };

        self.inner.begin_disconnect();
        let inner = self.inner.clone();
        Box::pin(async move {
            transition().await;
            inner.finish_disconnect();
        })
    }

    fn preload(&self, controls: PreloadControls) -> LocalBoxFuture<'static, ()> {
        let preload = self.inner.state.preload.borrow_mut().take();
        let Some(preload) = preload else {
            controls.done();
            return Box::pin(future::ready(()));
        };

        let finished = controls.take_finished();
        let work = preload(controls.clone());
        Box::pin(async move {
            match finished {
                Some(finished) => {
                    future::select(work, finished).await;
                }
                None => work.await,
            }
            controls.done();
        })
    }
}

fn describe(renderable: &Renderable) -> String {
    match renderable {
        Renderable::Text(text) => format!("text {text:?}"),
        Renderable::Value(value) => Error::shape_of(value),
        Renderable::Cell(_) => "a cell".to_string(),
        Renderable::Dynamic(_) => "a cell of renderables".to_string(),
        Renderable::List(items) => format!("a list of {} items", items.len()),
        Renderable::Lazy(_) => "a function".to_string(),
        Renderable::Empty | Renderable::Node(_) | Renderable::Blueprint(_) => "valid content".to_string(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppContext;
    use crate::reactive::Signal;
    use crate::view::h;
    use serde_json::json;

    fn build(component: &Component, attrs: Attrs) -> Result<ComponentView> {
        ComponentView::build(component, &attrs, &[], &BuildContext::new(AppContext::default()))
    }

    #[test]
    fn setup_sees_static_and_bound_attrs_uniformly() {
        let label = Signal::new(json!("first"));
        let component = Component::new("label", |ctx| {
            Ok(h("span", Attrs::new(), vec![ctx.attr("text").into(), ctx.attr("suffix").into()]).into())
        });

        let view = build(&component, Attrs::new().with("text", &label).with("suffix", "!")).unwrap();
        let parent = Node::element("main");
        view.connect(&parent, None);
        assert_eq!(parent.text_content(), "first!");

        label.set(json!("second"));
        assert_eq!(parent.text_content(), "second!");

        view.disconnect();
        assert_eq!(label.observer_count(), 0);
    }

    #[test]
    fn hooks_run_in_order_around_insertion() {
        let parent = Node::element("main");
        let log = Rc::new(RefCell::new(Vec::new()));

        let component = {
            let parent = parent.clone();
            let log = log.clone();
            Component::new("hooks", move |ctx| {
                for (label, before) in [("before-1", true), ("before-2", true), ("after-1", false), ("after-2", false)] {
                    let parent = parent.clone();
                    let log = log.clone();
                    let hook = move |_: &ComponentContext| log.borrow_mut().push((label, parent.child_count()));
                    if before {
                        ctx.before_connect(hook);
                    } else {
                        ctx.after_connect(hook);
                    }
                }
                Ok(h("div", Attrs::new(), vec![]).into())
            })
        };

        let view = build(&component, Attrs::new()).unwrap();
        view.connect(&parent, None);
        view.connect(&parent, None);

        assert_eq!(
            *log.borrow(),
            vec![("before-1", 0), ("before-2", 0), ("after-1", 1), ("after-2", 1)]
        );
    }

    #[test]
    fn disconnect_hooks_bracket_removal() {
        let parent = Node::element("main");
        let log = Rc::new(RefCell::new(Vec::new()));

        let component = {
            let parent = parent.clone();
            let log = log.clone();
            Component::new("teardown", move |ctx| {
                let (p, l) = (parent.clone(), log.clone());
                ctx.before_disconnect(move |_| l.borrow_mut().push(("before", p.child_count())));
                let (p, l) = (parent.clone(), log.clone());
                ctx.after_disconnect(move |_| l.borrow_mut().push(("after", p.child_count())));
                Ok(h("div", Attrs::new(), vec![]).into())
            })
        };

        let view = build(&component, Attrs::new()).unwrap();
        view.connect(&parent, None);
        view.disconnect();
        view.disconnect();
        assert_eq!(*log.borrow(), vec![("before", 1), ("after", 0)]);
    }

    #[test]
    fn observe_defers_until_connected() {
        let source = Signal::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let component = {
            let source = source.clone();
            let seen = seen.clone();
            Component::new("observer", move |ctx| {
                let seen = seen.clone();
                ctx.observe(&source, move |v: &i32| seen.borrow_mut().push(*v));
                Ok(Renderable::Empty)
            })
        };

        let view = build(&component, Attrs::new()).unwrap();
        assert_eq!(source.observer_count(), 0);
        assert!(seen.borrow().is_empty());

        view.connect(&Node::element("main"), None);
        assert_eq!(*seen.borrow(), vec![1]);

        source.set(2);
        view.disconnect();
        source.set(3);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(source.observer_count(), 0);
        assert_eq!(view.subscription_count(), 0);
    }

    #[test]
    fn observe_while_connected_starts_immediately() {
        let source = Signal::new("x".to_string());
        let calls = Rc::new(Cell::new(0));

        let component = {
            let source = source.clone();
            let calls = calls.clone();
            Component::new("late", move |ctx| {
                let source = source.clone();
                let calls = calls.clone();
                ctx.after_connect(move |ctx| {
                    let calls = calls.clone();
                    ctx.observe(&source, move |_: &String| calls.set(calls.get() + 1));
                });
                Ok(Renderable::Empty)
            })
        };

        let view = build(&component, Attrs::new()).unwrap();
        view.connect(&Node::element("main"), None);
        assert_eq!(calls.get(), 1);
        assert_eq!(source.observer_count(), 1);
    }

    #[test]
    fn two_way_attrs_must_be_writable() {
        let component = Component::new("field", |_| Ok(Renderable::Empty));
        let read_only = Signal::new(json!(1)).read_only();

        let result = build(&component, Attrs::new().with("$$value", read_only));
        assert_eq!(
            result.err(),
            Some(Error::NotWritable {
                attr: "$$value".to_string()
            })
        );
    }

    #[test]
    fn two_way_attrs_write_back_to_parent() {
        let shared = Signal::new(json!(0));
        let component = Component::new("counter", |ctx| {
            if let Some(count) = ctx.state("count") {
                count.set(json!(10));
            }
            Ok(Renderable::Empty)
        });

        build(&component, Attrs::new().with("$$count", &shared)).unwrap();
        assert_eq!(shared.get(), json!(10));
    }

    #[test]
    fn setup_returning_text_is_rejected() {
        let component = Component::new("bad", |_| Ok("just text".into()));
        let result = build(&component, Attrs::new());
        assert!(matches!(result, Err(Error::InvalidRender { ref component, .. }) if component == "bad"));
    }

    #[test]
    fn setup_returning_nothing_renders_a_placeholder() {
        let component = Component::new("empty", |_| Ok(Renderable::Empty));
        let view = build(&component, Attrs::new()).unwrap();
        let parent = Node::element("main");
        view.connect(&parent, None);
        assert_eq!(parent.child_count(), 1);
        assert_eq!(parent.text_content(), "");
    }

    #[test]
    fn node_delegates_to_rendered_view() {
        let component = Component::new("wrapper", |_| Ok(h("section", Attrs::new(), vec![]).into()));
        let view = build(&component, Attrs::new()).unwrap();
        assert_eq!(view.node().tag(), Some("section"));
        assert_eq!(view.node(), view.inner_view().node());
    }

    #[test]
    fn outlet_renders_children() {
        let component = Component::new("card", |ctx| {
            Ok(h("div", Attrs::new(), vec![ctx.outlet().into()]).into())
        });
        let blueprint = h(&component, Attrs::new(), vec!["a".into(), "b".into()]);
        let view = blueprint.build(&BuildContext::new(AppContext::default())).unwrap();

        view.connect(&Node::element("main"), None);
        assert_eq!(view.node().text_content(), "ab");
    }

    #[tokio::test]
    async fn transition_out_delays_removal() {
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = RefCell::new(Some(gate));
        let component = Component::new("fade", move |ctx| {
            if let Some(gate) = gate.borrow_mut().take() {
                ctx.on_transition_out(move || async move {
                    let _ = gate.await;
                });
            }
            Ok(h("div", Attrs::new(), vec![]).into())
        });

        let view = build(&component, Attrs::new()).unwrap();
        let parent = Node::element("main");
        view.connect(&parent, None);

        let mut pending = view.disconnect_with(DisconnectOptions {
            allow_transition_out: true,
        });
        assert!(!view.is_connected());
        assert!(futures_util::poll!(&mut pending).is_pending());
        assert_eq!(parent.child_count(), 1);

        release.send(()).unwrap();
        pending.await;
        assert_eq!(parent.child_count(), 0);
    }

    #[tokio::test]
    async fn transition_out_does_not_reach_nested_components() {
        let child_transitions = Rc::new(Cell::new(0));
        let child_removed = Rc::new(Cell::new(false));
        let child = {
            let (transitions, removed) = (child_transitions.clone(), child_removed.clone());
            Component::new("leaf", move |ctx| {
                let transitions = transitions.clone();
                ctx.on_transition_out(move || {
                    transitions.set(transitions.get() + 1);
                    future::pending::<()>()
                });
                let removed = removed.clone();
                ctx.after_disconnect(move |_| removed.set(true));
                Ok(h("span", Attrs::new(), vec![]).into())
            })
        };

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = RefCell::new(Some(gate));
        let shell = Component::new("shell", move |ctx| {
            if let Some(gate) = gate.borrow_mut().take() {
                ctx.on_transition_out(move || async move {
                    let _ = gate.await;
                });
            }
            Ok(h("div", Attrs::new(), vec![h(&child, Attrs::new(), vec![]).into()]).into())
        });

        let view = build(&shell, Attrs::new()).unwrap();
        let parent = Node::element("main");
        view.connect(&parent, None);
        let div = view.node();
        assert_eq!(div.child_count(), 1);

        let mut pending = view.disconnect_with(DisconnectOptions {
            allow_transition_out: true,
        });
        assert!(futures_util::poll!(&mut pending).is_pending());
        assert_eq!(parent.child_count(), 1);
        assert!(!child_removed.get());

        release.send(()).unwrap();
        assert!(futures_util::poll!(&mut pending).is_ready());
        assert_eq!(parent.child_count(), 0);
        assert_eq!(div.child_count(), 0);
        assert!(child_removed.get());
        assert_eq!(child_transitions.get(), 0);
    }

    #[tokio::test]
    async fn preload_resolves_on_done() {
        let component = Component::new("page", |ctx| {
            ctx.on_preload(|controls: PreloadControls| async move {
                controls.show("loading");
                controls.done();
                // Never finishes on its own.
                future::pending::<()>().await;
            });
            Ok(Renderable::Empty)
        });

        let view = build(&component, Attrs::new()).unwrap();
        let shown = Rc::new(RefCell::new(Vec::new()));
        let s = shown.clone();
        let controls = PreloadControls::new(move |content| s.borrow_mut().push(content));

        view.preload(controls.clone()).await;
        assert!(controls.is_done());
        assert_eq!(*shown.borrow(), vec![Renderable::from("loading")]);
    }

    #[tokio::test]
    async fn preload_without_callback_resolves_immediately() {
        let component = Component::new("plain", |_| Ok(Renderable::Empty));
        let view = build(&component, Attrs::new()).unwrap();
        let controls = PreloadControls::detached();
        view.preload(controls.clone()).await;
        assert!(controls.is_done());
    }
}
