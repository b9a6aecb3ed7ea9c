//! Blueprints and renderable values.
//!
//! [`Blueprint`] is the inert description; [`Renderable`] is everything the
//! template layer accepts where content can go (strings, numbers, cells,
//! nodes, blueprints, lists, lazy functions). `Renderable` is a closed sum
//! type, so "is this a blueprint / a cell / a node" is a `match`, never a
//! runtime property check.

use std::fmt::Debug;
use std::rc::Rc;

use serde_json::Value;

use super::attrs::{to_text, Attrs};
use super::element::ElementView;
use super::text::{NodeView, TextView};
use super::{AnyView, BuildContext};
use crate::component::{Component, ComponentView};
use crate::dom::Node;
use crate::error::Result;
use crate::reactive::{Memo, ReadSignal, Signal};

type BuildFn = Rc<dyn Fn(&BuildContext) -> Result<AnyView>>;

enum BlueprintKind {
    Element {
        tag: String,
        attrs: Attrs,
        children: Vec<Blueprint>,
    },
    Component {
        component: Component,
        attrs: Attrs,
        children: Vec<Blueprint>,
    },
    Text(String),
    TextCell(ReadSignal<Value>),
    Node(Node),
    /// Reconcilers and other views that build themselves.
    Custom { name: &'static str, build: BuildFn },
}

/// An immutable description of something to render.
///
/// Building never mutates the blueprint, so one blueprint can be built into
/// any number of independent views. Cloning clones the handle.
#[derive(Clone)]
pub struct Blueprint {
    kind: Rc<BlueprintKind>,
}

impl Blueprint {
    fn from_kind(kind: BlueprintKind) -> Self {
        Self { kind: Rc::new(kind) }
    }

    /// An element with attributes and children.
    pub fn element(tag: impl Into<String>, attrs: Attrs, children: Vec<Renderable>) -> Self {
        Self::from_kind(BlueprintKind::Element {
            tag: tag.into(),
            attrs,
            children: flatten(children),
        })
    }

    /// A component invocation.
    pub fn component(component: Component, attrs: Attrs, children: Vec<Renderable>) -> Self {
        Self::from_kind(BlueprintKind::Component {
            component,
            attrs,
            children: flatten(children),
        })
    }

    /// A fixed text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_kind(BlueprintKind::Text(content.into()))
    }

    /// A text node that follows a cell.
    pub fn text_cell(cell: impl Into<ReadSignal<Value>>) -> Self {
        Self::from_kind(BlueprintKind::TextCell(cell.into()))
    }

    /// An existing DOM node.
    pub fn node(node: Node) -> Self {
        Self::from_kind(BlueprintKind::Node(node))
    }

    /// A blueprint with a custom build function.
    pub fn from_fn(
        name: &'static str,
        build: impl Fn(&BuildContext) -> Result<AnyView> + 'static,
    ) -> Self {
        Self::from_kind(BlueprintKind::Custom {
            name,
            build: Rc::new(build),
        })
    }

    /// Content rendered into `target` while this blueprint's view is
    /// connected. See [`crate::reconcile::portal`].
    pub fn portal(content: impl Into<Renderable>, target: Node) -> Self {
        crate::reconcile::portal(content, target)
    }

    /// Tag of an element blueprint.
    pub fn tag(&self) -> Option<&str> {
        match &*self.kind {
            BlueprintKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Short description of what this blueprint builds.
    pub fn describe(&self) -> String {
        match &*self.kind {
            BlueprintKind::Element { tag, .. } => format!("<{tag}>"),
            BlueprintKind::Component { component, .. } => format!("component {}", component.name()),
            BlueprintKind::Text(text) => format!("text {text:?}"),
            BlueprintKind::TextCell(_) => "text cell".to_string(),
            BlueprintKind::Node(node) => format!("node {node:?}"),
            BlueprintKind::Custom { name, .. } => (*name).to_string(),
        }
    }

    /// Build a live view.
    pub fn build(&self, ctx: &BuildContext) -> Result<AnyView> {
        let view: AnyView = match &*self.kind {
            BlueprintKind::Element {
                tag,
                attrs,
                children,
            } => Rc::new(ElementView::build(tag, attrs, children, ctx)?),
            BlueprintKind::Component {
                component,
                attrs,
                children,
            } => Rc::new(ComponentView::build(component, attrs, children, ctx)?),
            BlueprintKind::Text(text) => Rc::new(TextView::new(ctx.app.document().create_text(text.clone()), None)),
            BlueprintKind::TextCell(cell) => Rc::new(TextView::new(
                ctx.app.document().create_text(""),
                Some(cell.clone()),
            )),
            BlueprintKind::Node(node) => Rc::new(NodeView::new(node.clone())),
            BlueprintKind::Custom { build, .. } => build(ctx)?,
        };
        Ok(view)
    }
}

impl PartialEq for Blueprint {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.kind, &other.kind)
    }
}

impl Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blueprint({})", self.describe())
    }
}

/// What `h` renders: an element tag or a component.
#[derive(Clone)]
pub enum Tag {
    Element(String),
    Component(Component),
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Tag::Element(tag.to_string())
    }
}

impl From<String> for Tag {
    fn from(tag: String) -> Self {
        Tag::Element(tag)
    }
}

impl From<Component> for Tag {
    fn from(component: Component) -> Self {
        Tag::Component(component)
    }
}

impl From<&Component> for Tag {
    fn from(component: &Component) -> Self {
        Tag::Component(component.clone())
    }
}

/// The template function: an element or component with attributes and
/// children. Strings, numbers and cells among the children become text.
///
/// ```rust
/// use trellis_core::view::{h, Attrs};
///
/// let blueprint = h("p", Attrs::new().with("class", "note"), vec!["Hello, ".into(), "world".into()]);
/// assert_eq!(blueprint.tag(), Some("p"));
/// ```
pub fn h(tag: impl Into<Tag>, attrs: Attrs, children: Vec<Renderable>) -> Blueprint {
    match tag.into() {
        Tag::Element(tag) => Blueprint::element(tag, attrs, children),
        Tag::Component(component) => Blueprint::component(component, attrs, children),
    }
}

/// A function producing renderable content on demand.
#[derive(Clone)]
pub struct Lazy(Rc<dyn Fn() -> Renderable>);

impl Lazy {
    pub fn new(f: impl Fn() -> Renderable + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) -> Renderable {
        (self.0)()
    }
}

impl PartialEq for Lazy {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Lazy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lazy({:p})", Rc::as_ptr(&self.0))
    }
}

/// Anything that can appear as content.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Renderable {
    /// Nothing.
    #[default]
    Empty,
    /// Fixed text.
    Text(String),
    /// A dynamic value: `null` renders nothing, arrays flatten, anything else
    /// renders as text.
    Value(Value),
    /// An existing DOM node.
    Node(Node),
    Blueprint(Blueprint),
    /// A text node following a cell.
    Cell(ReadSignal<Value>),
    /// Content that is replaced wholesale whenever the cell changes.
    Dynamic(ReadSignal<Renderable>),
    List(Vec<Renderable>),
    /// Called to obtain the real content.
    Lazy(Lazy),
}

impl Renderable {
    /// Shorthand for [`Renderable::Lazy`].
    pub fn lazy(f: impl Fn() -> Renderable + 'static) -> Self {
        Renderable::Lazy(Lazy::new(f))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Renderable::Empty | Renderable::Value(Value::Null) => true,
            Renderable::List(items) => items.iter().all(Renderable::is_empty),
            _ => false,
        }
    }

    /// Coerce into blueprints: lists flatten, lazy content is called, text
    /// and cells become text blueprints.
    pub fn into_blueprints(self) -> Vec<Blueprint> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(self, out: &mut Vec<Blueprint>) {
        match self {
            Renderable::Empty | Renderable::Value(Value::Null) => {}
            Renderable::Text(text) => out.push(Blueprint::text(text)),
            Renderable::Value(Value::Array(items)) => {
                for item in items {
                    Renderable::Value(item).collect_into(out);
                }
            }
            Renderable::Value(value) => out.push(Blueprint::text(to_text(&value))),
            Renderable::Node(node) => out.push(Blueprint::node(node)),
            Renderable::Blueprint(blueprint) => out.push(blueprint),
            Renderable::Cell(cell) => out.push(Blueprint::text_cell(cell)),
            Renderable::Dynamic(cell) => out.push(crate::reconcile::outlet(cell)),
            Renderable::List(items) => {
                for item in items {
                    item.collect_into(out);
                }
            }
            Renderable::Lazy(lazy) => lazy.call().collect_into(out),
        }
    }
}

fn flatten(children: Vec<Renderable>) -> Vec<Blueprint> {
    children
        .into_iter()
        .flat_map(Renderable::into_blueprints)
        .collect()
}

impl From<Blueprint> for Renderable {
    fn from(blueprint: Blueprint) -> Self {
        Renderable::Blueprint(blueprint)
    }
}

impl From<Node> for Renderable {
    fn from(node: Node) -> Self {
        Renderable::Node(node)
    }
}

impl From<&str> for Renderable {
    fn from(text: &str) -> Self {
        Renderable::Text(text.to_string())
    }
}

impl From<String> for Renderable {
    fn from(text: String) -> Self {
        Renderable::Text(text)
    }
}

impl From<Value> for Renderable {
    fn from(value: Value) -> Self {
        Renderable::Value(value)
    }
}

macro_rules! impl_value_renderable {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Renderable {
                fn from(value: $ty) -> Self {
                    Renderable::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_value_renderable!(bool, i32, i64, u32, u64, usize, f64);

impl From<ReadSignal<Value>> for Renderable {
    fn from(cell: ReadSignal<Value>) -> Self {
        Renderable::Cell(cell)
    }
}

impl From<Signal<Value>> for Renderable {
    fn from(cell: Signal<Value>) -> Self {
        Renderable::Cell(cell.read_only())
    }
}

impl From<&Signal<Value>> for Renderable {
    fn from(cell: &Signal<Value>) -> Self {
        Renderable::Cell(cell.read_only())
    }
}

impl From<Memo<Value>> for Renderable {
    fn from(cell: Memo<Value>) -> Self {
        Renderable::Cell(cell.read_only())
    }
}

// Cells of plain types render as text through a converting memo.
macro_rules! impl_cell_renderable {
    ($($ty:ty),*) => {
        $(
            impl From<Signal<$ty>> for Renderable {
                fn from(cell: Signal<$ty>) -> Self {
                    Renderable::Cell(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }

            impl From<&Signal<$ty>> for Renderable {
                fn from(cell: &Signal<$ty>) -> Self {
                    Renderable::Cell(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }

            impl From<Memo<$ty>> for Renderable {
                fn from(cell: Memo<$ty>) -> Self {
                    Renderable::Cell(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }

            impl From<ReadSignal<$ty>> for Renderable {
                fn from(cell: ReadSignal<$ty>) -> Self {
                    Renderable::Cell(cell.map(|v| Value::from(v.clone())).read_only())
                }
            }
        )*
    };
}

impl_cell_renderable!(String, bool, i32, i64, f64);

impl From<ReadSignal<Renderable>> for Renderable {
    fn from(cell: ReadSignal<Renderable>) -> Self {
        Renderable::Dynamic(cell)
    }
}

impl From<Signal<Renderable>> for Renderable {
    fn from(cell: Signal<Renderable>) -> Self {
        Renderable::Dynamic(cell.read_only())
    }
}

impl From<&Signal<Renderable>> for Renderable {
    fn from(cell: &Signal<Renderable>) -> Self {
        Renderable::Dynamic(cell.read_only())
    }
}

impl From<Memo<Renderable>> for Renderable {
    fn from(cell: Memo<Renderable>) -> Self {
        Renderable::Dynamic(cell.read_only())
    }
}

impl From<Vec<Renderable>> for Renderable {
    fn from(items: Vec<Renderable>) -> Self {
        Renderable::List(items)
    }
}

impl From<Vec<Blueprint>> for Renderable {
    fn from(items: Vec<Blueprint>) -> Self {
        Renderable::List(items.into_iter().map(Renderable::Blueprint).collect())
    }
}

impl<T: Into<Renderable>> From<Option<T>> for Renderable {
    fn from(value: Option<T>) -> Self {
        value.map_or(Renderable::Empty, Into::into)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppContext;
    use serde_json::json;

    #[test]
    fn children_are_coerced_to_text() {
        let count = Signal::new(3);
        let blueprint = h(
            "p",
            Attrs::new(),
            vec!["count: ".into(), count.clone().into(), json!(null).into(), 1.5.into()],
        );

        let ctx = BuildContext::new(AppContext::default());
        let view = blueprint.build(&ctx).unwrap();
        view.connect(&Node::element("main"), None);
        assert_eq!(view.node().text_content(), "count: 31.5");

        count.set(4);
        assert_eq!(view.node().text_content(), "count: 41.5");
    }

    #[test]
    fn arrays_and_lists_flatten() {
        let content = Renderable::List(vec![
            json!(["a", ["b", null], 1]).into(),
            Renderable::lazy(|| "c".into()),
            Renderable::Empty,
        ]);

        let described: Vec<_> = content.into_blueprints().iter().map(Blueprint::describe).collect();
        assert_eq!(described, vec!["text \"a\"", "text \"b\"", "text \"1\"", "text \"c\""]);
    }

    #[test]
    fn one_blueprint_builds_independent_views() {
        let blueprint = h("div", Attrs::new(), vec!["x".into()]);
        let ctx = BuildContext::new(AppContext::default());

        let a = blueprint.build(&ctx).unwrap();
        let b = blueprint.build(&ctx).unwrap();
        assert_ne!(a.node(), b.node());
        assert_eq!(blueprint.tag(), Some("div"));
    }

    #[test]
    fn empty_renderables() {
        assert!(Renderable::Empty.is_empty());
        assert!(Renderable::from(json!(null)).is_empty());
        assert!(Renderable::List(vec![Renderable::Empty]).is_empty());
        assert!(!Renderable::from("x").is_empty());
        assert!(Renderable::from(None::<Blueprint>).is_empty());
    }
}
