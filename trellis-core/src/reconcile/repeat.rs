//! Keyed list reconciler.
//!
//! # How the Diff Works
//!
//! Each rendered item remembers its key, a writable cell for its value, a
//! writable cell for its index and the view built for it. On every emission:
//!
//! 1. The new key of every item is computed.
//! 2. Items whose key is gone are disconnected.
//! 3. Items whose key survives keep their view; their value and index cells
//!    are set in place, which updates exactly the bindings that read them.
//! 4. New keys are rendered and built.
//! 5. Every item is connected in list order. Connecting a connected view only
//!    moves it, and a node that is already in place is not moved at all.
//!
//! Duplicate keys are matched to old items in order of appearance.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use super::Slot;
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::reactive::{ReadSignal, Signal};
use crate::view::{AnyView, Blueprint, View};

/// A cell value that can be repeated over.
pub trait IntoItems {
    type Item: Clone + PartialEq + 'static;

    /// The items, or an error if the value is not a list.
    fn to_items(&self) -> Result<Vec<Self::Item>>;
}

impl<T: Clone + PartialEq + 'static> IntoItems for Vec<T> {
    type Item = T;

    fn to_items(&self) -> Result<Vec<T>> {
        Ok(self.clone())
    }
}

impl IntoItems for Value {
    type Item = Value;

    fn to_items(&self) -> Result<Vec<Value>> {
        match self {
            Value::Array(items) => Ok(items.clone()),
            other => Err(Error::NotAnArray {
                actual: Error::shape_of(other),
            }),
        }
    }
}

type KeyFn<T, K> = Rc<dyn Fn(&T) -> K>;
type RenderFn<T> = Rc<dyn Fn(ReadSignal<T>, ReadSignal<usize>) -> Blueprint>;

/// Repeat over `source`, using each item as its own key.
///
/// `render` runs once per key and receives cells for the item's value and
/// position.
///
/// ```rust
/// use trellis_core::reactive::Signal;
/// use trellis_core::reconcile::repeat;
/// use trellis_core::view::{h, Attrs};
///
/// let ids = Signal::new(vec![1, 2, 3]);
/// let list = h("ul", Attrs::new(), vec![
///     repeat(&ids, |id, _index| h("li", Attrs::new(), vec![id.into()])).into(),
/// ]);
/// # let _ = list;
/// ```
pub fn repeat<S>(
    source: impl Into<ReadSignal<S>>,
    render: impl Fn(ReadSignal<S::Item>, ReadSignal<usize>) -> Blueprint + 'static,
) -> Blueprint
where
    S: IntoItems + Clone + PartialEq + 'static,
    S::Item: Hash + Eq,
{
    repeat_keyed(source, |item: &S::Item| item.clone(), render)
}

/// Repeat over `source`, keying each item with `key`.
///
/// Building the returned blueprint fails with [`Error::NotAnArray`] when the
/// source does not currently hold a list.
pub fn repeat_keyed<S, K>(
    source: impl Into<ReadSignal<S>>,
    key: impl Fn(&S::Item) -> K + 'static,
    render: impl Fn(ReadSignal<S::Item>, ReadSignal<usize>) -> Blueprint + 'static,
) -> Blueprint
where
    S: IntoItems + Clone + PartialEq + 'static,
    K: Hash + Eq + Clone + 'static,
{
    let source = source.into();
    let key: KeyFn<S::Item, K> = Rc::new(key);
    let render: RenderFn<S::Item> = Rc::new(render);

    Blueprint::from_fn("repeat", move |ctx| {
        // A source that is not a list fails the build; later emissions are
        // reported on the framework channel instead.
        source.get().to_items()?;
        let view: AnyView = Rc::new(RepeatView {
            source: source.clone(),
            state: Rc::new(RepeatState {
                slot: Slot::new("repeat", ctx),
                items: RefCell::new(Vec::new()),
                key: key.clone(),
                render: render.clone(),
            }),
        });
        Ok(view)
    })
}

struct Item<T, K> {
    key: K,
    value: Signal<T>,
    index: Signal<usize>,
    view: AnyView,
}

struct RepeatState<T, K> {
    slot: Slot,
    items: RefCell<Vec<Item<T, K>>>,
    key: KeyFn<T, K>,
    render: RenderFn<T>,
}

struct RepeatView<S: IntoItems, K> {
    source: ReadSignal<S>,
    state: Rc<RepeatState<S::Item, K>>,
}

impl<T, K> RepeatState<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Hash + Eq + Clone + 'static,
{
    fn update(&self, values: Vec<T>) {
        let keys: Vec<K> = values.iter().map(|value| (self.key)(value)).collect();
        let live: HashSet<&K> = keys.iter().collect();

        let mut old: IndexMap<K, VecDeque<Item<T, K>>> = IndexMap::new();
        for item in self.items.take() {
            if live.contains(&item.key) {
                old.entry(item.key.clone()).or_default().push_back(item);
            } else {
                item.view.disconnect();
            }
        }

        let mut items = Vec::with_capacity(values.len());
        for (index, (value, key)) in values.into_iter().zip(keys).enumerate() {
            if let Some(item) = old.get_mut(&key).and_then(VecDeque::pop_front) {
                item.value.set(value);
                item.index.set(index);
                items.push(item);
                continue;
            }

            let value = Signal::new(value);
            let position = Signal::new(index);
            let blueprint = (self.render)(value.read_only(), position.read_only());
            match blueprint.build(&self.slot.build) {
                Ok(view) => items.push(Item {
                    key,
                    value,
                    index: position,
                    view,
                }),
                Err(err) => self
                    .slot
                    .channel
                    .error(format!("repeat: failed to build item {index}: {err}")),
            }
        }

        // Surplus duplicates.
        for item in old.into_values().flatten() {
            item.view.disconnect();
        }

        let views: Vec<AnyView> = items.iter().map(|item| item.view.clone()).collect();
        *self.items.borrow_mut() = items;
        self.slot.place(views);
    }

    fn clear(&self) {
        // Item views are disconnected by the slot.
        self.items.take();
    }
}

impl<S, K> View for RepeatView<S, K>
where
    S: IntoItems + Clone + PartialEq + 'static,
    K: Hash + Eq + Clone + 'static,
{
    fn node(&self) -> Node {
        self.state.slot.placeholder.clone()
    }

    fn last_node(&self) -> Node {
        self.state.slot.last_node()
    }

    fn is_connected(&self) -> bool {
        self.state.slot.is_connected()
    }

    fn connect(&self, parent: &Node, after: Option<&Node>) {
        if !self.state.slot.attach(parent, after) {
            return;
        }
        let state = Rc::downgrade(&self.state);
        let subscription = self.source.subscribe(move |source: &S| {
            let Some(state) = state.upgrade() else {
                return;
            };
            match source.to_items() {
                Ok(values) => state.update(values),
                Err(err) => state.slot.channel.error(format!("repeat: {err}")),
            }
        });
        self.state.slot.set_subscription(subscription);
    }

    fn disconnect(&self) {
        self.state.slot.detach();
        self.state.clear();
    }

    fn subscription_count(&self) -> usize {
        self.state.slot.subscription_count()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
