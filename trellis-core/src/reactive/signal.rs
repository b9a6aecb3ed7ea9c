//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a single mutable value
//! with equality-gated change notification.
//!
//! # How Signals Work
//!
//! 1. `subscribe` registers an observer and immediately replays the current
//!    value to it, synchronously, before returning.
//!
//! 2. `set` compares the new value with the current one. Structurally equal
//!    values (`PartialEq`) are a no-op: nothing is stored, nobody is notified.
//!
//! 3. A changed value is published to every observer before `set` returns.
//!    The round runs inside a batch, so derived memos settle once after the
//!    signal's own observers have run.
//!
//! # Copy-on-write updates
//!
//! [`Signal::update`] hands the updater a clone of the current value (the
//! draft). The published value is never mutated in place, so observers that
//! kept a copy of an earlier value never see it change underneath them.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::batch::batch;
use super::memo::Memo;
use super::source::{ReadSignal, Source};
use super::subscriber::{next_source_id, Observer, SubscriberId, Subscribers, Subscription, Unsubscribe};
use crate::error::Error;

/// A writable reactive value.
///
/// Cloning a signal clones the handle; both handles share one value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    /// Unique identifier for this signal.
    id: u64,

    /// The current (last published) value.
    value: RefCell<T>,

    /// Registered observers.
    subscribers: Subscribers<T>,
}

impl<T> Unsubscribe for SignalInner<T> {
    fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.remove(id);
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_source_id(),
                value: RefCell::new(value),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store a new value and notify observers.
    ///
    /// Returns `false` (and notifies nobody) when the value is equal to the
    /// current one.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };

        if changed {
            let inner = &self.inner;
            batch(|| inner.subscribers.publish(|| inner.value.borrow().clone()));
        }
        changed
    }

    /// Compute the next value from the current one.
    pub fn set_with(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = self.with(f);
        self.set(next)
    }

    /// Mutate a draft copy of the current value, then publish it.
    ///
    /// The draft is a clone; the previously published value is untouched.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut draft = self.get();
        f(&mut draft);
        self.set(draft)
    }

    /// Register an observer. The current value is delivered before this
    /// method returns.
    pub fn subscribe(&self, observer: impl Into<Observer<T>>) -> Subscription {
        let id = self.inner.subscribers.insert(observer.into());
        let inner = &self.inner;
        inner.subscribers.replay(id, || inner.value.borrow().clone());
        let weak: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
        Subscription::new(id, weak)
    }

    /// Register positional `next`, `error` and `complete` callbacks.
    pub fn subscribe_with(
        &self,
        next: impl FnMut(&T) + 'static,
        error: impl FnMut(&Error) + 'static,
        complete: impl FnOnce() + 'static,
    ) -> Subscription {
        self.subscribe(Observer::new(next).on_error(error).on_complete(complete))
    }

    /// Deliver an error to observers without changing the value.
    pub fn emit_error(&self, error: &Error) {
        self.inner.subscribers.publish_error(error);
    }

    /// Complete every observer and drop them. The value stays readable and
    /// writable; new observers may subscribe afterwards.
    pub fn complete(&self) {
        self.inner.subscribers.complete_all();
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// A read-only handle to this signal.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal::from_source(Rc::new(self.clone()))
    }

    /// Derive a value from this signal.
    pub fn map<U>(&self, f: impl Fn(&T) -> U + 'static) -> Memo<U>
    where
        U: Clone + PartialEq + 'static,
    {
        Memo::new(self, f)
    }
}

impl Signal<bool> {
    /// Flip a boolean signal.
    pub fn toggle(&self) {
        self.set_with(|v| !v);
    }
}

impl<T> Source<T> for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> u64 {
        Signal::id(self)
    }

    fn get(&self) -> T {
        Signal::get(self)
    }

    fn subscribe(&self, observer: Observer<T>) -> Subscription {
        Signal::subscribe(self, observer)
    }

    fn observer_count(&self) -> usize {
        Signal::observer_count(self)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Signal<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("observer_count", &self.inner.subscribers.len())
            .finish()
    }
}

impl<T> Default for Signal<T>
where
    T: Clone + PartialEq + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use serde_json::json;

    fn counter() -> (Rc<Cell<i32>>, impl FnMut(&i32)) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move |_: &i32| c.set(c.get() + 1))
    }

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn subscribe_replays_current_value_once() {
        let signal = Signal::new(3);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();

        let _sub = signal.subscribe(move |v: &i32| s.borrow_mut().push(*v));
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn equal_values_do_not_notify() {
        let signal = Signal::new(json!({"a": [1, 2], "b": {"c": true}}));
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let _sub = signal.subscribe(move |_: &serde_json::Value| c.set(c.get() + 1));
        assert_eq!(count.get(), 1);

        assert!(signal.set(json!({"a": [1, 2], "b": {"c": false}})));
        assert_eq!(count.get(), 2);

        // Deep clone of the current value.
        assert!(!signal.set(json!({"a": [1, 2], "b": {"c": false}})));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn signal_notifies_and_unsubscribes() {
        let signal = Signal::new(0);
        let (count, observer) = counter();

        let subscription = signal.subscribe(observer);
        assert_eq!(count.get(), 1);

        signal.set(1);
        assert_eq!(count.get(), 2);

        subscription.unsubscribe();
        signal.set(2);
        assert_eq!(count.get(), 2);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn update_mutates_a_draft() {
        let signal = Signal::new(vec![1, 2, 3]);
        let before = signal.get();

        assert!(signal.update(|draft| draft.push(4)));
        assert_eq!(signal.get(), vec![1, 2, 3, 4]);
        assert_eq!(before, vec![1, 2, 3]);

        // A draft that ends up equal is a no-op.
        assert!(!signal.update(|draft| {
            draft.push(5);
            draft.pop();
        }));
    }

    #[test]
    fn set_with_receives_current_value() {
        let signal = Signal::new(10);
        signal.set_with(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn reentrant_set_starts_a_new_round_after_the_current_one() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let writer = signal.clone();
        let l = log.clone();
        let _a = signal.subscribe(move |v: &i32| {
            l.borrow_mut().push(("a", *v));
            if *v == 1 {
                writer.set(2);
            }
        });
        let l = log.clone();
        let _b = signal.subscribe(move |v: &i32| l.borrow_mut().push(("b", *v)));

        log.borrow_mut().clear();
        signal.set(1);

        // `b` sees 1 before anyone sees 2.
        assert_eq!(
            *log.borrow(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
    }

    #[test]
    fn subscribing_during_a_round_does_not_double_fire() {
        let signal = Signal::new(0);
        let late_calls = Rc::new(Cell::new(0));
        let late_sub = Rc::new(RefCell::new(None));

        let source = signal.clone();
        let late = late_calls.clone();
        let holder = late_sub.clone();
        let _first = signal.subscribe(move |v: &i32| {
            if *v == 1 && holder.borrow().is_none() {
                let late = late.clone();
                let sub = source.subscribe(move |_: &i32| late.set(late.get() + 1));
                *holder.borrow_mut() = Some(sub);
            }
        });

        signal.set(1);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn subscribing_after_a_nested_set_receives_the_value_once() {
        let signal = Signal::new(0);
        let late_seen = Rc::new(RefCell::new(Vec::new()));
        let late_sub = Rc::new(RefCell::new(None));

        let source = signal.clone();
        let seen = late_seen.clone();
        let holder = late_sub.clone();
        let _first = signal.subscribe(move |v: &i32| {
            if *v == 1 {
                source.set(2);
                let seen = seen.clone();
                let sub = source.subscribe(move |v: &i32| seen.borrow_mut().push(*v));
                *holder.borrow_mut() = Some(sub);
            }
        });

        signal.set(1);
        assert_eq!(*late_seen.borrow(), vec![2]);

        signal.set(3);
        assert_eq!(*late_seen.borrow(), vec![2, 3]);
    }

    #[test]
    fn positional_observer_receives_errors_and_completion() {
        let signal = Signal::new(1);
        let errors = Rc::new(Cell::new(0));
        let completed = Rc::new(Cell::new(false));

        let e = errors.clone();
        let c = completed.clone();
        let _sub = signal.subscribe_with(|_| {}, move |_| e.set(e.get() + 1), move || c.set(true));

        signal.emit_error(&Error::Computation("boom".into()));
        assert_eq!(errors.get(), 1);

        signal.complete();
        assert!(completed.get());
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1, signal2);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        assert_ne!(s1.id(), s2.id());
        assert_ne!(s1, s2);
    }

    #[test]
    fn toggle_flips_booleans() {
        let flag = Signal::new(false);
        flag.toggle();
        assert!(flag.get());
    }
}
