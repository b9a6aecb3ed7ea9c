//! Memo Implementation
//!
//! A Memo is a read-only value derived from one or more sources through a
//! transform or merge function.
//!
//! # How Memos Work
//!
//! 1. A memo with no observers holds no subscriptions to its sources.
//!    Reading it computes the value on demand from the sources' current
//!    values.
//!
//! 2. When the first observer arrives the memo activates: it subscribes to
//!    every source, buffering the latest value each one delivers. The merged
//!    value is computed only once every source has delivered at least once.
//!
//! 3. While active, a source emission buffers the new value and queues the
//!    memo in the current batch. The queue is flushed lowest memo first, so
//!    a memo that depends on a signal both directly and through another memo
//!    recomputes once, after both inputs have settled. The result is
//!    compared with the cached output and observers are notified only when
//!    the output changed.
//!
//! 4. When the last observer leaves, the memo unsubscribes from all sources
//!    and discards the buffered values.
//!
//! 5. When any source completes, the memo deactivates and completes its own
//!    observers. A later subscriber activates it again from scratch.
//!
//! # Output-side equality
//!
//! The equality gate is applied to the memo's output, not its inputs. Two
//! different input combinations that map to an equal output do not notify.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::batch::{schedule, Refresh};
use super::source::{ReadSignal, Source};
use super::subscriber::{next_source_id, Observer, SubscriberId, Subscribers, Subscription, Unsubscribe};
use crate::error::Error;

/// Activation state of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// No observers; the value is computed on demand.
    Idle,

    /// Subscribed to sources; `get` returns the cached value.
    Active,
}

/// One upstream dependency of a memo.
///
/// `activate` subscribes to the source, writing each delivered value into a
/// typed slot shared with the memo's compute closures. `reset` empties it.
struct Input {
    height: usize,
    activate: Box<dyn Fn(Hooks) -> Subscription>,
    reset: Box<dyn Fn()>,
}

/// Callbacks an input forwards its source's events to.
#[derive(Clone)]
struct Hooks {
    change: Rc<dyn Fn()>,
    error: Rc<dyn Fn(&Error)>,
    complete: Rc<dyn Fn()>,
}

fn input<S>(source: ReadSignal<S>, slot: Rc<RefCell<Option<S>>>) -> Input
where
    S: Clone + PartialEq + 'static,
{
    let reset_slot = slot.clone();
    Input {
        height: source.height(),
        activate: Box::new(move |hooks: Hooks| {
            let slot = slot.clone();
            let Hooks { change, error, complete } = hooks;
            let observer = Observer::new(move |value: &S| {
                *slot.borrow_mut() = Some(value.clone());
                change();
            })
            .on_error(move |err| error(err))
            .on_complete(move || complete());
            source.subscribe(observer)
        }),
        reset: Box::new(move || {
            reset_slot.borrow_mut().take();
        }),
    }
}

fn slot<S>() -> Rc<RefCell<Option<S>>> {
    Rc::new(RefCell::new(None))
}

/// A derived, read-only reactive value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(5);
/// let doubled = count.map(|n| n * 2);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T> {
    inner: Rc<MemoInner<T>>,
}

struct MemoInner<T> {
    /// Unique identifier for this memo.
    id: u64,

    /// One more than the highest input.
    height: usize,

    /// Upstream dependencies.
    inputs: Vec<Input>,

    /// Compute from buffered input values; `None` until every input delivered.
    from_buffer: Box<dyn Fn() -> Option<T>>,

    /// Compute directly from the sources' current values.
    from_sources: Box<dyn Fn() -> T>,

    /// Last computed output while active.
    cached: RefCell<Option<T>>,

    /// Subscriptions to inputs, held only while active.
    input_subscriptions: RefCell<Vec<Subscription>>,

    /// Whether the memo is subscribed to its inputs.
    active: Cell<bool>,

    /// Set while subscribing to inputs so replays do not each recompute.
    activating: Cell<bool>,

    /// Whether the memo sits in the batch queue.
    queued: Cell<bool>,

    subscribers: Subscribers<T>,
}

impl<T> MemoInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn activate(self: &Rc<Self>) {
        self.active.set(true);
        self.activating.set(true);

        let weak = Rc::downgrade(self);
        let change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        });
        let weak = Rc::downgrade(self);
        let error: Rc<dyn Fn(&Error)> = Rc::new(move |error: &Error| {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.publish_error(error);
            }
        });
        let weak = Rc::downgrade(self);
        let complete: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.complete();
            }
        });
        let hooks = Hooks { change, error, complete };

        let subscriptions: Vec<Subscription> = self
            .inputs
            .iter()
            .map(|input| (input.activate)(hooks.clone()))
            .collect();
        *self.input_subscriptions.borrow_mut() = subscriptions;

        self.activating.set(false);
        *self.cached.borrow_mut() = (self.from_buffer)();
    }

    fn deactivate(&self) {
        self.active.set(false);
        let subscriptions = std::mem::take(&mut *self.input_subscriptions.borrow_mut());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        for input in &self.inputs {
            (input.reset)();
        }
        self.cached.borrow_mut().take();
    }

    /// Called once per input emission; queues a recompute.
    fn invalidate(self: &Rc<Self>) {
        if self.activating.get() || self.queued.replace(true) {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        schedule(weak);
    }

    /// A source completed: stop observing and complete our own observers.
    fn complete(&self) {
        if self.active.get() {
            self.deactivate();
        }
        self.subscribers.complete_all();
    }

    fn recompute(&self) {
        let Some(next) = (self.from_buffer)() else {
            return;
        };

        let changed = {
            let mut cached = self.cached.borrow_mut();
            if cached.as_ref() == Some(&next) {
                false
            } else {
                *cached = Some(next);
                true
            }
        };

        if changed {
            self.subscribers.publish(|| self.current());
        }
    }

    fn current(&self) -> T {
        match self.cached.borrow().as_ref() {
            Some(value) => value.clone(),
            None => (self.from_sources)(),
        }
    }
}

impl<T> Refresh for MemoInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn height(&self) -> usize {
        self.height
    }

    fn refresh(&self) {
        self.queued.set(false);
        if self.active.get() {
            self.recompute();
        }
    }
}

impl<T> Unsubscribe for MemoInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(id) && self.subscribers.is_empty() {
            self.deactivate();
        }
    }
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    fn from_parts(
        inputs: Vec<Input>,
        from_buffer: Box<dyn Fn() -> Option<T>>,
        from_sources: Box<dyn Fn() -> T>,
    ) -> Self {
        let height = 1 + inputs.iter().map(|input| input.height).max().unwrap_or(0);
        Self {
            inner: Rc::new(MemoInner {
                id: next_source_id(),
                height,
                inputs,
                from_buffer,
                from_sources,
                cached: RefCell::new(None),
                input_subscriptions: RefCell::new(Vec::new()),
                active: Cell::new(false),
                activating: Cell::new(false),
                queued: Cell::new(false),
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Derive a value from a single source.
    pub fn new<S>(source: impl Into<ReadSignal<S>>, f: impl Fn(&S) -> T + 'static) -> Self
    where
        S: Clone + PartialEq + 'static,
    {
        let source = source.into();
        let f = Rc::new(f);
        let buffered = slot::<S>();

        let (buf, fb) = (buffered.clone(), f.clone());
        let from_buffer = Box::new(move || buf.borrow().as_ref().map(|s| fb(s)));
        let src = source.clone();
        let from_sources = Box::new(move || f(&src.get()));

        Self::from_parts(vec![input(source, buffered)], from_buffer, from_sources)
    }

    /// Merge two sources of different types.
    pub fn merge2<A, B>(
        a: impl Into<ReadSignal<A>>,
        b: impl Into<ReadSignal<B>>,
        f: impl Fn(&A, &B) -> T + 'static,
    ) -> Self
    where
        A: Clone + PartialEq + 'static,
        B: Clone + PartialEq + 'static,
    {
        let (a, b) = (a.into(), b.into());
        let f = Rc::new(f);
        let (slot_a, slot_b) = (slot::<A>(), slot::<B>());

        let (sa, sb, fb) = (slot_a.clone(), slot_b.clone(), f.clone());
        let from_buffer = Box::new(move || {
            let (a, b) = (sa.borrow(), sb.borrow());
            Some(fb(a.as_ref()?, b.as_ref()?))
        });
        let (ra, rb) = (a.clone(), b.clone());
        let from_sources = Box::new(move || f(&ra.get(), &rb.get()));

        Self::from_parts(
            vec![input(a, slot_a), input(b, slot_b)],
            from_buffer,
            from_sources,
        )
    }

    /// Merge three sources of different types.
    pub fn merge3<A, B, C>(
        a: impl Into<ReadSignal<A>>,
        b: impl Into<ReadSignal<B>>,
        c: impl Into<ReadSignal<C>>,
        f: impl Fn(&A, &B, &C) -> T + 'static,
    ) -> Self
    where
        A: Clone + PartialEq + 'static,
        B: Clone + PartialEq + 'static,
        C: Clone + PartialEq + 'static,
    {
        let (a, b, c) = (a.into(), b.into(), c.into());
        let f = Rc::new(f);
        let (slot_a, slot_b, slot_c) = (slot::<A>(), slot::<B>(), slot::<C>());

        let (sa, sb, sc, fb) = (slot_a.clone(), slot_b.clone(), slot_c.clone(), f.clone());
        let from_buffer = Box::new(move || {
            let (a, b, c) = (sa.borrow(), sb.borrow(), sc.borrow());
            Some(fb(a.as_ref()?, b.as_ref()?, c.as_ref()?))
        });
        let (ra, rb, rc) = (a.clone(), b.clone(), c.clone());
        let from_sources = Box::new(move || f(&ra.get(), &rb.get(), &rc.get()));

        Self::from_parts(
            vec![input(a, slot_a), input(b, slot_b), input(c, slot_c)],
            from_buffer,
            from_sources,
        )
    }

    /// Merge any number of sources of the same type.
    pub fn merge_all<S>(sources: Vec<ReadSignal<S>>, f: impl Fn(&[S]) -> T + 'static) -> Self
    where
        S: Clone + PartialEq + 'static,
    {
        let f = Rc::new(f);
        let slots: Vec<_> = sources.iter().map(|_| slot::<S>()).collect();

        let (buffered, fb) = (slots.clone(), f.clone());
        let from_buffer = Box::new(move || {
            let values = buffered
                .iter()
                .map(|slot| slot.borrow().clone())
                .collect::<Option<Vec<S>>>()?;
            Some(fb(&values))
        });
        let readers = sources.clone();
        let from_sources = Box::new(move || {
            let values: Vec<S> = readers.iter().map(ReadSignal::get).collect();
            f(&values)
        });

        let inputs = sources
            .into_iter()
            .zip(slots)
            .map(|(source, slot)| input(source, slot))
            .collect();
        Self::from_parts(inputs, from_buffer, from_sources)
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current value: cached while active, computed from sources otherwise.
    pub fn get(&self) -> T {
        self.inner.current()
    }

    /// Register an observer, activating the memo if it was idle.
    pub fn subscribe(&self, observer: impl Into<Observer<T>>) -> Subscription {
        if !self.inner.is_active() {
            self.inner.activate();
        }
        let id = self.inner.subscribers.insert(observer.into());
        let inner = &self.inner;
        inner.subscribers.replay(id, || inner.current());
        let weak: Weak<MemoInner<T>> = Rc::downgrade(&self.inner);
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

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Whether the memo currently holds subscriptions to its sources.
    pub fn state(&self) -> MemoState {
        if self.inner.is_active() {
            MemoState::Active
        } else {
            MemoState::Idle
        }
    }

    /// A read-only handle to this memo.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal::from_source(Rc::new(self.clone()))
    }

    /// Derive a further value from this memo.
    pub fn map<U>(&self, f: impl Fn(&T) -> U + 'static) -> Memo<U>
    where
        U: Clone + PartialEq + 'static,
    {
        Memo::new(self, f)
    }
}

impl<T> Source<T> for Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> u64 {
        Memo::id(self)
    }

    fn get(&self) -> T {
        Memo::get(self)
    }

    fn subscribe(&self, observer: Observer<T>) -> Subscription {
        Memo::subscribe(self, observer)
    }

    fn observer_count(&self) -> usize {
        Memo::observer_count(self)
    }

    fn height(&self) -> usize {
        self.inner.height
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Memo<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    use serde_json::{json, Value};

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(&T)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        (seen, move |v: &T| s.borrow_mut().push(v.clone()))
    }

    #[test]
    fn idle_memo_computes_from_sources() {
        let calls = Rc::new(Cell::new(0));
        let source = Signal::new(2);
        let c = calls.clone();
        let squared = source.map(move |n| {
            c.set(c.get() + 1);
            n * n
        });

        assert_eq!(squared.state(), MemoState::Idle);
        assert_eq!(squared.get(), 4);
        source.set(3);
        assert_eq!(squared.get(), 9);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn memo_holds_no_source_subscriptions_while_idle() {
        let source = Signal::new(1);
        let doubled = source.map(|n| n * 2);
        assert_eq!(source.observer_count(), 0);

        let sub = doubled.subscribe(|_: &i32| {});
        assert_eq!(source.observer_count(), 1);
        assert_eq!(doubled.state(), MemoState::Active);

        sub.unsubscribe();
        assert_eq!(source.observer_count(), 0);
        assert_eq!(doubled.state(), MemoState::Idle);
    }

    #[test]
    fn equal_output_does_not_notify() {
        let coords = Signal::new(json!({"x": 10, "y": -5}));
        let mapped_x = coords.map(|c: &Value| c["x"].clone());
        let (seen, observer) = recorder::<Value>();
        let _sub = mapped_x.subscribe(observer);

        coords.set(json!({"x": 10, "y": 99}));
        assert_eq!(*seen.borrow(), vec![json!(10)]);

        coords.set(json!({"x": 11, "y": 99}));
        assert_eq!(*seen.borrow(), vec![json!(10), json!(11)]);
    }

    #[test]
    fn same_input_value_triggers_nothing() {
        let source = Signal::new(5);
        let doubled = source.map(|x| x * 2);
        let (seen, observer) = recorder::<i32>();
        let _sub = doubled.subscribe(observer);

        assert_eq!(*seen.borrow(), vec![10]);
        source.set(5);
        assert_eq!(*seen.borrow(), vec![10]);
    }

    #[test]
    fn merge_recomputes_once_per_emission() {
        let computations = Rc::new(Cell::new(0));
        let a = Signal::new(1);
        let b = Signal::new(10);
        let c = computations.clone();
        let sum = Memo::merge2(&a, &b, move |a, b| {
            c.set(c.get() + 1);
            a + b
        });

        let (seen, observer) = recorder::<i32>();
        let _sub = sum.subscribe(observer);
        assert_eq!(computations.get(), 1);
        assert_eq!(*seen.borrow(), vec![11]);

        a.set(2);
        assert_eq!(computations.get(), 2);
        b.set(20);
        assert_eq!(computations.get(), 3);
        assert_eq!(*seen.borrow(), vec![11, 12, 22]);
    }

    #[test]
    fn diamond_merge_settles_before_notifying() {
        let a = Signal::new(1);
        let doubled = a.map(|x| x * 2);
        let computations = Rc::new(Cell::new(0));
        let c = computations.clone();
        let pair = Memo::merge2(&a, &doubled, move |a: &i32, d: &i32| {
            c.set(c.get() + 1);
            (*a, *d)
        });
        let (seen, observer) = recorder::<(i32, i32)>();
        let _sub = pair.subscribe(observer);

        a.set(2);
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 4)]);
        assert_eq!(computations.get(), 2);

        a.set(3);
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 4), (3, 6)]);
    }

    #[test]
    fn completed_source_completes_the_memo() {
        let source = Signal::new(1);
        let doubled = source.map(|n| n * 2);
        let completed = Rc::new(Cell::new(false));
        let c = completed.clone();
        let _sub = doubled.subscribe_with(|_| {}, |_| {}, move || c.set(true));

        source.complete();
        assert!(completed.get());
        assert_eq!(doubled.state(), MemoState::Idle);
        assert_eq!(doubled.observer_count(), 0);

        source.set(5);
        assert_eq!(doubled.get(), 10);

        let (seen, observer) = recorder::<i32>();
        let _again = doubled.subscribe(observer);
        source.set(6);
        assert_eq!(*seen.borrow(), vec![10, 12]);
    }

    #[test]
    fn merge_ignoring_an_input_does_not_renotify() {
        let a = Signal::new(1);
        let b = Signal::new("b".to_string());
        let only_b = Memo::merge2(&a, &b, |_, b| b.clone());
        let (seen, observer) = recorder::<String>();
        let _sub = only_b.subscribe(observer);

        a.set(2);
        a.set(3);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn merge_all_and_merge3() {
        let sources: Vec<_> = (1..=3).map(Signal::new).collect();
        let total = Memo::merge_all(
            sources.iter().map(Signal::read_only).collect(),
            |values: &[i32]| values.iter().sum::<i32>(),
        );
        assert_eq!(total.get(), 6);
        let _sub = total.subscribe(|_: &i32| {});
        sources[2].set(10);
        assert_eq!(total.get(), 13);

        let label = Memo::merge3(&sources[0], &sources[1], &sources[2], |a, b, c| format!("{a}-{b}-{c}"));
        assert_eq!(label.get(), "1-2-10");
    }

    #[test]
    fn memo_chains_stay_lazy() {
        let source = Signal::new(1);
        let plus_one = source.map(|n| n + 1);
        let times_ten = plus_one.map(|n| n * 10);

        let sub = times_ten.subscribe(|_: &i32| {});
        assert_eq!(plus_one.state(), MemoState::Active);
        source.set(4);
        assert_eq!(times_ten.get(), 50);

        sub.unsubscribe();
        assert_eq!(plus_one.state(), MemoState::Idle);
        assert_eq!(source.observer_count(), 0);
    }

    #[test]
    fn errors_are_forwarded_from_sources() {
        let source = Signal::new(1);
        let doubled = source.map(|n| n * 2);
        let errors = Rc::new(Cell::new(0));
        let e = errors.clone();
        let _sub = doubled.subscribe_with(|_| {}, move |_| e.set(e.get() + 1), || {});

        source.emit_error(&Error::Computation("upstream".into()));
        assert_eq!(errors.get(), 1);
    }
}
