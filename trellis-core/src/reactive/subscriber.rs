//! Subscriber bookkeeping for the reactive system.
//!
//! Every signal and memo owns a [`Subscribers`] registry: an ordered list of
//! observers keyed by [`SubscriberId`]. Subscribing returns a [`Subscription`]
//! handle that points back at the registry through a `Weak` reference, so a
//! handle never keeps a signal alive and a signal never owns the code that
//! unsubscribes from it.
//!
//! # Notification rounds
//!
//! Notification is synchronous and depth-first. If an observer writes to the
//! same source while a round is in flight, the write is recorded as pending
//! and a new round (carrying the latest value) starts only after the current
//! round has reached every remaining observer. Rounds are sequential, never
//! interleaved.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;

/// Unique identifier for a subscriber.
///
/// Each observer registration gets a fresh ID; the ID is what a
/// [`Subscription`] hands back to its source when unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a new unique ID for a signal or memo.
pub(crate) fn next_source_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An observer of a reactive source.
///
/// `next` receives every published value. `error` and `complete` are
/// optional. Closures convert into observers directly, so both calling
/// conventions work:
///
/// ```rust,ignore
/// signal.subscribe(|value: &i32| println!("{value}"));
/// signal.subscribe(Observer::new(|v: &i32| println!("{v}")).on_complete(|| println!("done")));
/// ```
pub struct Observer<T> {
    next: Box<dyn FnMut(&T)>,
    error: Option<Box<dyn FnMut(&Error)>>,
    complete: Option<Box<dyn FnOnce()>>,
}

impl<T> Observer<T> {
    /// Create an observer with only a `next` callback.
    pub fn new<F>(next: F) -> Self
    where
        F: FnMut(&T) + 'static,
    {
        Self {
            next: Box::new(next),
            error: None,
            complete: None,
        }
    }

    /// Attach an error callback.
    pub fn on_error<F>(mut self, error: F) -> Self
    where
        F: FnMut(&Error) + 'static,
    {
        self.error = Some(Box::new(error));
        self
    }

    /// Attach a completion callback.
    pub fn on_complete<F>(mut self, complete: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        self.complete = Some(Box::new(complete));
        self
    }

    pub(crate) fn next(&mut self, value: &T) {
        (self.next)(value);
    }

    pub(crate) fn error(&mut self, error: &Error) {
        if let Some(on_error) = self.error.as_mut() {
            on_error(error);
        }
    }

    pub(crate) fn complete(&mut self) {
        if let Some(on_complete) = self.complete.take() {
            on_complete();
        }
    }
}

impl<T, F> From<F> for Observer<T>
where
    F: FnMut(&T) + 'static,
{
    fn from(next: F) -> Self {
        Observer::new(next)
    }
}

/// Something a [`Subscription`] can hand its ID back to.
pub(crate) trait Unsubscribe {
    fn unsubscribe(&self, id: SubscriberId);
}

/// Handle for an active observer registration.
///
/// Ownership of the registration is explicit: the holder must call
/// [`Subscription::unsubscribe`]. Dropping the handle does not unsubscribe.
pub struct Subscription {
    id: SubscriberId,
    link: Link,
    closed: Cell<bool>,
}

enum Link {
    /// Back-reference to the registry the observer lives in.
    Source(Weak<dyn Unsubscribe>),
    /// Arbitrary cleanup, run once.
    Teardown(RefCell<Option<Box<dyn FnOnce()>>>),
    Closed,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, source: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            link: Link::Source(source),
            closed: Cell::new(false),
        }
    }

    /// A subscription whose `unsubscribe` runs `teardown`.
    ///
    /// Used to fold several registrations (or any other cleanup) into a
    /// single handle.
    pub fn from_teardown(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            id: SubscriberId::new(),
            link: Link::Teardown(RefCell::new(Some(Box::new(teardown)))),
            closed: Cell::new(false),
        }
    }

    /// A subscription that is already closed.
    pub fn empty() -> Self {
        Self {
            id: SubscriberId::new(),
            link: Link::Closed,
            closed: Cell::new(true),
        }
    }

    /// The subscriber ID this handle refers to.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop receiving notifications. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.closed.replace(true) {
            return;
        }
        match &self.link {
            Link::Source(source) => {
                if let Some(source) = source.upgrade() {
                    source.unsubscribe(self.id);
                }
            }
            Link::Teardown(teardown) => {
                let teardown = teardown.borrow_mut().take();
                if let Some(teardown) = teardown {
                    teardown();
                }
            }
            Link::Closed => {}
        }
    }

    /// Whether `unsubscribe` has been called (or the source is gone).
    pub fn is_closed(&self) -> bool {
        if self.closed.get() {
            return true;
        }
        match &self.link {
            Link::Source(source) => source.strong_count() == 0,
            Link::Teardown(_) => false,
            Link::Closed => true,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A registered observer and the last round it received.
struct Entry<T> {
    id: SubscriberId,
    observer: Rc<RefCell<Observer<T>>>,
    seen: Rc<Cell<u64>>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            observer: Rc::clone(&self.observer),
            seen: Rc::clone(&self.seen),
        }
    }
}

/// Ordered observer registry with sequential notification rounds.
///
/// Every published change bumps a generation counter. An observer that was
/// already handed the value of a generation (through its initial replay) is
/// skipped by the round that delivers that generation.
pub struct Subscribers<T> {
    entries: RefCell<Vec<Entry<T>>>,
    notifying: Cell<bool>,
    pending: Cell<bool>,
    generation: Cell<u64>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            notifying: Cell::new(false),
            pending: Cell::new(false),
            generation: Cell::new(0),
        }
    }

    /// Register an observer at the end of the list.
    pub(crate) fn insert(&self, observer: Observer<T>) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.borrow_mut().push(Entry {
            id,
            observer: Rc::new(RefCell::new(observer)),
            seen: Rc::new(Cell::new(self.generation.get())),
        });
        id
    }

    /// Remove an observer. Returns `true` if it was registered.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.borrow().iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Publish a change. `latest` is read once per round, so observers always
    /// see the most recent value even when a round was re-queued.
    pub(crate) fn publish(&self, latest: impl Fn() -> T) {
        self.generation.set(self.generation.get() + 1);
        self.pending.set(true);
        if self.notifying.get() {
            return;
        }
        let _round = RoundGuard::enter(&self.notifying);
        self.drain(&latest);
    }

    /// Deliver the current value to a freshly registered observer.
    ///
    /// The observer is stamped with the current generation, so a round that
    /// is already queued for that generation does not deliver it again.
    pub(crate) fn replay(&self, id: SubscriberId, latest: impl Fn() -> T) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let value = latest();
        entry.seen.set(self.generation.get());
        if self.notifying.get() {
            deliver(&entry.observer, &value);
            return;
        }
        let _round = RoundGuard::enter(&self.notifying);
        deliver(&entry.observer, &value);
        self.drain(&latest);
    }

    /// Deliver an error to every observer.
    pub(crate) fn publish_error(&self, error: &Error) {
        for entry in self.snapshot() {
            if !self.contains(entry.id) {
                continue;
            }
            match entry.observer.try_borrow_mut() {
                Ok(mut observer) => observer.error(error),
                Err(_) => tracing::warn!(subscriber = ?entry.id, "skipping re-entrant error delivery"),
            }
        }
    }

    /// Complete every observer and drop them all.
    pub(crate) fn complete_all(&self) {
        let entries = std::mem::take(&mut *self.entries.borrow_mut());
        for entry in entries {
            if let Ok(mut observer) = entry.observer.try_borrow_mut() {
                observer.complete();
            }
        }
    }

    fn drain(&self, latest: &impl Fn() -> T) {
        while self.pending.replace(false) {
            let generation = self.generation.get();
            let value = latest();
            for entry in self.snapshot() {
                // Observers removed earlier in this round are skipped, and so
                // are observers whose replay already carried this generation.
                if self.contains(entry.id) && entry.seen.replace(generation) != generation {
                    deliver(&entry.observer, &value);
                }
            }
        }
    }

    fn entry(&self, id: SubscriberId) -> Option<Entry<T>> {
        self.entries.borrow().iter().find(|entry| entry.id == id).cloned()
    }

    fn snapshot(&self) -> Vec<Entry<T>> {
        self.entries.borrow().clone()
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver<T>(observer: &Rc<RefCell<Observer<T>>>, value: &T) {
    match observer.try_borrow_mut() {
        Ok(mut observer) => observer.next(value),
        Err(_) => tracing::warn!("skipping re-entrant notification of a busy observer"),
    }
}

/// Marks a registry as notifying for the lifetime of the guard.
struct RoundGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> RoundGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
