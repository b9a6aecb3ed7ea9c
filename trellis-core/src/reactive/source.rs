//! Read-only reactive handles.
//!
//! [`ReadSignal`] erases the difference between a [`Signal`] and a [`Memo`]:
//! anything that can be read and observed. Views, bindings and component
//! attributes take `ReadSignal`s so callers can pass either kind.

use std::fmt::Debug;
use std::rc::Rc;

use super::memo::Memo;
use super::signal::Signal;
use super::subscriber::{Observer, Subscription};
use crate::error::Error;

/// The capability shared by every readable reactive value.
pub trait Source<T> {
    /// Unique ID of the underlying signal or memo.
    fn id(&self) -> u64;

    /// Current value.
    fn get(&self) -> T;

    /// Register an observer; the current value is replayed synchronously.
    fn subscribe(&self, observer: Observer<T>) -> Subscription;

    /// Number of registered observers.
    fn observer_count(&self) -> usize;

    /// Distance from the nearest signal: 0 for signals, one more than the
    /// highest input for memos.
    fn height(&self) -> usize {
        0
    }
}

/// A cloneable, read-only handle to a signal or memo.
pub struct ReadSignal<T> {
    source: Rc<dyn Source<T>>,
}

impl<T> ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) fn from_source(source: Rc<dyn Source<T>>) -> Self {
        Self { source }
    }

    /// A read-only signal that never changes.
    pub fn constant(value: T) -> Self {
        Signal::new(value).read_only()
    }

    pub fn id(&self) -> u64 {
        self.source.id()
    }

    pub fn get(&self) -> T {
        self.source.get()
    }

    pub fn subscribe(&self, observer: impl Into<Observer<T>>) -> Subscription {
        self.source.subscribe(observer.into())
    }

    pub fn subscribe_with(
        &self,
        next: impl FnMut(&T) + 'static,
        error: impl FnMut(&Error) + 'static,
        complete: impl FnOnce() + 'static,
    ) -> Subscription {
        self.subscribe(Observer::new(next).on_error(error).on_complete(complete))
    }

    pub fn observer_count(&self) -> usize {
        self.source.observer_count()
    }

    pub(crate) fn height(&self) -> usize {
        self.source.height()
    }

    /// Derive a value from this handle.
    pub fn map<U>(&self, f: impl Fn(&T) -> U + 'static) -> Memo<U>
    where
        U: Clone + PartialEq + 'static,
    {
        Memo::new(self, f)
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<T> PartialEq for ReadSignal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.source.id() == other.source.id()
    }
}

impl<T> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.source.id())
            .field("observer_count", &self.source.observer_count())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for ReadSignal<T> {
    fn from(signal: Signal<T>) -> Self {
        signal.read_only()
    }
}

impl<T: Clone + PartialEq + 'static> From<&Signal<T>> for ReadSignal<T> {
    fn from(signal: &Signal<T>) -> Self {
        signal.read_only()
    }
}

impl<T: Clone + PartialEq + 'static> From<Memo<T>> for ReadSignal<T> {
    fn from(memo: Memo<T>) -> Self {
        memo.read_only()
    }
}

impl<T: Clone + PartialEq + 'static> From<&Memo<T>> for ReadSignal<T> {
    fn from(memo: &Memo<T>) -> Self {
        memo.read_only()
    }
}

impl<T: Clone + PartialEq + 'static> From<&ReadSignal<T>> for ReadSignal<T> {
    fn from(signal: &ReadSignal<T>) -> Self {
        signal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn read_only_handle_tracks_the_signal() {
        let signal = Signal::new(1);
        let read = signal.read_only();

        signal.set(2);
        assert_eq!(read.get(), 2);
        assert_eq!(read.id(), signal.id());
    }

    #[test]
    fn read_only_subscriptions_count_on_the_source() {
        let signal = Signal::new(1);
        let read: ReadSignal<i32> = (&signal).into();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();

        let sub = read.subscribe(move |_: &i32| c.set(c.get() + 1));
        assert_eq!(signal.observer_count(), 1);
        signal.set(5);
        assert_eq!(calls.get(), 2);

        sub.unsubscribe();
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn constant_never_changes() {
        let constant = ReadSignal::constant("fixed".to_string());
        assert_eq!(constant.get(), "fixed");
        assert_eq!(constant.clone(), constant);
    }
}
