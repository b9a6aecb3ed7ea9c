//! Effect Implementation
//!
//! An Effect is a side-effecting callback attached to a reactive source. It
//! can be started and stopped any number of times; each start subscribes
//! (and therefore runs once with the current value), each stop unsubscribes.
//!
//! # Use Cases
//!
//! Effects synchronize reactive state with the outside world:
//!
//! - Updating DOM nodes when state changes
//! - Mirroring component attributes
//! - Logging state changes
//!
//! Components use lazy effects to defer observation until they are connected
//! and to stop observing when they are disconnected.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::source::ReadSignal;
use super::subscriber::Subscription;

/// A restartable observer of a reactive source.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let effect = Effect::new(&count, |n: &i32| println!("count is {n}"));
///
/// count.set(5); // prints "count is 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

struct EffectInner {
    /// Subscribes the callback; called on every start.
    start: Box<dyn Fn() -> Subscription>,

    /// The live subscription while running.
    subscription: RefCell<Option<Subscription>>,

    /// Number of times the callback has run.
    run_count: Rc<Cell<usize>>,

    /// Whether the effect has been disposed.
    disposed: Cell<bool>,
}

impl Effect {
    /// Create an effect and start it immediately.
    pub fn new<T>(source: impl Into<ReadSignal<T>>, callback: impl FnMut(&T) + 'static) -> Self
    where
        T: Clone + PartialEq + 'static,
    {
        let effect = Self::new_lazy(source, callback);
        effect.start();
        effect
    }

    /// Create an effect without starting it.
    pub fn new_lazy<T>(source: impl Into<ReadSignal<T>>, callback: impl FnMut(&T) + 'static) -> Self
    where
        T: Clone + PartialEq + 'static,
    {
        let source = source.into();
        let callback = Rc::new(RefCell::new(callback));
        let run_count = Rc::new(Cell::new(0));

        let counter = run_count.clone();
        let start = Box::new(move || {
            let callback = callback.clone();
            let counter = counter.clone();
            source.subscribe(move |value: &T| {
                counter.set(counter.get() + 1);
                (*callback.borrow_mut())(value);
            })
        });

        Self {
            inner: Rc::new(EffectInner {
                start,
                subscription: RefCell::new(None),
                run_count,
                disposed: Cell::new(false),
            }),
        }
    }

    /// Subscribe to the source. No-op if already running or disposed.
    pub fn start(&self) {
        if self.inner.disposed.get() || self.is_running() {
            return;
        }
        let subscription = (self.inner.start)();
        *self.inner.subscription.borrow_mut() = Some(subscription);
    }

    /// Unsubscribe from the source. The effect can be started again.
    pub fn stop(&self) {
        let subscription = self.inner.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    /// Stop the effect permanently.
    pub fn dispose(&self) {
        self.stop();
        self.inner.disposed.set(true);
    }

    pub fn is_running(&self) -> bool {
        self.inner.subscription.borrow().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of times the callback has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("running", &self.is_running())
            .field("disposed", &self.is_disposed())
            .field("run_count", &self.run_count())
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

    #[test]
    fn effect_runs_on_start_and_on_change() {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();

        let effect = Effect::new(&signal, move |v: &i32| s.borrow_mut().push(*v));
        assert_eq!(*seen.borrow(), vec![0]);

        signal.set(42);
        assert_eq!(*seen.borrow(), vec![0, 42]);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn lazy_effect_waits_for_start() {
        let signal = Signal::new(1);
        let effect = Effect::new_lazy(&signal, |_: &i32| {});
        assert_eq!(effect.run_count(), 0);
        assert_eq!(signal.observer_count(), 0);

        effect.start();
        effect.start();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.observer_count(), 1);
    }

    #[test]
    fn stopped_effect_can_restart() {
        let signal = Signal::new(1);
        let effect = Effect::new(&signal, |_: &i32| {});

        effect.stop();
        assert_eq!(signal.observer_count(), 0);
        signal.set(2);
        assert_eq!(effect.run_count(), 1);

        effect.start();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn disposed_effect_does_not_run() {
        let signal = Signal::new(0);
        let effect = Effect::new(&signal, |_: &i32| {});
        effect.dispose();

        effect.start();
        signal.set(1);
        signal.set(2);
        assert_eq!(effect.run_count(), 1);
        assert!(effect.is_disposed());
        assert_eq!(signal.observer_count(), 0);
    }
}
