//! Batched Memo Propagation
//!
//! Signal writes open a batch. While a batch is open, memos whose inputs
//! changed are queued instead of recomputed; when the outermost batch closes,
//! the queue is flushed in order of memo height (distance from the nearest
//! signal). A memo therefore recomputes after every memo it depends on has
//! settled, and observers never see a mix of old and new inputs.
//!
//! # How Flushing Works
//!
//! 1. `Signal::set` runs its notification round inside [`batch`]. Direct
//!    observers of the signal run immediately; memo inputs only record the
//!    new value and call [`schedule`].
//!
//! 2. When the depth drops back to zero, the lowest queued memo is taken
//!    and refreshed. A refreshed memo that publishes a new value queues its
//!    own dependent memos, which are picked up by the same loop.
//!
//! 3. Writes made by observers during the flush open nested batches; their
//!    memos join the running queue.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A queued memo.
pub(crate) trait Refresh {
    /// Distance from the nearest signal; signals are 0.
    fn height(&self) -> usize;

    /// Recompute from the buffered inputs and publish if the output changed.
    fn refresh(&self);
}

#[derive(Default)]
struct Queue {
    depth: usize,
    dirty: Vec<Weak<dyn Refresh>>,
}

thread_local! {
    static QUEUE: RefCell<Queue> = RefCell::new(Queue::default());
}

/// Run `f` with memo recomputation deferred until the outermost batch ends.
///
/// Every `Signal::set` is already batched; wrap several writes to merge their
/// effect on shared memos into one recomputation.
///
/// ```rust
/// use trellis_core::reactive::{batch, Memo, Signal};
///
/// let a = Signal::new(1);
/// let b = Signal::new(2);
/// let sum = Memo::merge2(&a, &b, |a: &i32, b: &i32| a + b);
/// let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
/// let s = seen.clone();
/// let _sub = sum.subscribe(move |v: &i32| s.borrow_mut().push(*v));
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(*seen.borrow(), vec![3, 30]);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let result = {
        let _depth = Depth::enter();
        f()
    };
    if !is_batching() {
        flush();
    }
    result
}

/// Holds the batch open; closing never flushes.
struct Depth;

impl Depth {
    fn enter() -> Self {
        QUEUE.with(|queue| queue.borrow_mut().depth += 1);
        Depth
    }
}

impl Drop for Depth {
    fn drop(&mut self) {
        QUEUE.with(|queue| queue.borrow_mut().depth -= 1);
    }
}

/// Whether a batch is currently open.
pub fn is_batching() -> bool {
    QUEUE.with(|queue| queue.borrow().depth > 0)
}

/// Queue a memo for refresh. Outside a batch it refreshes immediately.
pub(crate) fn schedule(memo: Weak<dyn Refresh>) {
    let open = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.dirty.push(memo);
        queue.depth > 0
    });
    if !open {
        flush();
    }
}

fn flush() {
    while let Some(memo) = next_dirty() {
        let _depth = Depth::enter();
        memo.refresh();
    }
}

/// Remove and return the lowest queued memo still alive.
fn next_dirty() -> Option<Rc<dyn Refresh>> {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.dirty.retain(|weak| weak.strong_count() > 0);
        let index = (0..queue.dirty.len()).min_by_key(|&index| {
            queue.dirty[index]
                .upgrade()
                .map_or(usize::MAX, |memo| memo.height())
        })?;
        queue.dirty.remove(index).upgrade()
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    struct Recorder {
        height: usize,
        name: &'static str,
        log: Rc<StdRefCell<Vec<&'static str>>>,
    }

    impl Refresh for Recorder {
        fn height(&self) -> usize {
            self.height
        }

        fn refresh(&self) {
            self.log.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn flush_runs_lowest_height_first() {
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let high: Rc<dyn Refresh> = Rc::new(Recorder { height: 2, name: "high", log: log.clone() });
        let low: Rc<dyn Refresh> = Rc::new(Recorder { height: 1, name: "low", log: log.clone() });

        batch(|| {
            schedule(Rc::downgrade(&high));
            schedule(Rc::downgrade(&low));
            assert!(log.borrow().is_empty());
        });
        assert_eq!(*log.borrow(), ["low", "high"]);
    }

    #[test]
    fn schedule_outside_a_batch_refreshes_at_once() {
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let memo: Rc<dyn Refresh> = Rc::new(Recorder { height: 1, name: "memo", log: log.clone() });

        assert!(!is_batching());
        schedule(Rc::downgrade(&memo));
        assert_eq!(*log.borrow(), ["memo"]);
    }

    #[test]
    fn dropped_memos_are_skipped() {
        let log = Rc::new(StdRefCell::new(Vec::new()));
        batch(|| {
            let memo: Rc<dyn Refresh> = Rc::new(Recorder { height: 1, name: "gone", log: log.clone() });
            schedule(Rc::downgrade(&memo));
        });
        assert!(log.borrow().is_empty());
        assert!(next_dirty().is_none());
    }
}
