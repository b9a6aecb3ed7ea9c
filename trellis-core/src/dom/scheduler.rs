//! Frame Scheduler
//!
//! The frame scheduler queues DOM writes that should be coalesced into the
//! next animation frame. The host drives it by calling
//! [`FrameScheduler::flush`] once per frame.
//!
//! # Algorithm
//!
//! 1. `request` pushes a callback onto the queue and returns a handle
//! 2. `cancel` marks a queued callback as dead; it is skipped on flush
//! 3. `flush` takes the queue as it stands and runs each live callback in
//!    request order
//! 4. Callbacks requested while a flush is running land in the next frame
//!
//! Step 4 keeps a callback that re-requests itself from spinning forever.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

/// Handle for a queued frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

type FrameCallback = Box<dyn FnOnce()>;

#[derive(Default)]
struct SchedulerInner {
    queue: RefCell<VecDeque<(FrameHandle, FrameCallback)>>,
    cancelled: RefCell<HashSet<FrameHandle>>,
    next_handle: Cell<u64>,
    frames: Cell<u64>,
}

/// A queue of callbacks waiting for the next animation frame.
///
/// Cloning clones the handle; clones share one queue.
#[derive(Clone, Default)]
pub struct FrameScheduler {
    inner: Rc<SchedulerInner>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a callback for the next frame.
    pub fn request(&self, callback: impl FnOnce() + 'static) -> FrameHandle {
        let handle = FrameHandle(self.inner.next_handle.get());
        self.inner.next_handle.set(handle.0 + 1);
        self.inner
            .queue
            .borrow_mut()
            .push_back((handle, Box::new(callback)));
        handle
    }

    /// Drop a queued callback. No-op if it already ran.
    pub fn cancel(&self, handle: FrameHandle) {
        let queued = self.inner.queue.borrow().iter().any(|(h, _)| *h == handle);
        if queued {
            self.inner.cancelled.borrow_mut().insert(handle);
        }
    }

    /// Number of live callbacks waiting for the next frame.
    pub fn pending(&self) -> usize {
        let cancelled = self.inner.cancelled.borrow();
        self.inner
            .queue
            .borrow()
            .iter()
            .filter(|(h, _)| !cancelled.contains(h))
            .count()
    }

    /// Number of frames flushed so far.
    pub fn frame_count(&self) -> u64 {
        self.inner.frames.get()
    }

    /// Run one frame. Returns the number of callbacks that ran.
    pub fn flush(&self) -> usize {
        let batch: VecDeque<_> = self.inner.queue.take();
        let cancelled = self.inner.cancelled.take();
        self.inner.frames.set(self.inner.frames.get() + 1);

        let mut ran = 0;
        for (handle, callback) in batch {
            if cancelled.contains(&handle) {
                continue;
            }
            callback();
            ran += 1;
        }

        tracing::trace!(ran, frame = self.inner.frames.get(), "flushed animation frame");
        ran
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.pending())
            .field("frames", &self.frame_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_runs_callbacks_in_request_order() {
        let scheduler = FrameScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            scheduler.request(move || log.borrow_mut().push(i));
        }
        assert_eq!(scheduler.pending(), 3);

        assert_eq!(scheduler.flush(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn cancelled_callbacks_are_skipped() {
        let scheduler = FrameScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();

        let handle = scheduler.request(move || r.set(true));
        scheduler.cancel(handle);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.flush(), 0);
        assert!(!ran.get());
    }

    #[test]
    fn requests_during_flush_wait_for_the_next_frame() {
        let scheduler = FrameScheduler::new();
        let count = Rc::new(Cell::new(0));

        let s = scheduler.clone();
        let c = count.clone();
        scheduler.request(move || {
            c.set(c.get() + 1);
            let c = c.clone();
            s.request(move || c.set(c.get() + 1));
        });

        scheduler.flush();
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.pending(), 1);

        scheduler.flush();
        assert_eq!(count.get(), 2);
        assert_eq!(scheduler.frame_count(), 2);
    }
}
