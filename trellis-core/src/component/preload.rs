//! Route preload controls.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use tokio::sync::oneshot;

use crate::view::Renderable;

/// Controls handed to a component's preload callback.
///
/// `show` asks the host to display something while loading (a spinner, a
/// skeleton). `done` signals that the component is ready to be shown;
/// calling it more than once has no further effect. Cloning clones the
/// handle.
#[derive(Clone)]
pub struct PreloadControls {
    show: Rc<dyn Fn(Renderable)>,
    done: Rc<RefCell<Option<oneshot::Sender<()>>>>,
    finished: Rc<RefCell<Option<oneshot::Receiver<()>>>>,
}

impl PreloadControls {
    /// Controls whose `show` calls go to `show`.
    pub fn new(show: impl Fn(Renderable) + 'static) -> Self {
        let (done, finished) = oneshot::channel();
        Self {
            show: Rc::new(show),
            done: Rc::new(RefCell::new(Some(done))),
            finished: Rc::new(RefCell::new(Some(finished))),
        }
    }

    /// Controls that ignore `show`.
    pub fn detached() -> Self {
        Self::new(|_| {})
    }

    pub fn show(&self, content: impl Into<Renderable>) {
        (self.show)(content.into())
    }

    pub fn done(&self) {
        let sender = self.done.borrow_mut().take();
        if let Some(sender) = sender {
            // The receiver may already be gone once preload has finished.
            let _ = sender.send(());
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.borrow().is_none()
    }

    /// The receiving half of `done`, claimed once by the view running the
    /// preload.
    pub(crate) fn take_finished(&self) -> Option<oneshot::Receiver<()>> {
        self.finished.borrow_mut().take()
    }
}

impl Debug for PreloadControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadControls")
            .field("done", &self.is_done())
            .finish()
    }
}
