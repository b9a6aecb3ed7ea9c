//! Document Model
//!
//! The node tree views render into, plus the animation-frame queue the host
//! flushes once per frame.
//!
//! # Components
//!
//! - [`Node`]: elements, text and comment nodes with the operations the view
//!   engine performs (insert-after, remove, attributes, classes, style,
//!   `value`, event listeners)
//! - [`FrameScheduler`]: callbacks deferred to the next animation frame
//! - [`Document`]: node factory and frame queue, shared through the
//!   application context

mod node;
mod scheduler;

pub use node::{Event, Listener, ListenerId, Namespace, Node, NodeId, NodeKind, NodeSnapshot};
pub use scheduler::{FrameHandle, FrameScheduler};

/// The document views are rendered into.
///
/// Cloning clones the handle.
#[derive(Debug, Clone)]
pub struct Document {
    body: Node,
    frames: FrameScheduler,
}

impl Document {
    /// Create an empty document with a `body` element.
    pub fn new() -> Self {
        Self {
            body: Node::element("body"),
            frames: FrameScheduler::new(),
        }
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    pub fn create_element(&self, tag: &str, namespace: Namespace) -> Node {
        Node::element_ns(tag, namespace)
    }

    pub fn create_text(&self, content: impl Into<String>) -> Node {
        Node::text(content)
    }

    pub fn create_comment(&self, content: impl Into<String>) -> Node {
        Node::comment(content)
    }

    pub fn frames(&self) -> &FrameScheduler {
        &self.frames
    }

    /// Queue a callback for the next animation frame.
    pub fn request_frame(&self, callback: impl FnOnce() + 'static) -> FrameHandle {
        self.frames.request(callback)
    }

    /// Run every callback queued for this frame.
    pub fn flush_frames(&self) -> usize {
        self.frames.flush()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
