//! Application context.
//!
//! The [`AppContext`] is the one piece of configuration every view can
//! reach: the document it renders into and the debug hub its channels come
//! from. It is passed down explicitly through [`crate::view::BuildContext`];
//! nothing here is global, so tests build isolated apps side by side.

use crate::debug::{DebugChannel, DebugConfig, DebugHub, FRAMEWORK_CHANNEL};
use crate::dom::Document;

/// Shared services for one application. Cloning clones the handles.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    document: Document,
    debug: DebugHub,
}

impl AppContext {
    pub fn new(document: Document, config: DebugConfig) -> Self {
        Self {
            document,
            debug: DebugHub::new(config),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn debug(&self) -> &DebugHub {
        &self.debug
    }

    /// A debug channel with the given name.
    pub fn channel(&self, name: impl Into<String>) -> DebugChannel {
        self.debug.channel(name)
    }

    /// The channel the framework reports render errors on.
    pub fn framework_channel(&self) -> DebugChannel {
        self.debug.channel(FRAMEWORK_CHANNEL)
    }
}
