//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive cells (signals, memos, effects) with explicit subscriptions
//! - Blueprints and the views built from them
//! - DOM bindings for elements: attributes, classes, styles, events and
//!   two-way `value`
//! - Reconcilers that derive child views from cells (outlet, fragment, repeat)
//! - A component runtime with lifecycle hooks, preload and transition-out
//!
//! The DOM is an in-memory, single-threaded node tree. Everything in the crate
//! is `!Send`; a host drives it from one thread and calls
//! [`dom::Document::flush_frames`] once per animation frame.
//!
//! # Architecture
//!
//! - `reactive`: cells, the subscription registry and effects
//! - `dom`: nodes, events and the frame queue
//! - `view`: blueprints, the `View` trait, element and text views
//! - `reconcile`: outlet, fragment, repeat, cond and portal
//! - `component`: setup functions, component context and views
//! - `debug` / `app`: debug channels and the application context
//!
//! # Example
//!
//! ```rust
//! use trellis_core::prelude::*;
//!
//! let count = Signal::new(5);
//! let doubled = count.map(|n| n * 2);
//!
//! let blueprint = h("p", Attrs::new(), vec!["Doubled: ".into(), doubled.into()]);
//! let view = blueprint.build(&BuildContext::default()).unwrap();
//!
//! let root = Node::element("main");
//! view.connect(&root, None);
//! assert_eq!(root.text_content(), "Doubled: 10");
//!
//! count.set(6);
//! assert_eq!(root.text_content(), "Doubled: 12");
//! ```

pub mod app;
pub mod component;
pub mod debug;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod reconcile;
pub mod view;

pub use error::{Error, Result};
pub use serde_json::Value;

/// The types most applications need.
pub mod prelude {
    pub use crate::app::AppContext;
    pub use crate::component::{Component, ComponentContext, PreloadControls};
    pub use crate::debug::{DebugConfig, DebugHub};
    pub use crate::dom::{Document, Node};
    pub use crate::reactive::{batch, Effect, Memo, ReadSignal, Signal, Subscription};
    pub use crate::reconcile::{cond, fragment, outlet, portal, repeat, repeat_keyed};
    pub use crate::view::{
        h, Attr, Attrs, Blueprint, BuildContext, DisconnectOptions, Handler, Renderable, View,
    };
    pub use crate::{Error, Result, Value};
}
