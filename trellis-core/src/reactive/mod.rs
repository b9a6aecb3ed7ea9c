//! Reactive Primitives
//!
//! This module implements the reactive core: signals, memos and effects.
//! These primitives are the state layer every view binds to.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state. Observers subscribe to it
//! explicitly; subscribing replays the current value once, and every later
//! change that is not structurally equal to the previous value is pushed to
//! all observers synchronously.
//!
//! ## Memos
//!
//! A [`Memo`] is a read-only value derived from one or more sources. It only
//! holds subscriptions to its sources while it has observers of its own, and
//! it applies the equality gate to its output.
//!
//! ## Effects
//!
//! An [`Effect`] attaches a side-effecting callback to a source and can be
//! started and stopped. Views and components use effects to tie observation
//! to the connect/disconnect lifecycle.
//!
//! # Implementation Notes
//!
//! Propagation is push-based and single-threaded. Each source owns its own
//! [`Subscribers`] registry, and the only cancellation primitive is
//! [`Subscription::unsubscribe`]. The one piece of shared state is the
//! thread-local [`batch`] queue that orders memo recomputation.

mod batch;
mod effect;
mod memo;
mod signal;
mod source;
mod subscriber;

pub use batch::{batch, is_batching};
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use signal::Signal;
pub use source::{ReadSignal, Source};
pub use subscriber::{Observer, SubscriberId, Subscribers, Subscription};
