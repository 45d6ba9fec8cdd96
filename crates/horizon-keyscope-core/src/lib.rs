//! Core types for Horizon Keyscope.
//!
//! This crate holds the pieces of the hotkey engine that carry no dispatch
//! logic of their own:
//!
//! - **Identifiers**: [`ScopeId`], [`CommandId`], [`ElementId`] and the scope id generator
//! - **Errors**: the [`KeyscopeError`] taxonomy shared by every subsystem
//! - **Logging**: tracing targets, wrapper macros and tree rendering helpers
//! - **Signals**: the observer list used for keypress notifications
//!
//! # Signal Example
//!
//! ```
//! use horizon_keyscope_core::Signal;
//!
//! let signal = Signal::<u32>::new();
//! let id = signal.connect(|n| println!("got {n}"));
//! signal.emit(7);
//! signal.disconnect(id);
//! ```

mod error;
pub mod ids;
pub mod logging;
pub mod signal;

pub use error::{KeyTokenParseError, KeyscopeError, Result};
pub use ids::{CommandId, ElementId, ScopeId, ScopeIdGenerator, ROOT_SCOPE};
pub use logging::{PerfSpan, TreeFormatOptions, TreeStyle};
pub use signal::{ConnectionGuard, ConnectionId, Signal};

static_assertions::assert_impl_all!(ScopeId: Send, Sync, Clone);
static_assertions::assert_impl_all!(Signal<()>: Send, Sync);
