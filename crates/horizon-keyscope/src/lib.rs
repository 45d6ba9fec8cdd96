//! Horizon Keyscope - hierarchical hotkey scopes and command dispatch.
//!
//! The engine decides, for every keyboard event, which registered command
//! should fire. Commands live in *scopes* arranged in a tree that mirrors
//! the UI's focus hierarchy:
//!
//! - **UI scopes** are attached to live elements and become active when
//!   focus enters them.
//! - **Command scopes** are transient. A hotkey enters them (a leader key,
//!   say) and the next plain keystroke leaves them.
//!
//! A key press walks from the active scope towards the root `"global"`
//! scope; the closest matching command wins and shadows anything bound to
//! the same keys further up.
//!
//! # Example
//!
//! ```ignore
//! use horizon_keyscope::{
//!     CommandSpec, EngineConfig, HotkeyEngine, RawKeyEvent, ScopeRegistration,
//! };
//!
//! let engine = HotkeyEngine::new(EngineConfig::default());
//!
//! let panel = engine.create_scope_id("panel");
//! let item = engine.create_scope_id("item");
//! engine.register_scope(ScopeRegistration::ui(panel.clone()));
//! engine.register_scope(ScopeRegistration::ui(item.clone()).with_parent(panel.clone()));
//!
//! engine.register_command(
//!     CommandSpec::new(panel, "Delete panel").with_hotkeys("backspace").on_key_down(|_| true),
//! );
//! engine.register_command(
//!     CommandSpec::new(item.clone(), "Delete item").with_hotkeys("backspace").on_key_down(|_| true),
//! );
//!
//! engine.set_active_scope(&item);
//! // Fires "Delete item" only.
//! engine.handle_key_event(RawKeyEvent::down("Backspace", "Backspace"));
//! ```
//!
//! # Modules
//!
//! - [`key`]: key tokens and modifier sets
//! - [`keyboard`]: raw event normalization and pressed-key tracking
//! - [`scope`]: the scope tree
//! - [`command`]: commands and the command registry
//! - [`element`]: the host element tree abstraction

mod activation;
pub mod command;
mod config;
mod dispatch;
pub mod element;
mod engine;
pub mod key;
pub mod keyboard;
mod lifecycle;
mod listing;
pub mod scope;

pub use command::{Command, CommandInvocation, CommandRegistry, CommandSpec};
pub use config::{EngineConfig, Platform};
pub use element::{ElementHost, NullHost};
pub use engine::{HotkeyEngine, KeypressResult};
pub use key::{IntoKeyTokens, KeyModifiers, KeyToken, Modifier};
pub use keyboard::{KeyEventKind, KeyNormalizer, NormalizedKey, PressedKeys, RawKeyEvent};
pub use lifecycle::CommandRegistration;
pub use listing::{ListOptions, ListOrder, ListedCommand};
pub use scope::{ScopeKind, ScopeNode, ScopeRegistration, ScopeTree};

pub use horizon_keyscope_core::{
    CommandId, ConnectionGuard, ConnectionId, ElementId, KeyTokenParseError, KeyscopeError,
    Result, ScopeId, TreeFormatOptions, TreeStyle, ROOT_SCOPE,
};

static_assertions::assert_impl_all!(HotkeyEngine: Send, Sync, Clone);
static_assertions::assert_impl_all!(CommandRegistration: Send, Sync);
static_assertions::assert_impl_all!(KeypressResult: Send, Sync, Clone);
