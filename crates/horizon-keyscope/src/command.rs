//! Commands and the command registry.
//!
//! A [`Command`] is an immutable record: once registered its hotkeys,
//! handlers and flags never change. Re-registering under the same command
//! token with a different hotkey set is logged as a conflict.
//!
//! # Example
//!
//! ```ignore
//! use horizon_keyscope::{CommandSpec, HotkeyEngine};
//!
//! let registration = engine.register_command(
//!     CommandSpec::new(panel_scope.clone(), "Delete selection")
//!         .with_token("delete")
//!         .with_hotkeys("backspace")
//!         .on_key_down(|_| {
//!             delete_selection();
//!             true
//!         }),
//! );
//!
//! // Later, when the panel unmounts:
//! registration.dispose();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use horizon_keyscope_core::{CommandId, KeyTokenParseError, ScopeId};
use slotmap::SlotMap;

use crate::key::{IntoKeyTokens, KeyToken};
use crate::keyboard::RawKeyEvent;

/// Predicate gating a command. Re-evaluated on every dispatch attempt.
pub type ConditionFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Key-down handler. Returns `true` when it consumed the event.
pub type KeyDownFn = Arc<dyn Fn(&CommandInvocation) -> bool + Send + Sync>;

/// Deferred handler run when the triggering key is released.
pub type KeyUpFn = Arc<dyn Fn(&CommandInvocation) + Send + Sync>;

/// Context passed to command handlers.
#[derive(Clone, Debug)]
pub struct CommandInvocation {
    /// The raw event that triggered the handler. `None` for programmatic runs.
    pub event: Option<RawKeyEvent>,
    /// The pressed-key token that matched.
    pub keys: Option<KeyToken>,
    /// The scope that owns the command.
    pub scope_id: ScopeId,
}

impl CommandInvocation {
    pub(crate) fn programmatic(scope_id: ScopeId) -> Self {
        Self {
            event: None,
            keys: None,
            scope_id,
        }
    }
}

/// A registered command.
pub struct Command {
    pub(crate) token: Option<String>,
    pub(crate) scope_id: ScopeId,
    pub(crate) hotkeys: Vec<KeyToken>,
    pub(crate) description: String,
    pub(crate) condition: Option<ConditionFn>,
    pub(crate) key_down: Option<KeyDownFn>,
    pub(crate) key_up: Option<KeyUpFn>,
    pub(crate) activate_scope: Option<ScopeId>,
    pub(crate) run_while_text_input_focused: bool,
    pub(crate) display_priority: i32,
    pub(crate) hidden: bool,
}

impl Command {
    /// The stable cross-scope token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The owning scope.
    pub fn scope_id(&self) -> &ScopeId {
        &self.scope_id
    }

    /// Bound hotkeys; empty for unkeyed commands.
    pub fn hotkeys(&self) -> &[KeyToken] {
        &self.hotkeys
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The command scope entered when this command fires.
    pub fn activate_scope(&self) -> Option<&ScopeId> {
        self.activate_scope.as_ref()
    }

    /// Whether the command may fire while a text input holds focus.
    pub fn runs_while_text_input_focused(&self) -> bool {
        self.run_while_text_input_focused
    }

    /// Ordering hint for listings; higher sorts first.
    pub fn display_priority(&self) -> i32 {
        self.display_priority
    }

    /// Whether listings skip this command by default.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the command has a deferred key-up handler.
    pub fn has_key_up_handler(&self) -> bool {
        self.key_up.is_some()
    }

    /// Evaluate the condition. Commands without one are always enabled.
    pub fn is_enabled(&self) -> bool {
        self.condition.as_ref().map_or(true, |condition| condition())
    }

    /// Run the key-down handler. Commands without one do not consume.
    pub(crate) fn run_key_down(&self, invocation: &CommandInvocation) -> bool {
        self.key_down
            .as_ref()
            .is_some_and(|handler| handler(invocation))
    }

    pub(crate) fn run_key_up(&self, invocation: &CommandInvocation) {
        if let Some(handler) = &self.key_up {
            handler(invocation);
        }
    }

    /// The hotkeys joined in their pretty form, for menus and tooltips.
    pub fn pretty_hotkeys(&self) -> Vec<String> {
        self.hotkeys.iter().map(KeyToken::pretty).collect()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("token", &self.token)
            .field("scope_id", &self.scope_id)
            .field("hotkeys", &self.hotkeys)
            .field("description", &self.description)
            .field("has_condition", &self.condition.is_some())
            .field("has_key_up", &self.key_up.is_some())
            .field("activate_scope", &self.activate_scope)
            .field("display_priority", &self.display_priority)
            .field("hidden", &self.hidden)
            .finish()
    }
}

/// Builder describing a command to register.
pub struct CommandSpec {
    pub(crate) scope_id: ScopeId,
    pub(crate) description: String,
    pub(crate) token: Option<String>,
    pub(crate) hotkeys: Result<Vec<KeyToken>, KeyTokenParseError>,
    pub(crate) condition: Option<ConditionFn>,
    pub(crate) key_down: Option<KeyDownFn>,
    pub(crate) key_up: Option<KeyUpFn>,
    pub(crate) activate_scope: Option<ScopeId>,
    pub(crate) run_while_text_input_focused: bool,
    pub(crate) display_priority: i32,
    pub(crate) hidden: bool,
}

impl CommandSpec {
    /// Start describing a command owned by `scope_id`.
    pub fn new(scope_id: impl Into<ScopeId>, description: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            description: description.into(),
            token: None,
            hotkeys: Ok(Vec::new()),
            condition: None,
            key_down: None,
            key_up: None,
            activate_scope: None,
            run_while_text_input_focused: false,
            display_priority: 0,
            hidden: false,
        }
    }

    /// Set the stable command token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Bind one or more hotkeys. Parse failures surface at registration.
    pub fn with_hotkeys(mut self, hotkeys: impl IntoKeyTokens) -> Self {
        self.hotkeys = hotkeys.into_key_tokens();
        self
    }

    /// Gate the command on a cheap, side-effect-free predicate.
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Set the key-down handler.
    pub fn on_key_down<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CommandInvocation) -> bool + Send + Sync + 'static,
    {
        self.key_down = Some(Arc::new(handler));
        self
    }

    /// Set the deferred key-up handler.
    pub fn on_key_up<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CommandInvocation) + Send + Sync + 'static,
    {
        self.key_up = Some(Arc::new(handler));
        self
    }

    /// Enter `scope` when the command fires. The command scope must already exist.
    pub fn activates(mut self, scope: impl Into<ScopeId>) -> Self {
        self.activate_scope = Some(scope.into());
        self
    }

    /// Allow the command to fire while a text input holds focus.
    pub fn run_in_text_input(mut self, allowed: bool) -> Self {
        self.run_while_text_input_focused = allowed;
        self
    }

    /// Set the display priority.
    pub fn with_display_priority(mut self, priority: i32) -> Self {
        self.display_priority = priority;
        self
    }

    /// Hide the command from default listings.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub(crate) fn into_command(self, hotkeys: Vec<KeyToken>) -> Command {
        Command {
            token: self.token,
            scope_id: self.scope_id,
            hotkeys,
            description: self.description,
            condition: self.condition,
            key_down: self.key_down,
            key_up: self.key_up,
            activate_scope: self.activate_scope,
            run_while_text_input_focused: self.run_while_text_input_focused,
            display_priority: self.display_priority,
            hidden: self.hidden,
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("scope_id", &self.scope_id)
            .field("description", &self.description)
            .field("token", &self.token)
            .field("hotkeys", &self.hotkeys)
            .field("activate_scope", &self.activate_scope)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Arena of registered commands plus the command-token index.
#[derive(Default)]
pub struct CommandRegistry {
    commands: SlotMap<CommandId, Arc<Command>>,
    token_index: HashMap<String, Vec<CommandId>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Store a command and index its token.
    pub fn insert(&mut self, command: Command) -> CommandId {
        let token = command.token.clone();
        let id = self.commands.insert(Arc::new(command));
        if let Some(token) = token {
            self.token_index.entry(token).or_default().push(id);
        }
        id
    }

    /// Look up a command.
    pub fn get(&self, id: CommandId) -> Option<&Arc<Command>> {
        self.commands.get(id)
    }

    /// Remove a command and its token index entry.
    pub fn remove(&mut self, id: CommandId) -> Option<Arc<Command>> {
        let command = self.commands.remove(id)?;
        if let Some(token) = &command.token {
            if let Some(ids) = self.token_index.get_mut(token) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.token_index.remove(token);
                }
            }
        }
        Some(command)
    }

    /// Every live command registered under `token`, in registration order.
    pub fn by_token(&self, token: &str) -> impl Iterator<Item = (CommandId, &Arc<Command>)> {
        self.token_index
            .get(token)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.commands.get(*id).map(|command| (*id, command)))
    }

    /// A prior registration under `token` whose hotkey set differs from `hotkeys`.
    pub fn divergent_registration(&self, token: &str, hotkeys: &[KeyToken]) -> Option<&Arc<Command>> {
        self.by_token(token)
            .map(|(_, command)| command)
            .find(|command| !same_key_set(&command.hotkeys, hotkeys))
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.len())
            .field("tokens", &self.token_index.len())
            .finish()
    }
}

fn same_key_set(a: &[KeyToken], b: &[KeyToken]) -> bool {
    a.len() == b.len() && a.iter().all(|token| b.contains(token))
}
