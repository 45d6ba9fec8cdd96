//! The hotkey engine context.
//!
//! [`HotkeyEngine`] owns the scope tree, the command registry, the pressed
//! key set and the active scope. It is a cheap, cloneable handle: every
//! clone refers to the same engine, and independent engines can coexist
//! (one per window, or one per test).
//!
//! # Locking
//!
//! State lives behind a single mutex. User code (command handlers,
//! conditions, keypress subscribers, host focus requests) always runs with
//! the lock released, so any of it may call back into the engine: a
//! handler can remove its own scope, register commands, or change the
//! active scope.
//!
//! # Example
//!
//! ```ignore
//! use horizon_keyscope::{CommandSpec, EngineConfig, HotkeyEngine, ScopeRegistration};
//!
//! let engine = HotkeyEngine::new(EngineConfig::default());
//! let panel = engine.create_scope_id("panel");
//! engine.register_scope(ScopeRegistration::ui(panel.clone()));
//! engine.set_active_scope(&panel);
//!
//! engine.register_command(
//!     CommandSpec::new(panel, "Close panel")
//!         .with_hotkeys("escape")
//!         .on_key_down(|_| true),
//! );
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use horizon_keyscope_core::logging::{span_names, targets};
use horizon_keyscope_core::{
    keyscope_debug, keyscope_trace, CommandId, ConnectionGuard, ConnectionId, ElementId, KeyscopeError, PerfSpan, Result,
    ScopeId, ScopeIdGenerator, Signal, TreeFormatOptions,
};
use parking_lot::Mutex;

use crate::command::{Command, CommandRegistry};
use crate::config::EngineConfig;
use crate::element::{ancestors, ElementHost, NullHost};
use crate::key::{IntoKeyTokens, KeyToken};
use crate::keyboard::{KeyNormalizer, PressedKeys, RawKeyEvent};
use crate::scope::{ScopeKind, ScopeNode, ScopeRegistration, ScopeTree};

/// Structured result delivered to keypress subscribers.
#[derive(Clone, Debug)]
pub struct KeypressResult {
    /// Held modifiers plus the base key, in canonical order.
    pub pressed_keys: String,
    /// The raw event that was processed.
    pub event: RawKeyEvent,
    /// The active scope after processing.
    pub active_scope: ScopeId,
    /// Whether a text input held focus.
    pub text_input_focused: bool,
    /// Whether a command scope was entered.
    pub command_scope_activated: bool,
    /// Whether a command handled the event.
    pub captured: bool,
    /// Whether the held keys include a non-modifier key.
    pub non_modifier: bool,
}

/// A key-up handler waiting for its key to be released.
#[derive(Clone)]
pub(crate) struct PendingKeyUp {
    pub(crate) token: KeyToken,
    pub(crate) scope_id: ScopeId,
    pub(crate) command_id: CommandId,
    pub(crate) command: Arc<Command>,
}

/// Mutable engine state guarded by [`EngineShared::state`].
pub(crate) struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) normalizer: KeyNormalizer,
    pub(crate) tree: ScopeTree,
    pub(crate) registry: CommandRegistry,
    pub(crate) active_scope: ScopeId,
    /// Active scope first, root last.
    pub(crate) active_branch: Vec<ScopeId>,
    pub(crate) pressed: PressedKeys,
    pub(crate) pending_key_ups: Vec<PendingKeyUp>,
    pub(crate) element_scopes: HashMap<ElementId, ScopeId>,
    pub(crate) host: Arc<dyn ElementHost>,
}

impl EngineState {
    fn new(config: EngineConfig, host: Arc<dyn ElementHost>) -> Self {
        let tree = ScopeTree::new();
        let root = tree.root().clone();
        Self {
            normalizer: KeyNormalizer::new(config.platform),
            config,
            tree,
            registry: CommandRegistry::new(),
            active_branch: vec![root.clone()],
            active_scope: root,
            pressed: PressedKeys::new(),
            pending_key_ups: Vec::new(),
            element_scopes: HashMap::new(),
            host,
        }
    }

    /// Set the active scope and recompute the active branch.
    pub(crate) fn set_active(&mut self, id: ScopeId) {
        if !self.tree.contains(&id) {
            tracing::error!(target: targets::ACTIVATION, scope = %id, "cannot activate unknown scope");
            return;
        }
        if self.active_scope != id {
            tracing::debug!(target: targets::ACTIVATION, from = %self.active_scope, to = %id, "active scope changed");
        }
        self.active_branch = self.tree.branch(&id);
        self.active_scope = id;
    }

    /// Recompute the active branch after the tree changed shape.
    pub(crate) fn refresh_branch(&mut self) {
        self.active_branch = self.tree.branch(&self.active_scope);
    }

    pub(crate) fn in_active_branch(&self, id: &ScopeId) -> bool {
        self.active_branch.contains(id)
    }

    /// Position of `id` in the active branch; `0` is the active scope.
    pub(crate) fn branch_distance(&self, id: &ScopeId) -> Option<usize> {
        self.active_branch.iter().position(|scope| scope == id)
    }

    pub(crate) fn text_input_focused(&self) -> bool {
        self.host
            .focused_element()
            .is_some_and(|element| self.host.is_text_input(element))
    }

    /// The scope attached to `element` or its nearest scoped ancestor.
    pub(crate) fn scope_for_element(&self, element: ElementId) -> Option<ScopeId> {
        std::iter::once(element)
            .chain(ancestors(self.host.as_ref(), element))
            .find_map(|candidate| self.element_scopes.get(&candidate).cloned())
    }

    fn node(&self, id: &ScopeId) -> Result<&ScopeNode> {
        self.tree
            .get(id)
            .ok_or_else(|| KeyscopeError::UnknownScope(id.clone()))
    }

    /// Remove a scope together with its descendants and declared command scopes.
    ///
    /// Command scopes declared elsewhere that were last entered from a
    /// removed scope go back under the scope that declared them.
    ///
    /// Returns the element that should receive focus when the active scope
    /// had to move.
    pub(crate) fn remove_scope(&mut self, id: &ScopeId) -> Result<Option<ElementId>> {
        if id.is_root() {
            return Err(KeyscopeError::RootScopeImmutable);
        }
        self.node(id)?;

        let doomed = self.tree.collect_removal_set(id);
        let doomed_set: HashSet<ScopeId> = doomed.iter().cloned().collect();

        let mut focus = None;
        if self.active_branch.iter().any(|scope| doomed_set.contains(scope)) {
            let survivor = self
                .active_branch
                .iter()
                .find(|scope| {
                    !doomed_set.contains(*scope)
                        && self
                            .tree
                            .get(scope)
                            .is_some_and(|node| node.kind() == ScopeKind::Ui)
                })
                .cloned()
                .unwrap_or_else(|| self.tree.root().clone());
            focus = self.tree.get(&survivor).and_then(ScopeNode::element);
            tracing::debug!(target: targets::ACTIVATION, removed = %id, fallback = %survivor, "active scope removed");
            self.set_active(survivor);
        }

        for (scope, home) in self.tree.displaced_command_scopes(&doomed_set) {
            match self.tree.set_parent(&scope, &home) {
                Ok(()) => {
                    tracing::trace!(target: targets::SCOPE, scope = %scope, parent = %home, "returned command scope to its declaring scope")
                }
                Err(err) => {
                    tracing::error!(target: targets::SCOPE, scope = %scope, parent = %home, error = %err, "cannot return command scope to its declaring scope")
                }
            }
        }

        for scope in &doomed {
            let Some(node) = self.tree.remove_node(scope) else {
                continue;
            };
            for command in node.command_ids() {
                self.registry.remove(command);
            }
            if let Some(element) = node.element() {
                if self.element_scopes.get(&element) == Some(scope) {
                    self.element_scopes.remove(&element);
                }
            }
            self.pending_key_ups.retain(|pending| pending.scope_id != *scope);
            tracing::trace!(target: targets::SCOPE, scope = %scope, "removed scope");
        }

        self.refresh_branch();
        Ok(focus)
    }
}

/// State shared by every clone of a [`HotkeyEngine`].
pub(crate) struct EngineShared {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) keypress: Arc<Signal<KeypressResult>>,
    pub(crate) ids: ScopeIdGenerator,
}

impl EngineShared {
    /// Ask the host to focus `element`. Must be called without the lock held.
    pub(crate) fn request_focus(&self, element: Option<ElementId>) {
        let Some(element) = element else {
            return;
        };
        let host = self.state.lock().host.clone();
        tracing::trace!(target: targets::ACTIVATION, %element, "requesting focus");
        host.focus_element(element);
    }
}

/// Handle to a hotkey scope engine.
#[derive(Clone)]
pub struct HotkeyEngine {
    pub(crate) shared: Arc<EngineShared>,
}

impl Default for HotkeyEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for HotkeyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("HotkeyEngine")
            .field("active_scope", &state.active_scope)
            .field("scopes", &state.tree.len())
            .field("commands", &state.registry.len())
            .finish()
    }
}

impl HotkeyEngine {
    /// Create an engine with no element host.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_host(config, Arc::new(NullHost))
    }

    /// Create an engine bound to the application's element tree.
    pub fn with_host(config: EngineConfig, host: Arc<dyn ElementHost>) -> Self {
        keyscope_debug!(platform = ?config.platform, "creating hotkey engine");
        Self {
            shared: Arc::new(EngineShared {
                state: Mutex::new(EngineState::new(config, host)),
                keypress: Arc::new(Signal::new()),
                ids: ScopeIdGenerator::new(),
            }),
        }
    }

    /// Replace the element host.
    pub fn set_host(&self, host: Arc<dyn ElementHost>) {
        self.shared.state.lock().host = host;
        keyscope_trace!("element host replaced");
    }

    /// The engine configuration.
    pub fn config(&self) -> EngineConfig {
        self.shared.state.lock().config.clone()
    }

    // =========================================================================
    // Scope lifecycle
    // =========================================================================

    /// Generate an engine-unique scope id of the form `prefix-N`.
    pub fn create_scope_id(&self, prefix: &str) -> ScopeId {
        self.shared.ids.next(prefix)
    }

    /// Register a scope, reporting failures to the caller.
    pub fn try_register_scope(&self, registration: ScopeRegistration) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.tree.insert(registration)?;
        state.refresh_branch();
        Ok(())
    }

    /// Register a scope. Failures are logged; returns whether the scope was added.
    pub fn register_scope(&self, registration: ScopeRegistration) -> bool {
        let id = registration.id.clone();
        match self.try_register_scope(registration) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(target: targets::SCOPE, scope = %id, error = %err, "failed to register scope");
                false
            }
        }
    }

    /// Create a command scope under `parent`, opened by `keys`.
    ///
    /// The returned id is passed to [`CommandSpec::activates`](crate::CommandSpec::activates)
    /// on the command that opens it.
    pub fn register_command_scope(
        &self,
        parent: &ScopeId,
        keys: impl IntoKeyTokens,
    ) -> Result<ScopeId> {
        let keys = keys.into_key_tokens()?;
        let id = self.create_scope_id("command-scope");
        self.try_register_scope(ScopeRegistration::command(id.clone(), parent.clone(), keys))?;
        Ok(id)
    }

    /// Remove a scope and everything beneath it, reporting failures.
    pub fn try_remove_scope(&self, id: &ScopeId) -> Result<()> {
        let _perf = PerfSpan::new(span_names::REMOVE_SCOPE);
        let focus = self.shared.state.lock().remove_scope(id)?;
        self.shared.request_focus(focus);
        Ok(())
    }

    /// Remove a scope and everything beneath it. Failures are logged.
    pub fn remove_scope(&self, id: &ScopeId) -> bool {
        match self.try_remove_scope(id) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(target: targets::SCOPE, scope = %id, error = %err, "failed to remove scope");
                false
            }
        }
    }

    /// Bind a UI scope to a live element.
    pub fn try_attach_scope_to_element(&self, id: &ScopeId, element: ElementId) -> Result<()> {
        let mut state = self.shared.state.lock();
        if let Some(existing) = state.element_scopes.get(&element) {
            return Err(KeyscopeError::ElementAlreadyScoped {
                element,
                existing: existing.clone(),
            });
        }
        let node = state.node(id)?;
        if node.kind() != ScopeKind::Ui || id.is_root() {
            return Err(KeyscopeError::ScopeNotUi(id.clone()));
        }
        let previous = node.element();

        if let Some(previous) = previous {
            state.element_scopes.remove(&previous);
        }
        if let Some(node) = state.tree.get_mut(id) {
            node.element = Some(element);
        }
        state.element_scopes.insert(element, id.clone());
        tracing::trace!(target: targets::SCOPE, scope = %id, %element, "attached scope to element");
        Ok(())
    }

    /// Bind a UI scope to a live element. Failures are logged.
    pub fn attach_scope_to_element(&self, id: &ScopeId, element: ElementId) -> bool {
        match self.try_attach_scope_to_element(id, element) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(target: targets::SCOPE, scope = %id, %element, error = %err, "failed to attach scope");
                false
            }
        }
    }

    /// Clear the scope marker of an unmounted element. Returns the scope it carried.
    pub fn detach_element(&self, element: ElementId) -> Option<ScopeId> {
        let mut state = self.shared.state.lock();
        let scope = state.element_scopes.remove(&element)?;
        if let Some(node) = state.tree.get_mut(&scope) {
            node.element = None;
        }
        Some(scope)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The active scope.
    pub fn active_scope(&self) -> ScopeId {
        self.shared.state.lock().active_scope.clone()
    }

    /// The active scope and its ancestors, active scope first.
    pub fn active_branch(&self) -> Vec<ScopeId> {
        self.shared.state.lock().active_branch.clone()
    }

    /// Whether a scope is reachable from the active scope.
    pub fn is_scope_in_active_branch(&self, id: &ScopeId) -> bool {
        self.shared.state.lock().in_active_branch(id)
    }

    /// Whether a scope is registered.
    pub fn scope_exists(&self, id: &ScopeId) -> bool {
        self.shared.state.lock().tree.contains(id)
    }

    /// The live parent of a scope.
    pub fn scope_parent(&self, id: &ScopeId) -> Option<ScopeId> {
        self.shared.state.lock().tree.get(id)?.parent().cloned()
    }

    /// The immediate children of a scope.
    pub fn scope_children(&self, id: &ScopeId) -> Vec<ScopeId> {
        self.shared
            .state
            .lock()
            .tree
            .get(id)
            .map(|node| node.children().to_vec())
            .unwrap_or_default()
    }

    /// The kind of a scope.
    pub fn scope_kind(&self, id: &ScopeId) -> Option<ScopeKind> {
        self.shared.state.lock().tree.get(id).map(ScopeNode::kind)
    }

    /// The scope attached to an element.
    pub fn scope_for_element(&self, element: ElementId) -> Option<ScopeId> {
        self.shared.state.lock().element_scopes.get(&element).cloned()
    }

    /// The held keys as a canonical token string.
    pub fn pressed_keys(&self) -> String {
        let state = self.shared.state.lock();
        match state.pressed.keys().last() {
            Some(key) => state.pressed.token_with(Some(key)).to_string(),
            None => state.pressed.token_with(None).to_string(),
        }
    }

    /// Whether a token segment (modifier name or base key) is held.
    pub fn is_key_held(&self, segment: &str) -> bool {
        self.shared.state.lock().pressed.is_held(segment)
    }

    /// Number of key-up handlers waiting for their key to be released.
    pub fn pending_key_up_count(&self) -> usize {
        self.shared.state.lock().pending_key_ups.len()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Call `callback` with the result of every processed key event.
    pub fn subscribe_to_keypress<F>(&self, callback: F) -> ConnectionId
    where
        F: Fn(&KeypressResult) + Send + Sync + 'static,
    {
        self.shared.keypress.connect(callback)
    }

    /// Like [`subscribe_to_keypress`](Self::subscribe_to_keypress), but the
    /// subscription ends when the returned guard is dropped.
    pub fn subscribe_to_keypress_scoped<F>(&self, callback: F) -> ConnectionGuard<KeypressResult>
    where
        F: Fn(&KeypressResult) + Send + Sync + 'static,
    {
        self.shared.keypress.connect_scoped(callback)
    }

    /// End a keypress subscription.
    pub fn unsubscribe_from_keypress(&self, id: ConnectionId) -> bool {
        self.shared.keypress.disconnect(id)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Render the scope tree, marking the active scope with `*`.
    pub fn debug_tree(&self, options: &TreeFormatOptions) -> String {
        let state = self.shared.state.lock();
        let mut output = format!(
            "Scope Tree ({} scopes, {} commands):\n",
            state.tree.len(),
            state.registry.len()
        );
        output.push_str(&state.tree.format_subtree_marked(
            state.tree.root(),
            options,
            Some(&state.active_scope),
        ));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> HotkeyEngine {
        HotkeyEngine::new(EngineConfig::default())
    }

    // =========================================================================
    // Scope Lifecycle Tests
    // =========================================================================

    #[test]
    fn test_new_engine_starts_at_root() {
        let engine = engine();
        assert_eq!(engine.active_scope(), ScopeId::root());
        assert_eq!(engine.active_branch(), vec![ScopeId::root()]);
    }

    #[test]
    fn test_create_scope_id_is_unique() {
        let engine = engine();
        let a = engine.create_scope_id("panel");
        let b = engine.create_scope_id("panel");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("panel-"));
    }

    #[test]
    fn test_scope_ids_are_counted_per_engine() {
        let first = engine();
        let second = engine();
        assert_eq!(first.create_scope_id("panel").as_str(), "panel-0");
        assert_eq!(second.create_scope_id("panel").as_str(), "panel-0");
        assert_eq!(first.create_scope_id("panel").as_str(), "panel-1");
    }

    #[test]
    fn test_register_and_remove_scope() {
        let engine = engine();
        let panel = engine.create_scope_id("panel");
        assert!(engine.register_scope(ScopeRegistration::ui(panel.clone())));
        assert!(!engine.register_scope(ScopeRegistration::ui(panel.clone())));
        assert_eq!(engine.scope_parent(&panel), Some(ScopeId::root()));
        assert_eq!(engine.scope_children(&ScopeId::root()), vec![panel.clone()]);

        assert!(engine.remove_scope(&panel));
        assert!(!engine.scope_exists(&panel));
        assert!(!engine.remove_scope(&panel));
        assert_eq!(
            engine.try_remove_scope(&ScopeId::root()),
            Err(KeyscopeError::RootScopeImmutable)
        );
    }

    #[test]
    fn test_removing_active_scope_falls_back_to_ui_ancestor() {
        let engine = engine();
        engine.register_scope(ScopeRegistration::ui("panel"));
        engine.register_scope(ScopeRegistration::ui("item").with_parent("panel"));
        engine.set_active_scope(&ScopeId::new("item"));

        engine.remove_scope(&ScopeId::new("item"));
        assert_eq!(engine.active_scope(), ScopeId::new("panel"));

        engine.remove_scope(&ScopeId::new("panel"));
        assert_eq!(engine.active_scope(), ScopeId::root());
    }

    #[test]
    fn test_register_command_scope() {
        let engine = engine();
        engine.register_scope(ScopeRegistration::ui("panel"));
        let scope = engine
            .register_command_scope(&ScopeId::new("panel"), "space")
            .unwrap();
        assert_eq!(engine.scope_kind(&scope), Some(ScopeKind::Command));
        assert_eq!(engine.scope_parent(&scope), Some(ScopeId::new("panel")));

        assert!(engine
            .register_command_scope(&ScopeId::new("missing"), "space")
            .is_err());
        assert!(engine
            .register_command_scope(&ScopeId::new("panel"), "cmd+a+b")
            .is_err());
    }

    // =========================================================================
    // Element Tests
    // =========================================================================

    #[test]
    fn test_attach_rejects_scoped_element() {
        let engine = engine();
        engine.register_scope(ScopeRegistration::ui("a"));
        engine.register_scope(ScopeRegistration::ui("b"));

        assert!(engine.attach_scope_to_element(&ScopeId::new("a"), ElementId(1)));
        assert_eq!(
            engine.try_attach_scope_to_element(&ScopeId::new("b"), ElementId(1)),
            Err(KeyscopeError::ElementAlreadyScoped {
                element: ElementId(1),
                existing: ScopeId::new("a"),
            })
        );
        assert_eq!(
            engine.try_attach_scope_to_element(&ScopeId::root(), ElementId(2)),
            Err(KeyscopeError::ScopeNotUi(ScopeId::root()))
        );

        assert_eq!(engine.detach_element(ElementId(1)), Some(ScopeId::new("a")));
        assert!(engine.attach_scope_to_element(&ScopeId::new("b"), ElementId(1)));
    }

    #[test]
    fn test_remove_scope_clears_element_marker() {
        let engine = engine();
        engine.register_scope(ScopeRegistration::ui("a"));
        engine.attach_scope_to_element(&ScopeId::new("a"), ElementId(9));
        engine.remove_scope(&ScopeId::new("a"));
        assert_eq!(engine.scope_for_element(ElementId(9)), None);
    }

    // =========================================================================
    // Diagnostics Tests
    // =========================================================================

    #[test]
    fn test_debug_tree_marks_active_scope() {
        let engine = engine();
        engine.register_scope(ScopeRegistration::ui("panel"));
        engine.set_active_scope(&ScopeId::new("panel"));
        let output = engine.debug_tree(&TreeFormatOptions::default());
        assert!(output.starts_with("Scope Tree (2 scopes, 0 commands):"));
        assert!(output.contains("panel (ui) *"));
    }
}
