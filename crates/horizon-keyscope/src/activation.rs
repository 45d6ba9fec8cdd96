//! Active scope tracking and branch repair.
//!
//! UI scopes can register before their structural parent is known, because
//! elements mount bottom-up or asynchronously. Whenever focus lands inside
//! a scoped element the engine walks the host's element ancestry and
//! re-links each scope on the way up under the scope of its nearest scoped
//! ancestor element.

use horizon_keyscope_core::logging::targets;
use horizon_keyscope_core::{ElementId, ScopeId};

use crate::element::ancestors;
use crate::engine::{EngineState, HotkeyEngine};
use crate::scope::ScopeKind;

impl EngineState {
    /// Re-link `scope` and its UI ancestors to match the element tree.
    ///
    /// Convergent: running it twice leaves the tree unchanged. Stops at
    /// detached scopes, command scopes, and scopes with no scoped ancestor
    /// element.
    pub(crate) fn repair_branch(&mut self, scope: &ScopeId) {
        let mut current = scope.clone();
        let mut steps = 0usize;

        while !current.is_root() && steps <= self.tree.len() {
            steps += 1;

            let Some(node) = self.tree.get(&current) else {
                tracing::error!(target: targets::ACTIVATION, scope = %current, "branch repair reached a missing scope");
                return;
            };
            if node.kind() != ScopeKind::Ui || node.is_detached() {
                return;
            }
            let Some(element) = node.element() else {
                return;
            };
            let current_parent = node.parent().cloned();

            let Some(parent) = ancestors(self.host.as_ref(), element)
                .find_map(|candidate| self.element_scopes.get(&candidate).cloned())
            else {
                return;
            };
            if !self.tree.contains(&parent) {
                tracing::error!(target: targets::ACTIVATION, scope = %current, missing = %parent, "element marker references a removed scope");
                return;
            }

            if current_parent.as_ref() != Some(&parent) {
                if let Err(err) = self.tree.set_parent(&current, &parent) {
                    tracing::error!(target: targets::ACTIVATION, scope = %current, parent = %parent, error = %err, "branch repair failed");
                    return;
                }
                tracing::trace!(target: targets::ACTIVATION, scope = %current, parent = %parent, "repaired scope parent");
            }
            current = parent;
        }
    }

    /// Apply a focus change. Returns whether the active scope changed.
    pub(crate) fn focus_in(&mut self, element: Option<ElementId>) -> bool {
        let target = element.and_then(|element| self.scope_for_element(element));
        let previous = self.active_scope.clone();

        match target {
            Some(scope) => {
                self.repair_branch(&scope);
                self.set_active(scope);
            }
            None => {
                let root = self.tree.root().clone();
                self.set_active(root);
            }
        }
        previous != self.active_scope
    }
}

impl HotkeyEngine {
    /// Manually set the active scope, e.g. from a "click outside" handler.
    pub fn set_active_scope(&self, id: &ScopeId) {
        self.shared.state.lock().set_active(id.clone());
    }

    /// Notify the engine that `element` gained focus.
    ///
    /// The nearest scope attached to the element or one of its ancestors
    /// becomes active after branch repair. `None`, or an element outside
    /// every scope, activates the root.
    pub fn handle_focus_in(&self, element: Option<ElementId>) -> bool {
        self.shared.state.lock().focus_in(element)
    }

    /// Re-read the host's focused element and activate its scope.
    pub fn sync_focus(&self) -> bool {
        let mut state = self.shared.state.lock();
        let focused = state.host.focused_element();
        state.focus_in(focused)
    }

    /// Notify the engine that the window lost focus. Clears held keys.
    pub fn handle_window_blur(&self) {
        let mut state = self.shared.state.lock();
        tracing::trace!(target: targets::KEYBOARD, "window blurred, clearing pressed keys");
        state.pressed.clear();
    }

    /// Notify the engine that the window regained focus.
    pub fn handle_window_focus(&self) {
        let mut state = self.shared.state.lock();
        if state.config.clear_on_window_focus {
            state.pressed.clear();
        }
    }
}
