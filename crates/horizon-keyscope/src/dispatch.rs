//! Keyboard event dispatch.
//!
//! A key-down walks the active branch from the active scope to the root.
//! The first eligible command bound to the pressed keys wins; nothing
//! higher in the tree sees the event once a command consumes it or opens a
//! command scope. Walking through a command scope with no modifiers held
//! pops back to the nearest UI scope, so stray keystrokes never leave the
//! engine stuck inside a transient scope.
//!
//! Key-up events only release keys and flush deferred key-up handlers.

use std::sync::Arc;

use horizon_keyscope_core::logging::{span_names, targets};
use horizon_keyscope_core::{CommandId, PerfSpan, ScopeId};

use crate::command::{Command, CommandInvocation};
use crate::engine::{EngineState, HotkeyEngine, KeypressResult, PendingKeyUp};
use crate::key::KeyToken;
use crate::keyboard::{KeyEventKind, NormalizedKey, RawKeyEvent};
use crate::scope::ScopeKind;

/// A command found during the walk, resolved under the lock.
struct Candidate {
    scope_id: ScopeId,
    command_id: CommandId,
    command: Arc<Command>,
}

impl EngineState {
    /// Look at one scope of the walk. Pops out of command scopes on plain
    /// keystrokes and returns the command bound to `token`, if any.
    fn visit_scope(&mut self, scope_id: &ScopeId, token: &KeyToken) -> Option<Candidate> {
        let node = self.tree.get(scope_id)?;
        let kind = node.kind();
        let command_id = node.hotkey_commands.get(token).copied();

        if kind == ScopeKind::Command
            && token.modifiers().is_empty()
            && self.in_active_branch(scope_id)
        {
            let fallback = self
                .tree
                .nearest_ui_ancestor(scope_id, &Default::default());
            tracing::debug!(target: targets::DISPATCH, scope = %scope_id, fallback = %fallback, "leaving command scope");
            self.set_active(fallback);
        }

        let command_id = command_id?;
        let command = self.registry.get(command_id)?.clone();
        Some(Candidate {
            scope_id: scope_id.clone(),
            command_id,
            command,
        })
    }

    /// Enter a command scope, rebinding its live parent to the current
    /// active scope so that leaving it returns there.
    pub(crate) fn enter_command_scope(&mut self, target: &ScopeId) -> bool {
        let Some(node) = self.tree.get(target) else {
            tracing::warn!(target: targets::DISPATCH, scope = %target, "activation target no longer exists");
            return false;
        };
        if node.kind() != ScopeKind::Command {
            tracing::warn!(target: targets::DISPATCH, scope = %target, "activation target is not a command scope");
            return false;
        }

        let return_scope = self.active_scope.clone();
        if return_scope != *target {
            if let Err(err) = self.tree.set_parent(target, &return_scope) {
                tracing::error!(target: targets::DISPATCH, scope = %target, parent = %return_scope, error = %err, "cannot rebind command scope");
                return false;
            }
        }
        self.set_active(target.clone());
        self.pressed.clear();
        true
    }

    fn defer_key_up(&mut self, candidate: &Candidate, token: &KeyToken) {
        let exists = self
            .pending_key_ups
            .iter()
            .any(|pending| pending.token == *token && pending.scope_id == candidate.scope_id);
        if exists {
            return;
        }
        self.pending_key_ups.push(PendingKeyUp {
            token: token.clone(),
            scope_id: candidate.scope_id.clone(),
            command_id: candidate.command_id,
            command: candidate.command.clone(),
        });
    }

    /// Remove and return every pending key-up whose last segment is released.
    fn take_released_key_ups(&mut self) -> Vec<PendingKeyUp> {
        let (released, held): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_key_ups)
            .into_iter()
            .partition(|pending| {
                pending
                    .token
                    .last_segment()
                    .map_or(true, |segment| !self.pressed.is_held(segment))
            });
        self.pending_key_ups = held;
        released
    }
}

impl HotkeyEngine {
    /// Process a raw keyboard event.
    ///
    /// Returns `None` when the key is ignored (unidentified keys, dead keys
    /// without Option). Otherwise subscribers are notified and the same
    /// result is returned. Never panics on malformed trees.
    pub fn handle_key_event(&self, event: RawKeyEvent) -> Option<KeypressResult> {
        let _perf = PerfSpan::new(span_names::DISPATCH);

        let normalized = {
            let state = self.shared.state.lock();
            state.normalizer.normalize(&event)
        };
        let Some(normalized) = normalized else {
            tracing::trace!(target: targets::KEYBOARD, key = %event.key, code = %event.code, "ignored key event");
            return None;
        };

        let result = match event.kind {
            KeyEventKind::Down => self.key_down(event, normalized),
            KeyEventKind::Up => self.key_up(event, normalized),
        };

        self.shared.keypress.emit(result.clone());
        Some(result)
    }

    fn key_down(&self, event: RawKeyEvent, normalized: NormalizedKey) -> KeypressResult {
        let (token, chain, text_input) = {
            let mut state = self.shared.state.lock();
            state.pressed.sync_modifiers(event.modifiers);
            let base = match &normalized {
                NormalizedKey::Modifier(modifier) => {
                    state.pressed.press_modifier(*modifier);
                    None
                }
                NormalizedKey::Key(key) => {
                    state.pressed.press_key(key);
                    Some(key.as_str())
                }
            };
            let token = state.pressed.token_with(base);
            (token, state.active_branch.clone(), state.text_input_focused())
        };
        let non_modifier = token.has_base_key();

        tracing::trace!(target: targets::DISPATCH, keys = %token, active = ?chain.first(), "dispatching key down");

        let mut captured = false;
        let mut activated = false;

        for scope_id in &chain {
            let candidate = self.shared.state.lock().visit_scope(scope_id, &token);
            let Some(candidate) = candidate else {
                continue;
            };
            let command = &candidate.command;

            if !command.is_enabled() {
                continue;
            }
            if text_input && !command.runs_while_text_input_focused() {
                continue;
            }

            tracing::debug!(
                target: targets::DISPATCH,
                keys = %token,
                scope = %candidate.scope_id,
                command = command.description(),
                "command matched"
            );

            let invocation = CommandInvocation {
                event: Some(event.clone()),
                keys: Some(token.clone()),
                scope_id: candidate.scope_id.clone(),
            };
            let consumed = command.run_key_down(&invocation);

            let mut state = self.shared.state.lock();
            if consumed {
                captured = true;
                state.pressed.clear();
            }
            if let Some(target) = command.activate_scope() {
                if state.enter_command_scope(target) {
                    activated = true;
                    captured = true;
                }
            }
            if command.has_key_up_handler() {
                state.defer_key_up(&candidate, &token);
            }
            if consumed || activated {
                break;
            }
        }

        let state = self.shared.state.lock();
        KeypressResult {
            pressed_keys: token.to_string(),
            event,
            active_scope: state.active_scope.clone(),
            text_input_focused: text_input,
            command_scope_activated: activated,
            captured,
            non_modifier,
        }
    }

    fn key_up(&self, event: RawKeyEvent, normalized: NormalizedKey) -> KeypressResult {
        let (token, released, active_scope, text_input) = {
            let mut state = self.shared.state.lock();
            let token = match &normalized {
                NormalizedKey::Modifier(modifier) => {
                    let mut modifiers = state.pressed.modifiers();
                    modifiers.set(*modifier, true);
                    state.pressed.release_modifier(*modifier);
                    KeyToken::modifiers_only(modifiers)
                }
                NormalizedKey::Key(key) => {
                    let token = state.pressed.token_with(Some(key));
                    state.pressed.release_key(key);
                    token
                }
            };
            let released = state.take_released_key_ups();
            (
                token,
                released,
                state.active_scope.clone(),
                state.text_input_focused(),
            )
        };

        for pending in &released {
            tracing::trace!(target: targets::DISPATCH, keys = %pending.token, scope = %pending.scope_id, "running deferred key-up");
            pending.command.run_key_up(&CommandInvocation {
                event: Some(event.clone()),
                keys: Some(pending.token.clone()),
                scope_id: pending.scope_id.clone(),
            });
        }

        let active_scope = if released.is_empty() {
            active_scope
        } else {
            self.active_scope()
        };

        KeypressResult {
            pressed_keys: token.to_string(),
            non_modifier: token.has_base_key(),
            event,
            active_scope,
            text_input_focused: text_input,
            command_scope_activated: false,
            captured: false,
        }
    }
}
