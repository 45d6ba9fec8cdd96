//! Command registration and command-scope lifecycle.
//!
//! Registering a command returns a [`CommandRegistration`] handle. The
//! handle is the only way to unregister the command: disposing it removes
//! the command's bindings, its token index entry, any deferred key-up it
//! left behind, and the command scope it opens.
//!
//! A command scope remembers the UI scope that declared it
//! (`original_parent`), but its live parent is rebound every time it is
//! entered. Reverse token lookup follows the declaring links to answer
//! "which keys reach this command from here".

use std::sync::{Arc, Weak};

use horizon_keyscope_core::logging::targets;
use horizon_keyscope_core::{CommandId, KeyscopeError, Result, ScopeId};

use crate::command::{Command, CommandInvocation, CommandSpec};
use crate::engine::{EngineShared, EngineState, HotkeyEngine};
use crate::key::KeyToken;
use crate::scope::ScopeKind;

/// Handle returned by [`HotkeyEngine::register_command`].
///
/// Dropping the handle does not unregister the command; call
/// [`dispose`](Self::dispose). A handle produced by a failed registration
/// is inert: disposing it does nothing.
#[derive(Debug, Clone)]
pub struct CommandRegistration {
    id: Option<CommandId>,
    command_scope_id: Option<ScopeId>,
    engine: Weak<EngineShared>,
}

impl CommandRegistration {
    fn inert() -> Self {
        Self {
            id: None,
            command_scope_id: None,
            engine: Weak::new(),
        }
    }

    /// The registered command id, or `None` for an inert handle.
    pub fn id(&self) -> Option<CommandId> {
        self.id
    }

    /// The command scope this command opens.
    pub fn command_scope_id(&self) -> Option<&ScopeId> {
        self.command_scope_id.as_ref()
    }

    /// Whether registration failed.
    pub fn is_inert(&self) -> bool {
        self.id.is_none()
    }

    /// Unregister the command and remove the command scope it opens.
    ///
    /// Safe to call after the owning scope was removed.
    pub fn dispose(self) {
        let (Some(id), Some(shared)) = (self.id, self.engine.upgrade()) else {
            return;
        };
        let focus = {
            let mut state = shared.state.lock();
            state.unregister_command(id);
            match &self.command_scope_id {
                Some(scope) if state.tree.contains(scope) => match state.remove_scope(scope) {
                    Ok(focus) => focus,
                    Err(err) => {
                        tracing::error!(target: targets::COMMAND, scope = %scope, error = %err, "failed to remove command scope");
                        None
                    }
                },
                _ => None,
            }
        };
        shared.request_focus(focus);
    }
}

impl EngineState {
    fn insert_command(&mut self, mut spec: CommandSpec) -> Result<(CommandId, Option<ScopeId>)> {
        let hotkeys = std::mem::replace(&mut spec.hotkeys, Ok(Vec::new()))?;
        let scope_id = spec.scope_id.clone();

        let Some(node) = self.tree.get(&scope_id) else {
            return Err(KeyscopeError::UnknownScope(scope_id));
        };

        if let Some(target) = &spec.activate_scope {
            let Some(target_node) = self.tree.get(target) else {
                return Err(KeyscopeError::UnknownScope(target.clone()));
            };
            if target_node.kind() != ScopeKind::Command {
                return Err(KeyscopeError::ScopeNotCommand(target.clone()));
            }
            if target_node.original_parent() != Some(&scope_id) {
                tracing::warn!(target: targets::COMMAND, scope = %scope_id, command_scope = %target, "command scope was declared by a different scope");
            }
            if !same_keys(target_node.activation_keys(), &hotkeys) {
                tracing::warn!(target: targets::COMMAND, command_scope = %target, "command scope activation keys differ from the command hotkeys");
            }
        }

        if self.config.log_conflicts {
            for hotkey in &hotkeys {
                if let Some(previous) = node
                    .hotkey_commands
                    .get(hotkey)
                    .and_then(|id| self.registry.get(*id))
                {
                    tracing::warn!(
                        target: targets::COMMAND,
                        scope = %scope_id,
                        hotkey = %hotkey,
                        previous = previous.description(),
                        command = %spec.description,
                        "hotkey already bound in scope, overwriting"
                    );
                }
            }
            if let Some(token) = &spec.token {
                if let Some(previous) = self.registry.divergent_registration(token, &hotkeys) {
                    tracing::warn!(
                        target: targets::COMMAND,
                        token = %token,
                        previous = ?previous.hotkeys().iter().map(KeyToken::to_string).collect::<Vec<_>>(),
                        hotkeys = ?hotkeys.iter().map(KeyToken::to_string).collect::<Vec<_>>(),
                        "command token reused with different hotkeys"
                    );
                }
            }
        }

        let command_scope = spec.activate_scope.clone();
        let id = self.registry.insert(spec.into_command(hotkeys.clone()));
        if let Some(node) = self.tree.get_mut(&scope_id) {
            if hotkeys.is_empty() {
                node.unkeyed_commands.push(id);
            } else {
                for hotkey in hotkeys {
                    node.hotkey_commands.insert(hotkey, id);
                }
            }
        }
        tracing::trace!(target: targets::COMMAND, scope = %scope_id, "registered command");
        Ok((id, command_scope))
    }

    /// Remove a command from its scope, the token index and the pending
    /// key-up list. Quiet when the command is already gone.
    pub(crate) fn unregister_command(&mut self, id: CommandId) {
        let Some(command) = self.registry.remove(id) else {
            return;
        };
        if let Some(node) = self.tree.get_mut(command.scope_id()) {
            node.hotkey_commands.retain(|_, bound| *bound != id);
            node.unkeyed_commands.retain(|bound| *bound != id);
        }
        self.pending_key_ups.retain(|pending| pending.command_id != id);
        tracing::trace!(target: targets::COMMAND, scope = %command.scope_id(), "unregistered command");
    }

    /// The closest command in the active branch registered under `token`.
    fn active_command(&self, token: &str) -> Option<Arc<Command>> {
        self.registry
            .by_token(token)
            .filter_map(|(_, command)| {
                self.branch_distance(command.scope_id())
                    .map(|distance| (distance, command))
            })
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, command)| command.clone())
    }

    /// Activation commands leading from the active branch into `command`'s
    /// command scope, outermost first. `None` when unreachable.
    fn activation_path(&self, command: &Arc<Command>) -> Option<Vec<Arc<Command>>> {
        let mut pending_scopes = Vec::new();
        let mut current = command.scope_id().clone();

        loop {
            if self.in_active_branch(&current) {
                break;
            }
            let Some(node) = self.tree.get(&current) else {
                tracing::error!(target: targets::COMMAND, scope = %current, "command chain references a missing scope");
                return None;
            };
            if node.kind() == ScopeKind::Ui {
                return None;
            }
            let Some(declared_by) = node.original_parent().cloned() else {
                tracing::error!(target: targets::COMMAND, scope = %current, "command scope has no declaring scope");
                return None;
            };
            if !self.tree.contains(&declared_by) {
                tracing::error!(
                    target: targets::COMMAND,
                    error = %KeyscopeError::missing_ancestor(current.clone(), declared_by.clone()),
                    "command chain is broken"
                );
                return None;
            }
            if pending_scopes.len() > self.tree.len() {
                tracing::error!(target: targets::COMMAND, scope = %current, "cycle in command scope chain");
                return None;
            }
            pending_scopes.push((current, declared_by.clone()));
            current = declared_by;
        }

        if pending_scopes.is_empty() {
            return None;
        }

        let mut chain = Vec::with_capacity(pending_scopes.len() + 1);
        for (command_scope, declared_by) in pending_scopes.iter().rev() {
            let node = self.tree.get(declared_by)?;
            let opener = node.command_ids().into_iter().find_map(|id| {
                self.registry
                    .get(id)
                    .filter(|candidate| candidate.activate_scope() == Some(command_scope))
                    .cloned()
            });
            let Some(opener) = opener else {
                tracing::error!(target: targets::COMMAND, scope = %command_scope, "no command opens this command scope");
                return None;
            };
            chain.push(opener);
        }
        chain.push(command.clone());
        Some(chain)
    }
}

impl HotkeyEngine {
    /// Register a command, reporting failures to the caller.
    pub fn try_register_command(&self, spec: CommandSpec) -> Result<CommandRegistration> {
        let (id, command_scope_id) = self.shared.state.lock().insert_command(spec)?;
        Ok(CommandRegistration {
            id: Some(id),
            command_scope_id,
            engine: Arc::downgrade(&self.shared),
        })
    }

    /// Register a command.
    ///
    /// Failures (unknown scope, malformed hotkeys, bad activation target)
    /// are logged and produce an inert registration.
    pub fn register_command(&self, spec: CommandSpec) -> CommandRegistration {
        let scope = spec.scope_id.clone();
        let description = spec.description.clone();
        match self.try_register_command(spec) {
            Ok(registration) => registration,
            Err(err) => {
                tracing::error!(target: targets::COMMAND, scope = %scope, command = %description, error = %err, "failed to register command");
                CommandRegistration::inert()
            }
        }
    }

    /// The command registered under `token` whose scope is closest in the
    /// active branch.
    pub fn get_active_command_by_token(&self, token: &str) -> Option<Arc<Command>> {
        self.shared.state.lock().active_command(token)
    }

    /// Resolve `token` including commands inside command scopes that are
    /// reachable but not yet entered.
    ///
    /// Returns the activation commands to press first (outermost first)
    /// followed by the target. A directly active command is returned alone.
    pub fn get_active_command_chain(&self, token: &str) -> Option<Vec<Arc<Command>>> {
        let state = self.shared.state.lock();
        if let Some(command) = state.active_command(token) {
            return Some(vec![command]);
        }
        state
            .registry
            .by_token(token)
            .find_map(|(_, command)| state.activation_path(command))
    }

    /// Run the active command registered under `token`, as a command
    /// palette would. Returns whether a command ran.
    pub fn execute_command_by_token(&self, token: &str) -> bool {
        let Some(command) = self.get_active_command_by_token(token) else {
            return false;
        };
        if !command.is_enabled() {
            tracing::debug!(target: targets::COMMAND, token = %token, "command disabled by its condition");
            return false;
        }
        let consumed =
            command.run_key_down(&CommandInvocation::programmatic(command.scope_id().clone()));

        if let Some(target) = command.activate_scope() {
            self.shared.state.lock().enter_command_scope(target);
        }
        tracing::debug!(target: targets::COMMAND, token = %token, consumed, "executed command by token");
        true
    }
}

fn same_keys(a: &[KeyToken], b: &[KeyToken]) -> bool {
    a.len() == b.len() && a.iter().all(|token| b.contains(token))
}
