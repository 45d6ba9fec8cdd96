//! Listing the commands visible from a scope.
//!
//! Used by command palettes and shortcut cheat sheets. Scopes are scanned
//! from the starting scope outward. A command is reported as shadowed when
//! every one of its hotkeys is claimed by a closer scope, either closer in
//! the listed branch or closer to the active scope in the active branch.
//! The second case is what a key press would actually hit.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use horizon_keyscope_core::logging::targets;
use horizon_keyscope_core::ScopeId;

use crate::command::Command;
use crate::engine::HotkeyEngine;
use crate::key::KeyToken;

/// Sort order for [`HotkeyEngine::list_active_commands`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Closest scope first, then display priority.
    #[default]
    ScopeDistance,
    /// Highest display priority first, then closest scope.
    DisplayPriority,
}

/// Filters for [`HotkeyEngine::list_active_commands`].
#[derive(Clone, Debug)]
pub struct ListOptions {
    /// Drop commands whose hotkeys are all claimed by closer scopes.
    pub hide_shadowed_commands: bool,
    /// Include commands registered as hidden.
    pub include_hidden: bool,
    /// Include commands without hotkeys.
    pub include_unkeyed: bool,
    /// Drop commands whose condition currently evaluates false.
    pub only_enabled: bool,
    /// Ignore scopes further than this many steps from the start.
    pub max_scope_distance: Option<usize>,
    /// Sort order.
    pub order: ListOrder,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            hide_shadowed_commands: false,
            include_hidden: false,
            include_unkeyed: true,
            only_enabled: false,
            max_scope_distance: None,
            order: ListOrder::ScopeDistance,
        }
    }
}

impl ListOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern for hiding shadowed commands.
    pub fn hide_shadowed(mut self, hide: bool) -> Self {
        self.hide_shadowed_commands = hide;
        self
    }

    /// Builder pattern for including hidden commands.
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Builder pattern for including unkeyed commands.
    pub fn with_unkeyed(mut self, include: bool) -> Self {
        self.include_unkeyed = include;
        self
    }

    /// Builder pattern for filtering by condition.
    pub fn only_enabled(mut self, only: bool) -> Self {
        self.only_enabled = only;
        self
    }

    /// Builder pattern for the distance limit.
    pub fn with_max_scope_distance(mut self, distance: usize) -> Self {
        self.max_scope_distance = Some(distance);
        self
    }

    /// Builder pattern for the sort order.
    pub fn with_order(mut self, order: ListOrder) -> Self {
        self.order = order;
        self
    }
}

/// One entry of a command listing.
#[derive(Clone, Debug)]
pub struct ListedCommand {
    /// The command.
    pub command: Arc<Command>,
    /// Steps from the starting scope to the command's scope.
    pub scope_distance: usize,
    /// Whether every hotkey is already claimed by a closer scope.
    pub hotkey_is_shadowed: bool,
}

impl HotkeyEngine {
    /// List the commands visible from `scope`, or from the active scope.
    pub fn list_active_commands(
        &self,
        scope: Option<&ScopeId>,
        options: &ListOptions,
    ) -> Vec<ListedCommand> {
        let mut listed = {
            let state = self.shared.state.lock();
            let start = scope.cloned().unwrap_or_else(|| state.active_scope.clone());
            if !state.tree.contains(&start) {
                tracing::debug!(target: targets::COMMAND, scope = %start, "listing requested for unknown scope");
                return Vec::new();
            }

            // Closest active-branch position claiming each hotkey.
            let mut active_claims: HashMap<&KeyToken, usize> = HashMap::new();
            for (position, scope_id) in state.active_branch.iter().enumerate() {
                if let Some(node) = state.tree.get(scope_id) {
                    for hotkey in node.hotkey_commands.keys() {
                        active_claims.entry(hotkey).or_insert(position);
                    }
                }
            }

            let mut claimed: HashSet<KeyToken> = HashSet::new();
            let mut listed = Vec::new();

            for (distance, scope_id) in state.tree.branch(&start).into_iter().enumerate() {
                if options.max_scope_distance.is_some_and(|max| distance > max) {
                    break;
                }
                let Some(node) = state.tree.get(&scope_id) else {
                    continue;
                };
                let active_position = state.branch_distance(&scope_id);
                let claimed_closer = |hotkey: &KeyToken| {
                    claimed.contains(hotkey)
                        || active_position.is_some_and(|position| {
                            active_claims
                                .get(hotkey)
                                .is_some_and(|claim| *claim < position)
                        })
                };
                let commands: Vec<Arc<Command>> = node
                    .command_ids()
                    .into_iter()
                    .filter_map(|id| state.registry.get(id).cloned())
                    .collect();

                for command in &commands {
                    if command.is_hidden() && !options.include_hidden {
                        continue;
                    }
                    if command.hotkeys().is_empty() && !options.include_unkeyed {
                        continue;
                    }
                    let shadowed = !command.hotkeys().is_empty()
                        && command.hotkeys().iter().all(&claimed_closer);
                    if shadowed && options.hide_shadowed_commands {
                        continue;
                    }
                    listed.push(ListedCommand {
                        command: command.clone(),
                        scope_distance: distance,
                        hotkey_is_shadowed: shadowed,
                    });
                }

                claimed.extend(node.hotkey_commands.keys().cloned());
            }
            listed
        };

        if options.only_enabled {
            listed.retain(|entry| entry.command.is_enabled());
        }

        match options.order {
            ListOrder::ScopeDistance => listed.sort_by(|a, b| {
                (a.scope_distance, Reverse(a.command.display_priority()), a.command.description())
                    .cmp(&(b.scope_distance, Reverse(b.command.display_priority()), b.command.description()))
            }),
            ListOrder::DisplayPriority => listed.sort_by(|a, b| {
                (Reverse(a.command.display_priority()), a.scope_distance, a.command.description())
                    .cmp(&(Reverse(b.command.display_priority()), b.scope_distance, b.command.description()))
            }),
        }
        listed
    }
}
