//! The scope tree.
//!
//! Scopes form a single tree rooted at `"global"`. Each node is either a
//! UI scope (anchored to a live element) or a command scope (entered by a
//! hotkey and left on the next plain keystroke).
//!
//! The tree is an arena keyed by [`ScopeId`]: every structural operation
//! takes the id of the node being touched and updates both sides of the
//! parent/child link, so `children` of a parent always lists the child
//! while the child exists.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use horizon_keyscope_core::logging::targets;
use horizon_keyscope_core::{
    CommandId, ElementId, KeyscopeError, Result, ScopeId, TreeFormatOptions,
};

use crate::key::KeyToken;

/// The two kinds of scope node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Anchored to a live UI element; active while it holds focus.
    Ui,
    /// Transient scope entered through an activation hotkey.
    Command,
}

impl ScopeKind {
    fn label(self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Command => "command",
        }
    }
}

/// Arguments for registering a scope.
#[derive(Clone, Debug)]
pub struct ScopeRegistration {
    /// Id of the new scope; must be fresh.
    pub id: ScopeId,
    /// Parent scope; the root when absent.
    pub parent: Option<ScopeId>,
    /// Node kind.
    pub kind: ScopeKind,
    /// Pin the parent to the root regardless of UI nesting.
    pub detached: bool,
    /// Keys that open a command scope.
    pub activation_keys: Vec<KeyToken>,
}

impl ScopeRegistration {
    /// Describe a UI scope.
    pub fn ui(id: impl Into<ScopeId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            kind: ScopeKind::Ui,
            detached: false,
            activation_keys: Vec::new(),
        }
    }

    /// Describe a command scope declared by `parent` and opened by `keys`.
    pub fn command(id: impl Into<ScopeId>, parent: impl Into<ScopeId>, keys: Vec<KeyToken>) -> Self {
        Self {
            id: id.into(),
            parent: Some(parent.into()),
            kind: ScopeKind::Command,
            detached: false,
            activation_keys: keys,
        }
    }

    /// Builder pattern for the parent.
    pub fn with_parent(mut self, parent: impl Into<ScopeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Builder pattern for the detached flag.
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }
}

/// A node in the scope tree.
#[derive(Clone, Debug)]
pub struct ScopeNode {
    pub(crate) id: ScopeId,
    pub(crate) kind: ScopeKind,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) hotkey_commands: HashMap<KeyToken, CommandId>,
    pub(crate) unkeyed_commands: Vec<CommandId>,
    pub(crate) detached: bool,
    pub(crate) element: Option<ElementId>,
    pub(crate) original_parent: Option<ScopeId>,
    pub(crate) activation_keys: Vec<KeyToken>,
}

impl ScopeNode {
    fn new(id: ScopeId, kind: ScopeKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: Vec::new(),
            hotkey_commands: HashMap::new(),
            unkeyed_commands: Vec::new(),
            detached: false,
            element: None,
            original_parent: None,
            activation_keys: Vec::new(),
        }
    }

    /// The scope id.
    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    /// The node kind.
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// The live parent.
    pub fn parent(&self) -> Option<&ScopeId> {
        self.parent.as_ref()
    }

    /// Immediate children, in attachment order.
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    /// Whether the node is pinned to the root.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// The element a UI scope is attached to.
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// The scope that declared a command scope.
    pub fn original_parent(&self) -> Option<&ScopeId> {
        self.original_parent.as_ref()
    }

    /// Keys that open a command scope.
    pub fn activation_keys(&self) -> &[KeyToken] {
        &self.activation_keys
    }

    /// Every command id stored on this node, keyed ones first, without duplicates.
    pub(crate) fn command_ids(&self) -> Vec<CommandId> {
        let mut seen = HashSet::new();
        let mut keyed: Vec<(String, CommandId)> = self
            .hotkey_commands
            .iter()
            .map(|(token, id)| (token.to_string(), *id))
            .collect();
        keyed.sort();
        keyed
            .into_iter()
            .map(|(_, id)| id)
            .chain(self.unkeyed_commands.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Arena of scope nodes rooted at a single root scope.
#[derive(Debug)]
pub struct ScopeTree {
    nodes: HashMap<ScopeId, ScopeNode>,
    root: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create a tree holding only the root scope.
    pub fn new() -> Self {
        let root = ScopeId::root();
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), ScopeNode::new(root.clone(), ScopeKind::Ui));
        Self { nodes, root }
    }

    /// The root scope id.
    pub fn root(&self) -> &ScopeId {
        &self.root
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Whether a scope exists.
    pub fn contains(&self, id: &ScopeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node.
    pub fn get(&self, id: &ScopeId) -> Option<&ScopeNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &ScopeId) -> Option<&mut ScopeNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &ScopeNode> {
        self.nodes.values()
    }

    /// Insert a new node and link it under its parent.
    ///
    /// Detached scopes and scopes without a (known) parent hang off the root.
    pub fn insert(&mut self, registration: ScopeRegistration) -> Result<()> {
        let ScopeRegistration {
            id,
            parent,
            kind,
            detached,
            activation_keys,
        } = registration;

        if self.nodes.contains_key(&id) {
            return Err(KeyscopeError::DuplicateScope(id));
        }

        if kind == ScopeKind::Command {
            match &parent {
                Some(parent) if self.nodes.contains_key(parent) => {}
                Some(parent) => return Err(KeyscopeError::UnknownScope(parent.clone())),
                None => return Err(KeyscopeError::UnknownScope(id)),
            }
        }

        let declared_parent = match parent {
            Some(parent) if self.nodes.contains_key(&parent) => Some(parent),
            Some(parent) => {
                tracing::warn!(target: targets::SCOPE, scope = %id, parent = %parent, "parent scope not registered, attaching to root");
                None
            }
            None => None,
        };

        let live_parent = if detached {
            self.root.clone()
        } else {
            declared_parent.clone().unwrap_or_else(|| self.root.clone())
        };

        let mut node = ScopeNode::new(id.clone(), kind);
        node.detached = detached;
        node.parent = Some(live_parent.clone());
        if kind == ScopeKind::Command {
            node.original_parent = declared_parent;
            node.activation_keys = activation_keys;
        }
        self.nodes.insert(id.clone(), node);

        if let Some(parent) = self.nodes.get_mut(&live_parent) {
            parent.children.push(id.clone());
        }

        tracing::trace!(target: targets::SCOPE, scope = %id, kind = kind.label(), parent = %live_parent, "registered scope");
        Ok(())
    }

    /// Move a node under a new parent, keeping both child lists consistent.
    ///
    /// Re-linking to the current parent is a no-op, so repeated calls
    /// converge instead of accumulating duplicate links.
    pub fn set_parent(&mut self, id: &ScopeId, new_parent: &ScopeId) -> Result<()> {
        if *id == self.root {
            return Err(KeyscopeError::RootScopeImmutable);
        }
        if !self.nodes.contains_key(id) {
            return Err(KeyscopeError::UnknownScope(id.clone()));
        }
        if !self.nodes.contains_key(new_parent) {
            return Err(KeyscopeError::UnknownScope(new_parent.clone()));
        }
        if self.is_ancestor_of(id, new_parent) {
            tracing::error!(target: targets::SCOPE, scope = %id, parent = %new_parent, "refusing to create a cycle");
            return Err(KeyscopeError::CircularParent {
                scope: id.clone(),
                parent: new_parent.clone(),
            });
        }

        let old_parent = self.nodes.get(id).and_then(|n| n.parent.clone());
        if old_parent.as_ref() == Some(new_parent) {
            if let Some(parent) = self.nodes.get_mut(new_parent) {
                if !parent.children.contains(id) {
                    parent.children.push(id.clone());
                }
            }
            return Ok(());
        }

        if let Some(old_parent) = old_parent {
            if let Some(parent) = self.nodes.get_mut(&old_parent) {
                parent.children.retain(|child| child != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(new_parent.clone());
        }
        if let Some(parent) = self.nodes.get_mut(new_parent) {
            if !parent.children.contains(id) {
                parent.children.push(id.clone());
            }
        }

        tracing::trace!(target: targets::SCOPE, scope = %id, parent = %new_parent, "re-parented scope");
        Ok(())
    }

    /// Check if `potential_ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_of(&self, potential_ancestor: &ScopeId, id: &ScopeId) -> bool {
        self.branch(id).iter().any(|scope| scope == potential_ancestor)
    }

    /// The branch from `id` up to the root, inclusive, leaf first.
    ///
    /// A dangling parent link is logged and ends the walk early.
    pub fn branch(&self, id: &ScopeId) -> Vec<ScopeId> {
        let mut branch = Vec::new();
        let mut current = self.nodes.get(id);
        if current.is_none() {
            tracing::error!(target: targets::SCOPE, scope = %id, "branch requested for unknown scope");
        }

        while let Some(node) = current {
            if branch.contains(&node.id) {
                tracing::error!(target: targets::SCOPE, scope = %node.id, "cycle in scope tree");
                break;
            }
            branch.push(node.id.clone());
            current = match &node.parent {
                Some(parent) => {
                    let next = self.nodes.get(parent);
                    if next.is_none() {
                        tracing::error!(target: targets::SCOPE, scope = %node.id, missing = %parent, "scope references missing parent");
                    }
                    next
                }
                None => None,
            };
        }
        branch
    }

    /// The closest UI scope strictly above `id`, skipping `excluded` ids.
    ///
    /// Falls back to the root when the walk finds nothing.
    pub fn nearest_ui_ancestor(&self, id: &ScopeId, excluded: &HashSet<ScopeId>) -> ScopeId {
        self.branch(id)
            .into_iter()
            .skip(1)
            .find(|scope| {
                !excluded.contains(scope)
                    && self
                        .nodes
                        .get(scope)
                        .is_some_and(|node| node.kind == ScopeKind::Ui)
            })
            .unwrap_or_else(|| self.root.clone())
    }

    /// Collect a scope and everything that must be removed with it.
    ///
    /// A scope is owned by its declaring scope if it is a command scope, and
    /// by its live parent otherwise. The set is every scope owned, directly
    /// or transitively, by `id`. Command scopes that merely hang below a
    /// doomed scope because they were entered from there are not included;
    /// see [`displaced_command_scopes`](Self::displaced_command_scopes).
    /// Descendants come before their ancestors; `id` is last.
    pub fn collect_removal_set(&self, id: &ScopeId) -> Vec<ScopeId> {
        let doomed = self.owned_closure(id);
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        self.collect_removal_recursive(id, &doomed, &mut visited, &mut result);
        result
    }

    fn owner(node: &ScopeNode) -> Option<&ScopeId> {
        match (node.kind, &node.original_parent) {
            (ScopeKind::Command, Some(declared_by)) => Some(declared_by),
            _ => node.parent.as_ref(),
        }
    }

    fn owned_closure(&self, id: &ScopeId) -> HashSet<ScopeId> {
        let mut doomed = HashSet::new();
        if !self.nodes.contains_key(id) {
            return doomed;
        }
        doomed.insert(id.clone());
        loop {
            let owned: Vec<ScopeId> = self
                .nodes
                .values()
                .filter(|node| node.id != self.root && !doomed.contains(&node.id))
                .filter(|node| Self::owner(node).is_some_and(|owner| doomed.contains(owner)))
                .map(|node| node.id.clone())
                .collect();
            if owned.is_empty() {
                return doomed;
            }
            doomed.extend(owned);
        }
    }

    fn collect_removal_recursive(
        &self,
        id: &ScopeId,
        doomed: &HashSet<ScopeId>,
        visited: &mut HashSet<ScopeId>,
        result: &mut Vec<ScopeId>,
    ) {
        if !visited.insert(id.clone()) {
            return;
        }
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        let declared: Vec<ScopeId> = self
            .nodes
            .values()
            .filter(|other| other.original_parent.as_ref() == Some(id))
            .map(|other| other.id.clone())
            .collect();

        for next in node.children.iter().chain(declared.iter()) {
            if doomed.contains(next) {
                self.collect_removal_recursive(next, doomed, visited, result);
            }
        }
        result.push(id.clone());
    }

    /// Command scopes that survive removing `doomed` but whose live parent
    /// does not, paired with the scope that declared them.
    pub fn displaced_command_scopes(&self, doomed: &HashSet<ScopeId>) -> Vec<(ScopeId, ScopeId)> {
        let mut displaced: Vec<(ScopeId, ScopeId)> = self
            .nodes
            .values()
            .filter(|node| !doomed.contains(&node.id) && node.kind == ScopeKind::Command)
            .filter(|node| node.parent.as_ref().is_some_and(|parent| doomed.contains(parent)))
            .map(|node| {
                let home = node
                    .original_parent
                    .clone()
                    .filter(|declared_by| !doomed.contains(declared_by))
                    .unwrap_or_else(|| self.root.clone());
                (node.id.clone(), home)
            })
            .collect();
        displaced.sort();
        displaced
    }

    /// Unlink a node from its parent and delete it.
    ///
    /// Children are not touched; callers remove them first.
    pub(crate) fn remove_node(&mut self, id: &ScopeId) -> Option<ScopeNode> {
        if *id == self.root {
            return None;
        }
        let node = self.nodes.remove(id)?;
        if let Some(parent) = &node.parent {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.retain(|child| child != id);
            }
        }
        Some(node)
    }

    // =========================================================================
    // Debug / Diagnostics
    // =========================================================================

    /// Render the tree below `id` as text.
    pub fn format_subtree(&self, id: &ScopeId, options: &TreeFormatOptions) -> String {
        self.format_subtree_marked(id, options, None)
    }

    /// Render the tree below `id`, flagging `marked` with a trailing `*`.
    pub fn format_subtree_marked(
        &self,
        id: &ScopeId,
        options: &TreeFormatOptions,
        marked: Option<&ScopeId>,
    ) -> String {
        let mut output = String::new();
        self.format_recursive(id, 0, true, options, marked, &mut output);
        output
    }

    fn format_recursive(
        &self,
        id: &ScopeId,
        depth: usize,
        is_last: bool,
        options: &TreeFormatOptions,
        marked: Option<&ScopeId>,
        output: &mut String,
    ) {
        if options.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        output.push_str(&options.node_prefix(depth, is_last));
        output.push_str(id.as_str());
        if options.show_kinds {
            let _ = write!(output, " ({})", node.kind.label());
            if node.detached {
                output.push_str(" [detached]");
            }
        }
        if marked == Some(id) {
            output.push_str(" *");
        }
        output.push('\n');

        if options.show_bindings {
            let mut tokens: Vec<String> = node.hotkey_commands.keys().map(|t| t.to_string()).collect();
            tokens.sort();
            let prefix = options.detail_prefix(depth + 1);
            for token in tokens {
                let _ = writeln!(output, "{prefix}  {token}");
            }
        }

        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate() {
            self.format_recursive(child, depth + 1, i + 1 == count, options, marked, output);
        }
    }
}
