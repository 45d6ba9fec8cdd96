//! Identifiers shared by every Horizon Keyscope subsystem.
//!
//! # Key Types
//!
//! - [`ScopeId`] - Process-unique name of a scope node
//! - [`CommandId`] - Arena key of a registered command
//! - [`ElementId`] - Opaque handle of a live UI element owned by the host
//! - [`ScopeIdGenerator`] - Monotonic counter producing fresh [`ScopeId`]s

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use slotmap::new_key_type;

new_key_type! {
    /// A unique identifier for a registered command.
    ///
    /// `CommandId`s are arena keys. They become invalid once the command is
    /// disposed and are never reused for a different command while any copy
    /// of the old key is still around.
    pub struct CommandId;
}

/// Name of the root scope every tree starts from.
pub const ROOT_SCOPE: &str = "global";

/// Identifier of a node in the scope tree.
///
/// Scope ids are cheap to clone (reference counted) and compare by value.
/// Fresh ids come from [`ScopeIdGenerator::next`], which appends a counter to
/// a caller-supplied prefix.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(Arc<str>);

impl ScopeId {
    /// Create a scope id from an arbitrary name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The id of the root scope, `"global"`.
    pub fn root() -> Self {
        Self::new(ROOT_SCOPE)
    }

    /// Whether this id names the root scope.
    #[inline]
    pub fn is_root(&self) -> bool {
        &*self.0 == ROOT_SCOPE
    }

    /// Borrow the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ScopeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Produces ids of the form `"<prefix>-<n>"`, unique per generator.
#[derive(Debug, Default)]
pub struct ScopeIdGenerator {
    counter: AtomicU64,
}

impl ScopeIdGenerator {
    /// Create a generator starting at zero.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Generate the next id for `prefix`.
    pub fn next(&self, prefix: &str) -> ScopeId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        ScopeId::from(format!("{prefix}-{n}"))
    }
}

/// Handle of a live UI element supplied by the host application.
///
/// The engine never dereferences an element; it only passes the handle back
/// to the host when asking about parents, focus or text input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl ElementId {
    /// Convert the id to its raw numeric value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}
