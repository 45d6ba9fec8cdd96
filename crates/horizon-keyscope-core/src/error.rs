//! Error types for Horizon Keyscope.

use crate::ids::{ElementId, ScopeId};

/// Result type alias for keyscope operations.
pub type Result<T> = std::result::Result<T, KeyscopeError>;

/// Errors raised while parsing a key token string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyTokenParseError {
    /// The string is empty.
    #[error("empty key token")]
    Empty,
    /// A segment between `+` separators is empty.
    #[error("empty segment in key token '{0}'")]
    EmptySegment(String),
    /// More than one non-modifier key was given.
    #[error("key token '{0}' names more than one base key")]
    MultipleKeys(String),
}

/// The main error type for keyscope operations.
///
/// Every variant is recoverable: the engine logs it and degrades to a no-op
/// rather than unwinding through a keyboard handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyscopeError {
    /// The referenced scope is not registered.
    #[error("scope '{0}' is not registered")]
    UnknownScope(ScopeId),

    /// A scope with this id already exists.
    #[error("scope '{0}' is already registered")]
    DuplicateScope(ScopeId),

    /// The scope exists but is not a command scope.
    #[error("scope '{0}' is not a command scope")]
    ScopeNotCommand(ScopeId),

    /// The scope exists but is not a UI scope.
    #[error("scope '{0}' is not a UI scope")]
    ScopeNotUi(ScopeId),

    /// The element already carries a scope marker.
    #[error("{element} is already attached to scope '{existing}'")]
    ElementAlreadyScoped {
        /// The element that was targeted.
        element: ElementId,
        /// The scope currently attached to it.
        existing: ScopeId,
    },

    /// The root scope cannot be removed or re-parented.
    #[error("the root scope cannot be modified")]
    RootScopeImmutable,

    /// Re-parenting would make a scope its own ancestor.
    #[error("scope '{scope}' cannot be moved under its descendant '{parent}'")]
    CircularParent {
        /// The scope being moved.
        scope: ScopeId,
        /// The requested parent.
        parent: ScopeId,
    },

    /// A parent or ancestor referenced by the tree is missing.
    #[error("scope '{scope}' references missing ancestor '{missing}'")]
    MissingAncestor {
        /// The scope whose link is dangling.
        scope: ScopeId,
        /// The id that could not be found.
        missing: ScopeId,
    },

    /// A hotkey string could not be parsed.
    #[error("invalid key token: {0}")]
    InvalidKeyToken(#[from] KeyTokenParseError),
}

impl KeyscopeError {
    /// Create a missing-ancestor error.
    pub fn missing_ancestor(scope: impl Into<ScopeId>, missing: impl Into<ScopeId>) -> Self {
        Self::MissingAncestor {
            scope: scope.into(),
            missing: missing.into(),
        }
    }

    /// Whether the error indicates a broken tree rather than a bad call.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::MissingAncestor { .. } | Self::CircularParent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeyscopeError::UnknownScope(ScopeId::new("panel-1"));
        assert_eq!(err.to_string(), "scope 'panel-1' is not registered");

        let err = KeyscopeError::ElementAlreadyScoped {
            element: ElementId(7),
            existing: ScopeId::new("list-2"),
        };
        assert_eq!(
            err.to_string(),
            "element#7 is already attached to scope 'list-2'"
        );
    }

    #[test]
    fn test_parse_error_converts() {
        let err: KeyscopeError = KeyTokenParseError::Empty.into();
        assert_eq!(err, KeyscopeError::InvalidKeyToken(KeyTokenParseError::Empty));
        assert!(!err.is_invariant_violation());
        assert!(KeyscopeError::missing_ancestor("a", "b").is_invariant_violation());
    }
}
