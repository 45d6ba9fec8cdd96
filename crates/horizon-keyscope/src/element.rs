//! Access to the host's live UI element tree.
//!
//! The engine does not own UI elements. The host application implements
//! [`ElementHost`] so the engine can walk element ancestry (for branch
//! repair), ask what is focused (for text-input detection), and request
//! focus when an active scope is torn down.
//!
//! ```ignore
//! use horizon_keyscope::{ElementHost, ElementId};
//!
//! struct Dom { /* ... */ }
//!
//! impl ElementHost for Dom {
//!     fn parent_element(&self, element: ElementId) -> Option<ElementId> { /* ... */ }
//!     fn focused_element(&self) -> Option<ElementId> { /* ... */ }
//!     fn is_text_input(&self, element: ElementId) -> bool { /* ... */ }
//!     fn focus_element(&self, element: ElementId) { /* ... */ }
//! }
//! ```

use horizon_keyscope_core::ElementId;

/// Trait for querying the host's element tree.
///
/// Query methods are called while the engine holds its state lock and must
/// not call back into the engine. [`focus_element`](Self::focus_element) is
/// always called after the lock is released, so it may synchronously deliver
/// a focus-in notification back to the engine.
pub trait ElementHost: Send + Sync {
    /// Get the structural parent of an element.
    fn parent_element(&self, element: ElementId) -> Option<ElementId>;

    /// Get the element that currently holds keyboard focus.
    fn focused_element(&self) -> Option<ElementId>;

    /// Whether the element accepts text input (text fields, editors).
    fn is_text_input(&self, element: ElementId) -> bool;

    /// Move keyboard focus to an element.
    fn focus_element(&self, element: ElementId);
}

/// A host with no elements. Used until the application installs its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl ElementHost for NullHost {
    fn parent_element(&self, _element: ElementId) -> Option<ElementId> {
        None
    }

    fn focused_element(&self) -> Option<ElementId> {
        None
    }

    fn is_text_input(&self, _element: ElementId) -> bool {
        false
    }

    fn focus_element(&self, _element: ElementId) {}
}

/// Iterate an element's ancestors, nearest first, excluding the element.
pub(crate) fn ancestors<'a>(
    host: &'a dyn ElementHost,
    element: ElementId,
) -> impl Iterator<Item = ElementId> + 'a {
    std::iter::successors(host.parent_element(element), move |current| {
        host.parent_element(*current)
    })
}
