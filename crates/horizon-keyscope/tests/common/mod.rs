//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use horizon_keyscope::{
    ElementHost, ElementId, EngineConfig, HotkeyEngine, KeyModifiers, Platform, RawKeyEvent,
};
use parking_lot::Mutex;

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// An in-memory element tree.
#[derive(Default)]
pub struct TestHost {
    parents: Mutex<HashMap<ElementId, ElementId>>,
    text_inputs: Mutex<HashSet<ElementId>>,
    focused: Mutex<Option<ElementId>>,
    focus_requests: Mutex<Vec<ElementId>>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `parent` the structural parent of `child`.
    pub fn link(&self, child: u64, parent: u64) {
        self.parents.lock().insert(ElementId(child), ElementId(parent));
    }

    pub fn mark_text_input(&self, element: u64) {
        self.text_inputs.lock().insert(ElementId(element));
    }

    pub fn set_focused(&self, element: Option<u64>) {
        *self.focused.lock() = element.map(ElementId);
    }

    pub fn focus_requests(&self) -> Vec<ElementId> {
        self.focus_requests.lock().clone()
    }
}

impl ElementHost for TestHost {
    fn parent_element(&self, element: ElementId) -> Option<ElementId> {
        self.parents.lock().get(&element).copied()
    }

    fn focused_element(&self) -> Option<ElementId> {
        *self.focused.lock()
    }

    fn is_text_input(&self, element: ElementId) -> bool {
        self.text_inputs.lock().contains(&element)
    }

    fn focus_element(&self, element: ElementId) {
        *self.focused.lock() = Some(element);
        self.focus_requests.lock().push(element);
    }
}

/// An engine with a fresh [`TestHost`], using the non-macOS keyboard.
pub fn engine() -> (HotkeyEngine, Arc<TestHost>) {
    init_tracing();
    let host = TestHost::new();
    let engine = HotkeyEngine::with_host(
        EngineConfig::new().with_platform(Platform::Other),
        host.clone(),
    );
    (engine, host)
}

/// Shared call counter for handlers.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Event builders
// =============================================================================

/// Key-down for a letter key.
pub fn letter(ch: char) -> RawKeyEvent {
    RawKeyEvent::down(ch.to_string(), format!("Key{}", ch.to_ascii_uppercase()))
}

/// Key-up for a letter key.
pub fn letter_up(ch: char) -> RawKeyEvent {
    RawKeyEvent::up(ch.to_string(), format!("Key{}", ch.to_ascii_uppercase()))
}

pub fn space() -> RawKeyEvent {
    RawKeyEvent::down(" ", "Space")
}

pub fn backspace() -> RawKeyEvent {
    RawKeyEvent::down("Backspace", "Backspace")
}

pub fn meta_down() -> RawKeyEvent {
    RawKeyEvent::down("Meta", "MetaLeft").with_modifiers(KeyModifiers::CMD)
}

pub fn meta_up() -> RawKeyEvent {
    RawKeyEvent::up("Meta", "MetaLeft")
}

pub fn shift_down() -> RawKeyEvent {
    RawKeyEvent::down("Shift", "ShiftLeft").with_modifiers(KeyModifiers::SHIFT)
}

/// Cmd held while pressing a letter.
pub fn cmd_letter(ch: char) -> RawKeyEvent {
    letter(ch).with_modifiers(KeyModifiers::CMD)
}
