//! Integration tests for deferred key-up handlers.

mod common;

use common::{Counter, engine, letter, letter_up};
use horizon_keyscope::{CommandRegistration, CommandSpec, HotkeyEngine, ScopeId, ScopeRegistration};

/// Register a "hold to peek" command on `h` in a fresh panel scope.
fn peek(engine: &HotkeyEngine, consume: bool) -> (ScopeId, Counter, Counter, CommandRegistration) {
    let panel = engine.create_scope_id("panel");
    engine.register_scope(ScopeRegistration::ui(panel.clone()));
    engine.set_active_scope(&panel);

    let downs = Counter::new();
    let ups = Counter::new();
    let d = downs.clone();
    let u = ups.clone();
    let registration = engine.register_command(
        CommandSpec::new(panel.clone(), "Peek")
            .with_hotkeys("h")
            .on_key_down(move |_| {
                d.hit();
                consume
            })
            .on_key_up(move |_| u.hit()),
    );
    (panel, downs, ups, registration)
}

#[test]
fn test_key_up_fires_once_after_release() {
    let (engine, _host) = engine();
    let (_panel, downs, ups, _registration) = peek(&engine, true);

    engine.handle_key_event(letter('h'));
    assert_eq!(downs.get(), 1);
    assert_eq!(ups.get(), 0);
    assert_eq!(engine.pending_key_up_count(), 1);

    engine.handle_key_event(letter_up('h'));
    assert_eq!(ups.get(), 1);
    assert_eq!(engine.pending_key_up_count(), 0);

    engine.handle_key_event(letter_up('h'));
    assert_eq!(ups.get(), 1);
}

#[test]
fn test_key_up_fires_after_active_scope_changed() {
    let (engine, _host) = engine();
    let (_panel, _downs, ups, _registration) = peek(&engine, true);
    let other = engine.create_scope_id("other");
    engine.register_scope(ScopeRegistration::ui(other.clone()));

    engine.handle_key_event(letter('h'));
    engine.set_active_scope(&other);
    engine.handle_key_event(letter_up('h'));

    assert_eq!(ups.get(), 1);
}

#[test]
fn test_key_up_waits_while_key_is_held() {
    let (engine, _host) = engine();
    let (_panel, _downs, ups, _registration) = peek(&engine, false);

    engine.handle_key_event(letter('h'));
    engine.handle_key_event(letter('j'));
    engine.handle_key_event(letter_up('j'));
    assert_eq!(ups.get(), 0);
    assert!(engine.is_key_held("h"));

    engine.handle_key_event(letter_up('h'));
    assert_eq!(ups.get(), 1);
}

#[test]
fn test_auto_repeat_defers_a_single_key_up() {
    let (engine, _host) = engine();
    let (_panel, downs, ups, _registration) = peek(&engine, false);

    for _ in 0..3 {
        engine.handle_key_event(letter('h'));
    }
    assert_eq!(downs.get(), 3);
    assert_eq!(engine.pending_key_up_count(), 1);

    engine.handle_key_event(letter_up('h'));
    assert_eq!(ups.get(), 1);
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn test_key_up_dropped_when_scope_removed() {
    let (engine, _host) = engine();
    let (panel, _downs, ups, _registration) = peek(&engine, true);

    engine.handle_key_event(letter('h'));
    assert!(engine.remove_scope(&panel));
    assert_eq!(engine.pending_key_up_count(), 0);

    engine.handle_key_event(letter_up('h'));
    assert_eq!(ups.get(), 0);
}

#[test]
fn test_key_up_dropped_when_command_disposed() {
    let (engine, _host) = engine();
    let (_panel, _downs, ups, registration) = peek(&engine, true);

    engine.handle_key_event(letter('h'));
    registration.dispose();
    assert_eq!(engine.pending_key_up_count(), 0);

    engine.handle_key_event(letter_up('h'));
    assert_eq!(ups.get(), 0);
}
