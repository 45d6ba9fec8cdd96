//! Integration tests for keyboard dispatch and shadowing.

mod common;

use std::sync::Arc;

use common::{Counter, backspace, cmd_letter, engine, letter, letter_up, meta_down, meta_up};
use horizon_keyscope::{
    CommandSpec, EngineConfig, HotkeyEngine, KeyModifiers, KeyNormalizer, KeypressResult, Platform, RawKeyEvent, ScopeId,
    ScopeRegistration,
};
use parking_lot::Mutex;

fn panel_and_item(engine: &HotkeyEngine) -> (ScopeId, ScopeId) {
    let panel = engine.create_scope_id("panel");
    let item = engine.create_scope_id("item");
    assert!(engine.register_scope(ScopeRegistration::ui(panel.clone())));
    assert!(engine.register_scope(ScopeRegistration::ui(item.clone()).with_parent(panel.clone())));
    (panel, item)
}

// =============================================================================
// Shadowing
// =============================================================================

#[test]
fn test_closer_scope_shadows_ancestor() {
    let (engine, _host) = engine();
    let (panel, item) = panel_and_item(&engine);

    let delete = Counter::new();
    let delete_item = Counter::new();
    let d = delete.clone();
    engine.register_command(
        CommandSpec::new(panel.clone(), "Delete")
            .with_token("delete")
            .with_hotkeys("backspace")
            .on_key_down(move |_| {
                d.hit();
                true
            }),
    );
    let di = delete_item.clone();
    engine.register_command(
        CommandSpec::new(item.clone(), "Delete item")
            .with_token("delete")
            .with_hotkeys("backspace")
            .on_key_down(move |_| {
                di.hit();
                true
            }),
    );

    engine.set_active_scope(&item);
    let result = engine.handle_key_event(backspace()).unwrap();
    assert!(result.captured);
    assert_eq!(delete_item.get(), 1);
    assert_eq!(delete.get(), 0);

    engine.set_active_scope(&panel);
    engine.handle_key_event(backspace());
    assert_eq!(delete_item.get(), 1);
    assert_eq!(delete.get(), 1);
}

#[test]
fn test_unconsumed_handler_lets_ancestor_run() {
    let (engine, _host) = engine();
    let (panel, item) = panel_and_item(&engine);

    let outer = Counter::new();
    let inner = Counter::new();
    let o = outer.clone();
    engine.register_command(CommandSpec::new(panel, "Outer").with_hotkeys("x").on_key_down(move |_| {
        o.hit();
        true
    }));
    let i = inner.clone();
    engine.register_command(CommandSpec::new(item.clone(), "Inner").with_hotkeys("x").on_key_down(move |_| {
        i.hit();
        false
    }));

    engine.set_active_scope(&item);
    engine.handle_key_event(letter('x'));
    assert_eq!(inner.get(), 1);
    assert_eq!(outer.get(), 1);
}

#[test]
fn test_false_condition_skips_command() {
    let (engine, _host) = engine();
    let (panel, item) = panel_and_item(&engine);

    let outer = Counter::new();
    let inner = Counter::new();
    let o = outer.clone();
    engine.register_command(CommandSpec::new(panel, "Outer").with_hotkeys("x").on_key_down(move |_| {
        o.hit();
        true
    }));
    let i = inner.clone();
    engine.register_command(
        CommandSpec::new(item.clone(), "Inner")
            .with_hotkeys("x")
            .with_condition(|| false)
            .on_key_down(move |_| {
                i.hit();
                true
            }),
    );

    engine.set_active_scope(&item);
    engine.handle_key_event(letter('x'));
    assert_eq!(inner.get(), 0);
    assert_eq!(outer.get(), 1);
}

#[test]
fn test_text_input_blocks_commands_unless_allowed() {
    let (engine, host) = engine();
    let (panel, _item) = panel_and_item(&engine);
    engine.set_active_scope(&panel);
    host.mark_text_input(7);
    host.set_focused(Some(7));

    let blocked = Counter::new();
    let allowed = Counter::new();
    let b = blocked.clone();
    engine.register_command(CommandSpec::new(panel.clone(), "Blocked").with_hotkeys("x").on_key_down(move |_| {
        b.hit();
        true
    }));
    let a = allowed.clone();
    engine.register_command(
        CommandSpec::new(panel, "Allowed")
            .with_hotkeys("escape")
            .run_in_text_input(true)
            .on_key_down(move |_| {
                a.hit();
                true
            }),
    );

    let result = engine.handle_key_event(letter('x')).unwrap();
    assert!(result.text_input_focused);
    assert!(!result.captured);
    engine.handle_key_event(RawKeyEvent::down("Escape", "Escape"));

    assert_eq!(blocked.get(), 0);
    assert_eq!(allowed.get(), 1);
}

#[test]
fn test_handler_receives_invocation_context() {
    let (engine, _host) = engine();
    let (panel, _item) = panel_and_item(&engine);
    engine.set_active_scope(&panel);

    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    engine.register_command(CommandSpec::new(panel.clone(), "Save").with_hotkeys("cmd+s").on_key_down(
        move |invocation| {
            *s.lock() = Some((invocation.keys.clone(), invocation.scope_id.clone()));
            true
        },
    ));

    engine.handle_key_event(meta_down());
    engine.handle_key_event(cmd_letter('s'));

    let (keys, scope) = seen.lock().clone().unwrap();
    assert_eq!(keys.unwrap().to_string(), "cmd+s");
    assert_eq!(scope, panel);
}

#[test]
fn test_handler_may_remove_its_own_scope() {
    let (engine, _host) = engine();
    let (panel, item) = panel_and_item(&engine);
    engine.set_active_scope(&item);

    let handle = engine.clone();
    let target = item.clone();
    engine.register_command(CommandSpec::new(item.clone(), "Close").with_hotkeys("escape").on_key_down(
        move |_| {
            handle.remove_scope(&target);
            true
        },
    ));

    let result = engine.handle_key_event(RawKeyEvent::down("Escape", "Escape")).unwrap();
    assert!(result.captured);
    assert_eq!(result.active_scope, panel);
    assert!(!engine.scope_exists(&item));
}

// =============================================================================
// Pressed keys
// =============================================================================

#[test]
fn test_modifier_release_clears_pressed_keys() {
    let (engine, _host) = engine();

    engine.handle_key_event(meta_down());
    engine.handle_key_event(cmd_letter('k'));
    assert_eq!(engine.pressed_keys(), "cmd+k");
    assert!(engine.is_key_held("cmd"));
    assert!(engine.is_key_held("k"));

    // The OS may swallow the key-up for "k" during a system shortcut.
    engine.handle_key_event(meta_up());
    assert_eq!(engine.pressed_keys(), "");
    assert!(!engine.is_key_held("k"));
}

#[test]
fn test_option_release_clears_glyph_and_dead_keys_on_mac() {
    common::init_tracing();
    let mac = HotkeyEngine::new(EngineConfig::new().with_platform(Platform::MacOs));
    let opt = KeyModifiers {
        opt: true,
        ..KeyModifiers::NONE
    };

    mac.handle_key_event(RawKeyEvent::down("Alt", "AltLeft").with_modifiers(opt));
    mac.handle_key_event(RawKeyEvent::down("ø", "KeyO").with_modifiers(opt));
    assert_eq!(mac.pressed_keys(), "opt+o");
    mac.handle_key_event(RawKeyEvent::down("Dead", "KeyN").with_modifiers(opt));
    assert_eq!(mac.pressed_keys(), "opt+n");
    assert!(mac.is_key_held("o"));

    // Neither the glyph nor the dead key reports its own key-up.
    mac.handle_key_event(RawKeyEvent::up("Alt", "AltLeft"));
    assert_eq!(mac.pressed_keys(), "");
    assert!(!mac.is_key_held("o"));
    assert!(!mac.is_key_held("n"));
    assert!(!mac.is_key_held("opt"));
}

#[test]
fn test_shift_release_clears_punctuation_on_every_platform() {
    common::init_tracing();
    for platform in [Platform::MacOs, Platform::Other] {
        let engine = HotkeyEngine::new(EngineConfig::new().with_platform(platform));

        engine.handle_key_event(RawKeyEvent::down("Shift", "ShiftLeft").with_modifiers(KeyModifiers::SHIFT));
        engine.handle_key_event(RawKeyEvent::down("?", "Slash").with_modifiers(KeyModifiers::SHIFT));
        engine.handle_key_event(RawKeyEvent::down("!", "Digit1").with_modifiers(KeyModifiers::SHIFT));
        assert_eq!(engine.pressed_keys(), "shift+1", "{platform:?}");
        assert!(engine.is_key_held("/"), "{platform:?}");

        engine.handle_key_event(RawKeyEvent::up("Shift", "ShiftLeft"));
        assert_eq!(engine.pressed_keys(), "", "{platform:?}");
        assert!(!engine.is_key_held("/"), "{platform:?}");
        assert!(!engine.is_key_held("1"), "{platform:?}");
    }
}

#[test]
fn test_window_blur_clears_pressed_keys() {
    let (engine, _host) = engine();
    engine.handle_key_event(letter('a'));
    assert!(engine.is_key_held("a"));
    engine.handle_window_blur();
    assert!(!engine.is_key_held("a"));
}

#[test]
fn test_key_up_releases_base_key() {
    let (engine, _host) = engine();
    engine.handle_key_event(letter('a'));
    engine.handle_key_event(letter('b'));
    engine.handle_key_event(letter_up('a'));
    assert!(!engine.is_key_held("a"));
    assert!(engine.is_key_held("b"));
}

// =============================================================================
// Normalization
// =============================================================================

#[test]
fn test_shift_slash_pretty_prints_as_question_mark() {
    let normalizer = KeyNormalizer::new(Platform::Other);
    let event = RawKeyEvent::down("?", "Slash").with_modifiers(KeyModifiers::SHIFT);
    let token = normalizer.normalize_token(&event).unwrap();
    assert_eq!(token.to_string(), "shift+/");
    assert_eq!(token.pretty(), "?");
}

#[test]
fn test_question_mark_binding_matches_shift_slash() {
    let (engine, _host) = engine();
    let literal = Counter::new();
    let l = literal.clone();
    engine.register_command(CommandSpec::new(ScopeId::root(), "Help").with_hotkeys("?").on_key_down(
        move |_| {
            l.hit();
            true
        },
    ));

    let event = RawKeyEvent::down("?", "Slash").with_modifiers(KeyModifiers::SHIFT);
    let result = engine.handle_key_event(event).unwrap();
    assert_eq!(result.pressed_keys, "shift+/");
    assert_eq!(literal.get(), 1);
}

#[test]
fn test_option_glyph_dispatches_base_letter_on_mac() {
    common::init_tracing();
    let mac = HotkeyEngine::new(EngineConfig::new().with_platform(Platform::MacOs));

    let hits = Counter::new();
    let h = hits.clone();
    mac.register_command(CommandSpec::new(ScopeId::root(), "New").with_hotkeys("opt+n").on_key_down(
        move |_| {
            h.hit();
            true
        },
    ));

    let opt = KeyModifiers {
        opt: true,
        ..KeyModifiers::NONE
    };
    mac.handle_key_event(RawKeyEvent::down("Dead", "KeyN").with_modifiers(opt));
    assert_eq!(hits.get(), 1);

    // Without Option a dead key is ignored outright.
    assert!(mac.handle_key_event(RawKeyEvent::down("Dead", "KeyN")).is_none());
}

// =============================================================================
// Notification
// =============================================================================

#[test]
fn test_subscribers_receive_every_processed_event() {
    let (engine, _host) = engine();
    let (panel, _item) = panel_and_item(&engine);
    engine.set_active_scope(&panel);
    engine.register_command(CommandSpec::new(panel.clone(), "Go").with_hotkeys("g").on_key_down(|_| true));

    let results: Arc<Mutex<Vec<KeypressResult>>> = Arc::new(Mutex::new(Vec::new()));
    let r = results.clone();
    let id = engine.subscribe_to_keypress(move |result| r.lock().push(result.clone()));

    engine.handle_key_event(letter('g'));
    engine.handle_key_event(RawKeyEvent::down("Shift", "ShiftLeft").with_modifiers(KeyModifiers::SHIFT));
    assert!(engine.handle_key_event(RawKeyEvent::down("Unidentified", "")).is_none());

    {
        let results = results.lock();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].pressed_keys, "g");
        assert!(results[0].captured);
        assert!(results[0].non_modifier);
        assert_eq!(results[0].active_scope, panel);
        assert_eq!(results[1].pressed_keys, "shift");
        assert!(!results[1].non_modifier);
        assert!(!results[1].captured);
    }

    assert!(engine.unsubscribe_from_keypress(id));
    engine.handle_key_event(letter('g'));
    assert_eq!(results.lock().len(), 2);
}

#[test]
fn test_scoped_subscription_ends_on_drop() {
    let (engine, _host) = engine();
    let hits = Counter::new();
    let h = hits.clone();
    let guard = engine.subscribe_to_keypress_scoped(move |_| h.hit());

    engine.handle_key_event(letter('a'));
    drop(guard);
    engine.handle_key_event(letter('b'));
    assert_eq!(hits.get(), 1);
}
