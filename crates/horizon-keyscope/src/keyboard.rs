//! Keyboard input normalization and pressed-key tracking.
//!
//! This module turns platform keyboard events into canonical key names and
//! keeps track of which keys are currently held.
//!
//! # Usage
//!
//! The host forwards every raw key event as a [`RawKeyEvent`]; the engine
//! runs it through [`KeyNormalizer::normalize`] and updates its
//! [`PressedKeys`]:
//!
//! ```ignore
//! use horizon_keyscope::keyboard::{KeyNormalizer, NormalizedKey, RawKeyEvent};
//! use horizon_keyscope::{KeyModifiers, Platform};
//!
//! let normalizer = KeyNormalizer::new(Platform::MacOs);
//!
//! // Option+N produces a tilde dead key on macOS; the normalizer recovers "n".
//! let event = RawKeyEvent::down("Dead", "KeyN").with_modifiers(KeyModifiers { opt: true, ..Default::default() });
//! assert_eq!(normalizer.normalize(&event), Some(NormalizedKey::Key("n".into())));
//! ```

use horizon_keyscope_core::logging::targets;

use crate::config::Platform;
use crate::key::{unshifted_glyph, KeyModifiers, KeyToken, Modifier, SPACE};

/// Whether a raw event is a press or a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    /// The key went down (or auto-repeated).
    Down,
    /// The key was released.
    Up,
}

/// A keyboard event as delivered by the host platform.
///
/// `key` is the logical key value (the produced character or a named key
/// such as `"Escape"` or `"Dead"`); `code` is the physical key position
/// (`"KeyA"`, `"Slash"`, `"ShiftLeft"`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Press or release.
    pub kind: KeyEventKind,
    /// Logical key value.
    pub key: String,
    /// Physical key code.
    pub code: String,
    /// Modifier flags reported with the event.
    pub modifiers: KeyModifiers,
    /// Whether this is an auto-repeat of a held key.
    pub is_repeat: bool,
}

impl RawKeyEvent {
    /// Create a key-down event.
    pub fn down(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Down,
            key: key.into(),
            code: code.into(),
            modifiers: KeyModifiers::NONE,
            is_repeat: false,
        }
    }

    /// Create a key-up event.
    pub fn up(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Up,
            ..Self::down(key, code)
        }
    }

    /// Builder pattern for modifier flags.
    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Builder pattern for the repeat flag.
    pub fn with_repeat(mut self, is_repeat: bool) -> Self {
        self.is_repeat = is_repeat;
        self
    }

    /// Whether this is a key-down event.
    pub fn is_down(&self) -> bool {
        self.kind == KeyEventKind::Down
    }
}

/// The result of normalizing a raw event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedKey {
    /// A modifier key.
    Modifier(Modifier),
    /// A canonical non-modifier key name.
    Key(String),
}

/// Glyphs produced by Option+key on the macOS US layout, mapped back to the
/// key that was pressed.
const MAC_OPTION_GLYPHS: [(char, char); 46] = [
    ('å', 'a'),
    ('∫', 'b'),
    ('ç', 'c'),
    ('∂', 'd'),
    ('´', 'e'),
    ('ƒ', 'f'),
    ('©', 'g'),
    ('˙', 'h'),
    ('ˆ', 'i'),
    ('∆', 'j'),
    ('˚', 'k'),
    ('¬', 'l'),
    ('µ', 'm'),
    ('˜', 'n'),
    ('ø', 'o'),
    ('π', 'p'),
    ('œ', 'q'),
    ('®', 'r'),
    ('ß', 's'),
    ('†', 't'),
    ('¨', 'u'),
    ('√', 'v'),
    ('∑', 'w'),
    ('≈', 'x'),
    ('¥', 'y'),
    ('Ω', 'z'),
    ('¡', '1'),
    ('™', '2'),
    ('£', '3'),
    ('¢', '4'),
    ('∞', '5'),
    ('§', '6'),
    ('¶', '7'),
    ('•', '8'),
    ('ª', '9'),
    ('º', '0'),
    ('–', '-'),
    ('≠', '='),
    ('“', '['),
    ('‘', ']'),
    ('«', '\\'),
    ('…', ';'),
    ('æ', '\''),
    ('≤', ','),
    ('≥', '.'),
    ('÷', '/'),
];

/// Map an Option glyph back to its base key.
pub fn mac_option_base(glyph: char) -> Option<char> {
    MAC_OPTION_GLYPHS
        .iter()
        .find(|(g, _)| *g == glyph)
        .map(|(_, base)| *base)
}

/// Recover a base key from a physical key code (`"KeyN"` -> `"n"`).
fn base_from_code(code: &str) -> Option<String> {
    if let Some(letter) = code.strip_prefix("Key") {
        if letter.len() == 1 {
            return Some(letter.to_ascii_lowercase());
        }
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        if digit.len() == 1 {
            return Some(digit.to_string());
        }
    }
    let punctuation = match code {
        "Minus" => "-",
        "Equal" => "=",
        "BracketLeft" => "[",
        "BracketRight" => "]",
        "Backslash" => "\\",
        "Semicolon" => ";",
        "Quote" => "'",
        "Comma" => ",",
        "Period" => ".",
        "Slash" => "/",
        "Backquote" => "`",
        "Space" => SPACE,
        _ => return None,
    };
    Some(punctuation.to_string())
}

/// Converts raw key events into canonical key names.
#[derive(Clone, Copy, Debug)]
pub struct KeyNormalizer {
    platform: Platform,
}

impl KeyNormalizer {
    /// Create a normalizer for the given platform.
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// The platform this normalizer targets.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Normalize a raw event.
    ///
    /// Returns `None` for keys that must be ignored: unidentified keys and
    /// dead keys produced without Option held.
    pub fn normalize(&self, event: &RawKeyEvent) -> Option<NormalizedKey> {
        if let Some(modifier) = modifier_for_key(&event.key) {
            return Some(NormalizedKey::Modifier(modifier));
        }

        if event.key == " " || event.code == "Space" {
            return Some(NormalizedKey::Key(SPACE.to_string()));
        }

        let option_held = event.modifiers.opt && self.platform == Platform::MacOs;

        if event.key == "Dead" {
            if !option_held {
                tracing::trace!(target: targets::KEYBOARD, code = %event.code, "ignoring dead key");
                return None;
            }
            return base_from_code(&event.code).map(NormalizedKey::Key);
        }

        if event.key.is_empty() || event.key == "Unidentified" {
            return None;
        }

        let mut chars = event.key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            return Some(NormalizedKey::Key(event.key.to_ascii_lowercase()));
        };

        if option_held {
            if let Some(base) = mac_option_base(ch) {
                return Some(NormalizedKey::Key(base.to_string()));
            }
            if !ch.is_ascii() {
                if let Some(base) = base_from_code(&event.code) {
                    return Some(NormalizedKey::Key(base));
                }
            }
        }

        if event.modifiers.shift {
            if let Some(base) = unshifted_glyph(ch) {
                return Some(NormalizedKey::Key(base.to_string()));
            }
        }

        Some(NormalizedKey::Key(ch.to_lowercase().collect()))
    }

    /// Normalize an event into a full token using only the event's own
    /// modifier flags. Modifier keys yield modifier-only tokens.
    pub fn normalize_token(&self, event: &RawKeyEvent) -> Option<KeyToken> {
        let mut modifiers = event.modifiers;
        match self.normalize(event)? {
            NormalizedKey::Modifier(modifier) => {
                modifiers.set(modifier, true);
                Some(KeyToken::modifiers_only(modifiers))
            }
            NormalizedKey::Key(key) => Some(KeyToken::new(modifiers, key)),
        }
    }
}

fn modifier_for_key(key: &str) -> Option<Modifier> {
    match key {
        "Control" => Some(Modifier::Ctrl),
        "Alt" | "AltGraph" | "Option" => Some(Modifier::Opt),
        "Shift" => Some(Modifier::Shift),
        "Meta" | "OS" | "Super" | "Command" => Some(Modifier::Cmd),
        _ => None,
    }
}

// =============================================================================
// Pressed Keys
// =============================================================================

/// The set of keys currently held.
///
/// Modifiers are tracked separately from base keys. Releasing any modifier
/// clears the whole set, because the platform may swallow key-up events
/// while an OS-level shortcut (such as Cmd+Tab) is in progress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PressedKeys {
    modifiers: KeyModifiers,
    keys: Vec<String>,
}

impl PressedKeys {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a modifier press.
    pub fn press_modifier(&mut self, modifier: Modifier) {
        self.modifiers.set(modifier, true);
    }

    /// Record a modifier release. Clears every held key.
    pub fn release_modifier(&mut self, modifier: Modifier) {
        tracing::trace!(target: targets::KEYBOARD, %modifier, "modifier released, clearing pressed keys");
        self.clear();
    }

    /// Record a base key press.
    pub fn press_key(&mut self, key: &str) {
        if !self.keys.iter().any(|k| k == key) {
            self.keys.push(key.to_string());
        }
    }

    /// Record a base key release.
    pub fn release_key(&mut self, key: &str) {
        self.keys.retain(|k| k != key);
    }

    /// Reconcile held modifiers with the flags reported by an event.
    pub fn sync_modifiers(&mut self, modifiers: KeyModifiers) {
        self.modifiers = modifiers;
    }

    /// Forget every held key.
    pub fn clear(&mut self) {
        self.modifiers = KeyModifiers::NONE;
        self.keys.clear();
    }

    /// The currently held modifiers.
    pub fn modifiers(&self) -> KeyModifiers {
        self.modifiers
    }

    /// The currently held base keys, in press order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Whether any modifier is held.
    pub fn has_modifiers(&self) -> bool {
        !self.modifiers.is_empty()
    }

    /// Whether nothing at all is held.
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.keys.is_empty()
    }

    /// Whether a token segment (modifier name or base key) is held.
    pub fn is_held(&self, segment: &str) -> bool {
        match Modifier::from_name(segment) {
            Some(modifier) => self.modifiers.contains(modifier),
            None => self.keys.iter().any(|k| k == segment),
        }
    }

    /// Build the pressed-keys token: held modifiers plus `key`.
    pub fn token_with(&self, key: Option<&str>) -> KeyToken {
        match key {
            Some(key) => KeyToken::new(self.modifiers, key),
            None => KeyToken::modifiers_only(self.modifiers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac() -> KeyNormalizer {
        KeyNormalizer::new(Platform::MacOs)
    }

    fn other() -> KeyNormalizer {
        KeyNormalizer::new(Platform::Other)
    }

    fn key(name: &str) -> Option<NormalizedKey> {
        Some(NormalizedKey::Key(name.to_string()))
    }

    const OPT: KeyModifiers = KeyModifiers {
        ctrl: false,
        opt: true,
        shift: false,
        cmd: false,
    };

    // =========================================================================
    // Normalization Tests
    // =========================================================================

    #[test]
    fn test_space_has_literal_token() {
        assert_eq!(other().normalize(&RawKeyEvent::down(" ", "Space")), key("space"));
    }

    #[test]
    fn test_letters_are_lowercased() {
        let event = RawKeyEvent::down("K", "KeyK").with_modifiers(KeyModifiers::SHIFT);
        assert_eq!(other().normalize(&event), key("k"));
    }

    #[test]
    fn test_named_keys_are_lowercased() {
        assert_eq!(other().normalize(&RawKeyEvent::down("Escape", "Escape")), key("escape"));
        assert_eq!(other().normalize(&RawKeyEvent::down("ArrowUp", "ArrowUp")), key("arrowup"));
    }

    #[test]
    fn test_modifiers_are_recognized() {
        assert_eq!(
            other().normalize(&RawKeyEvent::down("Meta", "MetaLeft")),
            Some(NormalizedKey::Modifier(Modifier::Cmd))
        );
        assert_eq!(
            other().normalize(&RawKeyEvent::down("Alt", "AltLeft")),
            Some(NormalizedKey::Modifier(Modifier::Opt))
        );
    }

    #[test]
    fn test_shifted_punctuation_maps_to_base() {
        let event = RawKeyEvent::down("?", "Slash").with_modifiers(KeyModifiers::SHIFT);
        assert_eq!(other().normalize(&event), key("/"));
    }

    #[test]
    fn test_mac_option_glyph_maps_to_letter() {
        let event = RawKeyEvent::down("ø", "KeyO").with_modifiers(OPT);
        assert_eq!(mac().normalize(&event), key("o"));
    }

    #[test]
    fn test_option_glyph_ignored_without_option() {
        let event = RawKeyEvent::down("ø", "KeyO");
        assert_eq!(mac().normalize(&event), key("ø"));
    }

    #[test]
    fn test_option_glyph_table_not_used_off_mac() {
        let event = RawKeyEvent::down("ø", "KeyO").with_modifiers(OPT);
        assert_eq!(other().normalize(&event), key("ø"));
    }

    #[test]
    fn test_dead_key_with_option_recovers_base() {
        let event = RawKeyEvent::down("Dead", "KeyN").with_modifiers(OPT);
        assert_eq!(mac().normalize(&event), key("n"));
    }

    #[test]
    fn test_dead_key_without_option_is_ignored() {
        assert_eq!(mac().normalize(&RawKeyEvent::down("Dead", "KeyE")), None);
        assert_eq!(other().normalize(&RawKeyEvent::down("Dead", "Quote")), None);
    }

    #[test]
    fn test_unidentified_is_ignored() {
        assert_eq!(other().normalize(&RawKeyEvent::down("Unidentified", "")), None);
    }

    #[test]
    fn test_normalize_token_uses_event_modifiers() {
        let event = RawKeyEvent::down("s", "KeyS").with_modifiers(KeyModifiers::CMD);
        assert_eq!(other().normalize_token(&event).unwrap().to_string(), "cmd+s");

        let shift = RawKeyEvent::down("Shift", "ShiftLeft");
        assert_eq!(other().normalize_token(&shift).unwrap().to_string(), "shift");
        assert!(other().normalize_token(&RawKeyEvent::down("Unidentified", "")).is_none());
    }

    // =========================================================================
    // Pressed Keys Tests
    // =========================================================================

    #[test]
    fn test_release_modifier_clears_everything() {
        let mut pressed = PressedKeys::new();
        pressed.press_modifier(Modifier::Cmd);
        pressed.press_modifier(Modifier::Shift);
        pressed.press_key("k");

        pressed.release_modifier(Modifier::Shift);
        assert!(pressed.is_empty());
    }

    #[test]
    fn test_token_uses_fixed_modifier_order() {
        let mut pressed = PressedKeys::new();
        pressed.press_modifier(Modifier::Cmd);
        pressed.press_modifier(Modifier::Ctrl);
        pressed.press_modifier(Modifier::Shift);
        assert_eq!(pressed.token_with(Some("k")).to_string(), "ctrl+shift+cmd+k");
        assert_eq!(pressed.token_with(None).to_string(), "ctrl+shift+cmd");
    }

    #[test]
    fn test_is_held() {
        let mut pressed = PressedKeys::new();
        pressed.press_modifier(Modifier::Opt);
        pressed.press_key("j");
        assert!(pressed.is_held("opt"));
        assert!(pressed.is_held("j"));
        assert!(!pressed.is_held("k"));

        pressed.release_key("j");
        assert!(!pressed.is_held("j"));
        assert!(pressed.has_modifiers());
    }
}
