//! Canonical key tokens.
//!
//! A [`KeyToken`] is zero or more modifiers plus at most one base key. Its
//! string form always lists modifiers in the fixed order
//! `ctrl`, `opt`, `shift`, `cmd`, with the base key last:
//!
//! ```ignore
//! use horizon_keyscope::KeyToken;
//!
//! let token: KeyToken = "Shift+Cmd+K".parse().unwrap();
//! assert_eq!(token.to_string(), "shift+cmd+k");
//!
//! // Shifted punctuation is stored as shift + the unshifted glyph.
//! let help: KeyToken = "?".parse().unwrap();
//! assert_eq!(help.to_string(), "shift+/");
//! assert_eq!(help.pretty(), "?");
//! ```

use std::fmt;
use std::str::FromStr;

use horizon_keyscope_core::KeyTokenParseError;

// =============================================================================
// Modifiers
// =============================================================================

/// A modifier key, ordered by serialization priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    /// Control.
    Ctrl,
    /// Alt / Option.
    Opt,
    /// Shift.
    Shift,
    /// Meta / Command / Super.
    Cmd,
}

impl Modifier {
    /// All modifiers in serialization order.
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Opt, Modifier::Shift, Modifier::Cmd];

    /// The token segment for this modifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ctrl => "ctrl",
            Self::Opt => "opt",
            Self::Shift => "shift",
            Self::Cmd => "cmd",
        }
    }

    /// Parse a modifier name, accepting common aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Self::Ctrl),
            "opt" | "alt" | "option" => Some(Self::Opt),
            "shift" => Some(Self::Shift),
            "cmd" | "meta" | "command" | "super" | "win" => Some(Self::Cmd),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of modifiers held for a key token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyModifiers {
    /// Control is held.
    pub ctrl: bool,
    /// Alt / Option is held.
    pub opt: bool,
    /// Shift is held.
    pub shift: bool,
    /// Meta / Command is held.
    pub cmd: bool,
}

impl KeyModifiers {
    /// No modifiers.
    pub const NONE: Self = Self {
        ctrl: false,
        opt: false,
        shift: false,
        cmd: false,
    };

    /// Shift only.
    pub const SHIFT: Self = Self {
        ctrl: false,
        opt: false,
        shift: true,
        cmd: false,
    };

    /// Command only.
    pub const CMD: Self = Self {
        ctrl: false,
        opt: false,
        shift: false,
        cmd: true,
    };

    /// Control only.
    pub const CTRL: Self = Self {
        ctrl: true,
        opt: false,
        shift: false,
        cmd: false,
    };

    /// Whether a given modifier is set.
    pub fn contains(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Opt => self.opt,
            Modifier::Shift => self.shift,
            Modifier::Cmd => self.cmd,
        }
    }

    /// Set or clear a modifier.
    pub fn set(&mut self, modifier: Modifier, held: bool) {
        match modifier {
            Modifier::Ctrl => self.ctrl = held,
            Modifier::Opt => self.opt = held,
            Modifier::Shift => self.shift = held,
            Modifier::Cmd => self.cmd = held,
        }
    }

    /// Return a copy with `modifier` set.
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.set(modifier, true);
        self
    }

    /// Whether no modifier is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Iterate the set modifiers in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

// =============================================================================
// Punctuation Tables
// =============================================================================

/// Unshifted punctuation paired with the glyph produced when shift is held
/// (US layout).
const SHIFTED_PUNCTUATION: [(char, char); 21] = [
    ('1', '!'),
    ('2', '@'),
    ('3', '#'),
    ('4', '$'),
    ('5', '%'),
    ('6', '^'),
    ('7', '&'),
    ('8', '*'),
    ('9', '('),
    ('0', ')'),
    ('-', '_'),
    ('=', '+'),
    ('[', '{'),
    (']', '}'),
    ('\\', '|'),
    (';', ':'),
    ('\'', '"'),
    (',', '<'),
    ('.', '>'),
    ('/', '?'),
    ('`', '~'),
];

/// Map a shifted glyph (`?`) to its unshifted key (`/`).
pub fn unshifted_glyph(shifted: char) -> Option<char> {
    SHIFTED_PUNCTUATION
        .iter()
        .find(|(_, s)| *s == shifted)
        .map(|(base, _)| *base)
}

/// Map an unshifted punctuation key (`/`) to its shifted glyph (`?`).
///
/// Digits are excluded: `shift+1` displays as written.
pub fn shifted_glyph(base: char) -> Option<char> {
    if base.is_ascii_digit() {
        return None;
    }
    SHIFTED_PUNCTUATION
        .iter()
        .find(|(b, _)| *b == base)
        .map(|(_, shifted)| *shifted)
}

/// Literal token used for the space bar.
pub const SPACE: &str = "space";

/// Canonicalize a single base-key name.
///
/// Returns the key name and whether it implies shift (for shifted glyphs).
fn canonical_key(segment: &str) -> (String, bool) {
    if segment == " " {
        return (SPACE.to_string(), false);
    }

    let mut chars = segment.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if let Some(base) = unshifted_glyph(ch) {
            return (base.to_string(), true);
        }
        return (ch.to_lowercase().collect(), false);
    }

    let lower = segment.to_ascii_lowercase();
    let name = match lower.as_str() {
        "esc" => "escape",
        "spacebar" => SPACE,
        "return" => "enter",
        "del" => "delete",
        "up" => "arrowup",
        "down" => "arrowdown",
        "left" => "arrowleft",
        "right" => "arrowright",
        "pgup" => "pageup",
        "pgdn" => "pagedown",
        "plus" => return ("=".to_string(), true),
        "minus" => "-",
        "slash" => "/",
        "comma" => ",",
        "period" => ".",
        other => other,
    };
    (name.to_string(), false)
}

// =============================================================================
// Key Token
// =============================================================================

/// A canonical hotkey: modifiers plus at most one base key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyToken {
    modifiers: KeyModifiers,
    key: Option<String>,
}

impl KeyToken {
    /// Create a token from modifiers and a base key name.
    ///
    /// The key is canonicalized the same way parsing does.
    pub fn new(modifiers: KeyModifiers, key: impl AsRef<str>) -> Self {
        let (key, implies_shift) = canonical_key(key.as_ref());
        let mut modifiers = modifiers;
        if implies_shift {
            modifiers.shift = true;
        }
        Self {
            modifiers,
            key: Some(key),
        }
    }

    /// Create a token with no modifiers.
    pub fn key_only(key: impl AsRef<str>) -> Self {
        Self::new(KeyModifiers::NONE, key)
    }

    /// Create a modifier-only token (a chord of held modifiers).
    pub fn modifiers_only(modifiers: KeyModifiers) -> Self {
        Self {
            modifiers,
            key: None,
        }
    }

    /// The modifiers of this token.
    pub fn modifiers(&self) -> KeyModifiers {
        self.modifiers
    }

    /// The base key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether the token contains a non-modifier key.
    pub fn has_base_key(&self) -> bool {
        self.key.is_some()
    }

    /// The last segment of the serialized token.
    ///
    /// This is the base key, or the last modifier for modifier-only chords.
    pub fn last_segment(&self) -> Option<&str> {
        match &self.key {
            Some(key) => Some(key.as_str()),
            None => self.modifiers.iter().last().map(Modifier::as_str),
        }
    }

    /// Display form: shifted punctuation as its glyph and `escape` as `esc`.
    pub fn pretty(&self) -> String {
        let mut modifiers = self.modifiers;
        let key = self.key.as_deref().map(|key| {
            let mut chars = key.chars();
            if let (Some(ch), None) = (chars.next(), chars.next()) {
                if modifiers.shift {
                    if let Some(glyph) = shifted_glyph(ch) {
                        modifiers.shift = false;
                        return glyph.to_string();
                    }
                }
            }
            match key {
                "escape" => "esc".to_string(),
                other => other.to_string(),
            }
        });

        let mut parts: Vec<String> = modifiers.iter().map(|m| m.as_str().to_string()).collect();
        parts.extend(key);
        parts.join("+")
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for modifier in self.modifiers.iter() {
            if !first {
                f.write_str("+")?;
            }
            f.write_str(modifier.as_str())?;
            first = false;
        }
        if let Some(key) = &self.key {
            if !first {
                f.write_str("+")?;
            }
            f.write_str(key)?;
        }
        Ok(())
    }
}

impl FromStr for KeyToken {
    type Err = KeyTokenParseError;

    /// Parse a token like `"Cmd+Shift+K"`, `"?"` or `"ctrl+space"`.
    ///
    /// Modifier names are case-insensitive and may use aliases
    /// (`control`, `alt`, `option`, `meta`, `command`, `super`). A literal
    /// `+` key is written as a trailing `+` (`"cmd++"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyTokenParseError::Empty);
        }
        if s == " " {
            return Ok(Self::key_only(SPACE));
        }
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(KeyTokenParseError::Empty);
        }

        let (body, plus_key) = match trimmed.strip_suffix("++") {
            Some(rest) => (rest, true),
            None if trimmed == "+" => ("", true),
            None => (trimmed, false),
        };

        let mut modifiers = KeyModifiers::NONE;
        let mut key: Option<String> = if plus_key {
            modifiers.shift = true;
            Some("=".to_string())
        } else {
            None
        };

        if !body.is_empty() {
            for segment in body.split('+') {
                let segment = segment.trim();
                if segment.is_empty() {
                    return Err(KeyTokenParseError::EmptySegment(s.to_string()));
                }
                if let Some(modifier) = Modifier::from_name(segment) {
                    modifiers.set(modifier, true);
                    continue;
                }
                if key.is_some() {
                    return Err(KeyTokenParseError::MultipleKeys(s.to_string()));
                }
                let (name, implies_shift) = canonical_key(segment);
                if implies_shift {
                    modifiers.shift = true;
                }
                key = Some(name);
            }
        }

        Ok(Self { modifiers, key })
    }
}

/// Anything that can be turned into a list of key tokens.
///
/// Single tokens become one-element lists so commands always store a list.
pub trait IntoKeyTokens {
    /// Convert into a list of tokens.
    fn into_key_tokens(self) -> Result<Vec<KeyToken>, KeyTokenParseError>;
}

impl IntoKeyTokens for KeyToken {
    fn into_key_tokens(self) -> Result<Vec<KeyToken>, KeyTokenParseError> {
        Ok(vec![self])
    }
}

impl IntoKeyTokens for Vec<KeyToken> {
    fn into_key_tokens(self) -> Result<Vec<KeyToken>, KeyTokenParseError> {
        Ok(self)
    }
}

impl IntoKeyTokens for &str {
    fn into_key_tokens(self) -> Result<Vec<KeyToken>, KeyTokenParseError> {
        Ok(vec![self.parse()?])
    }
}

impl<const N: usize> IntoKeyTokens for [&str; N] {
    fn into_key_tokens(self) -> Result<Vec<KeyToken>, KeyTokenParseError> {
        self.into_iter().map(str::parse).collect()
    }
}

impl IntoKeyTokens for &[&str] {
    fn into_key_tokens(self) -> Result<Vec<KeyToken>, KeyTokenParseError> {
        self.iter().map(|s| s.parse()).collect()
    }
}
