//! Engine configuration.

/// Keyboard platform family.
///
/// Only macOS needs special handling: Option+key produces alternate glyphs
/// that must be mapped back to the pressed key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    /// macOS keyboard layouts.
    MacOs,
    /// Every other platform.
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

/// Configuration for a [`HotkeyEngine`](crate::HotkeyEngine).
///
/// # Example
///
/// ```ignore
/// use horizon_keyscope::{EngineConfig, HotkeyEngine, Platform};
///
/// let engine = HotkeyEngine::new(
///     EngineConfig::new()
///         .with_platform(Platform::MacOs)
///         .with_conflict_logging(false),
/// );
/// ```
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Keyboard platform used for normalization.
    pub platform: Platform,
    /// Clear the pressed-key set when the window regains focus.
    pub clear_on_window_focus: bool,
    /// Log overwritten hotkeys and divergent command tokens.
    pub log_conflicts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            clear_on_window_focus: true,
            log_conflicts: true,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern for the platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Builder pattern for clearing keys on window focus.
    pub fn with_clear_on_window_focus(mut self, clear: bool) -> Self {
        self.clear_on_window_focus = clear;
        self
    }

    /// Builder pattern for conflict logging.
    pub fn with_conflict_logging(mut self, enabled: bool) -> Self {
        self.log_conflicts = enabled;
        self
    }
}
