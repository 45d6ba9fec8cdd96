//! Logging and debugging facilities for Horizon Keyscope.
//!
//! This module provides:
//! - Target names so each subsystem can be filtered with `tracing` directives
//! - Wrapper macros with consistent target naming
//! - Tree rendering helpers used by the scope tree debug view
//! - Performance spans for timing keyboard dispatch
//!
//! # Tracing Integration
//!
//! Horizon Keyscope never installs a subscriber. To see logs, install one in
//! the application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_keyscope::dispatch=trace")
//!     .init();
//! ```

/// Span names used throughout Horizon Keyscope for tracing.
pub mod span_names {
    /// Processing of one keyboard event.
    pub const DISPATCH: &str = "horizon_keyscope::dispatch";
    /// Scope removal, including descendants.
    pub const REMOVE_SCOPE: &str = "horizon_keyscope::remove_scope";
}

/// Target names for log filtering.
pub mod targets {
    /// Root target of the engine crate.
    pub const ENGINE: &str = "horizon_keyscope";
    /// Scope tree maintenance.
    pub const SCOPE: &str = "horizon_keyscope::scope";
    /// Command registration and the token index.
    pub const COMMAND: &str = "horizon_keyscope::command";
    /// Active scope changes and branch repair.
    pub const ACTIVATION: &str = "horizon_keyscope::activation";
    /// Hotkey dispatch.
    pub const DISPATCH: &str = "horizon_keyscope::dispatch";
    /// Key normalization and pressed-key bookkeeping.
    pub const KEYBOARD: &str = "horizon_keyscope::keyboard";
    /// Keypress subscriber notification.
    pub const SIGNAL: &str = "horizon_keyscope_core::signal";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show the kind of each node.
    pub show_kinds: bool,
    /// Whether to list the bindings registered on each node.
    pub show_bindings: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_kinds: true,
            show_bindings: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_bindings: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_kinds: false,
            show_bindings: false,
            ..Default::default()
        }
    }

    /// Build the prefix string for a tree node at `depth`.
    pub fn node_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = self.indent(depth - 1, branch);
        prefix.push_str(if is_last { last } else { corner });
        prefix
    }

    /// Build the prefix for detail lines printed under a node.
    pub fn detail_prefix(&self, depth: usize) -> String {
        let branch = match self.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };
        self.indent(depth, branch)
    }

    fn indent(&self, levels: usize, branch: &str) -> String {
        let mut prefix = String::new();
        for _ in 0..levels {
            prefix.push_str(branch);
            for _ in 0..self.indent_size {
                prefix.push(' ');
            }
        }
        prefix
    }
}

/// Keeps a `horizon_keyscope::perf` span entered until dropped, so a
/// subscriber with span timing reports how long each dispatch took.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a span named after `name`, one of the [`span_names`].
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: "horizon_keyscope::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Log at `trace` under `targets::ENGINE`, for engine-wide events that
/// belong to no single subsystem.
#[macro_export]
macro_rules! keyscope_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: $crate::logging::targets::ENGINE, $($arg)*)
    };
}

/// Log at `debug` under `targets::ENGINE`.
#[macro_export]
macro_rules! keyscope_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: $crate::logging::targets::ENGINE, $($arg)*)
    };
}
