// logsieve - core/category.rs
//
// Named diagnostic categories with an atomically mutable severity
// threshold. A category's `enabled` check is the hot path on every
// logging call site, so it is a single relaxed atomic load with no lock.
// Core layer: pure data, no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// =============================================================================
// Level
// =============================================================================

/// Severity levels, ordered from least to most severe.
///
/// A category "allows" a message when the message's level is at or above
/// the category's current threshold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    #[default]
    Warning,
    Error,
}

impl Level {
    /// Returns all variants in ascending severity order.
    pub fn all() -> &'static [Level] {
        &[
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Warning,
            Level::Error,
        ]
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Trace => "Trace",
            Level::Debug => "Debug",
            Level::Info => "Info",
            Level::Warning => "Warning",
            Level::Error => "Error",
        }
    }

    fn from_u8(value: u8) -> Level {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warning,
            _ => Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A level string did not name a known level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError {
    pub input: String,
}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not a level (expected one of trace, debug, info, warning, error)",
            self.input
        )
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Case-insensitive symbolic name lookup, for CLI-facing surfaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::all()
            .iter()
            .find(|level| level.label().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ParseLevelError {
                input: s.to_string(),
            })
    }
}

// =============================================================================
// Category
// =============================================================================

/// A named diagnostic channel with a mutable severity threshold.
///
/// Identity is the `(owner, name)` pair; uniqueness is a convention, not
/// enforced. Categories are created through
/// [`CategoryRegistry::register`](crate::core::registry::CategoryRegistry::register)
/// and shared as `Arc<Category>` so filter state and in-flight registry
/// events can outlive any single holder.
#[derive(Debug)]
pub struct Category {
    owner: String,
    name: String,
    allowed: AtomicU8,
}

impl Category {
    pub(crate) fn new(owner: &str, name: &str, allowed: Level) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            allowed: AtomicU8::new(allowed as u8),
        }
    }

    /// The component that owns this category.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current severity threshold.
    pub fn allowed(&self) -> Level {
        Level::from_u8(self.allowed.load(Ordering::Relaxed))
    }

    /// Whether a message at `level` passes this category's threshold.
    ///
    /// The fast path for logging call sites: one relaxed load, no lock.
    pub fn enabled(&self, level: Level) -> bool {
        self.allowed.load(Ordering::Relaxed) <= level as u8
    }

    /// Store a new threshold. Returns the previous one.
    ///
    /// Crate-internal: external writers go through
    /// `CategoryRegistry::set_level` so a `Modified` event is emitted.
    pub(crate) fn store_allowed(&self, level: Level) -> Level {
        Level::from_u8(self.allowed.swap(level as u8, Ordering::Relaxed))
    }
}

// =============================================================================
// Registry events
// =============================================================================

/// What happened to a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryEventKind {
    Added,
    Removed,
    Modified,
}

/// Event payload carried by the registry's signal.
#[derive(Debug, Clone)]
pub struct CategoryEvent {
    pub kind: CategoryEventKind,
    pub category: Arc<Category>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_respects_threshold() {
        let cat = Category::new("core", "render", Level::Warning);
        assert!(!cat.enabled(Level::Trace));
        assert!(!cat.enabled(Level::Info));
        assert!(cat.enabled(Level::Warning));
        assert!(cat.enabled(Level::Error));

        cat.store_allowed(Level::Trace);
        assert!(cat.enabled(Level::Trace));
    }

    #[test]
    fn test_store_allowed_returns_previous() {
        let cat = Category::new("core", "render", Level::Warning);
        assert_eq!(cat.store_allowed(Level::Error), Level::Warning);
        assert_eq!(cat.allowed(), Level::Error);
    }

    #[test]
    fn test_level_from_str_case_insensitive() {
        assert_eq!("error".parse::<Level>().unwrap(), Level::Error);
        assert_eq!("TRACE".parse::<Level>().unwrap(), Level::Trace);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warning);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_serialises_symbolically() {
        let json = serde_json::to_string(&Level::Info).unwrap();
        assert_eq!(json, "\"info\"");
        let level: Level = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(level, Level::Error);
    }

    #[test]
    fn test_level_ordering_ascends_with_severity() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Warning < Level::Error);
    }
}
