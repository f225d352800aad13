// logsieve - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

use crate::core::category::Level;

// =============================================================================
// Crate metadata
// =============================================================================

/// Crate display name.
pub const CRATE_NAME: &str = "logsieve";

/// Identifier used for config/data directories.
pub const CRATE_ID: &str = "logsieve";

/// Current crate version.
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Category defaults
// =============================================================================

/// The level a category falls back to when no enabled filter matches it.
///
/// Recomputation resets every category to this level before replaying the
/// filter set, so the effective level is always derivable from the filters
/// alone.
pub const DEFAULT_LEVEL: Level = Level::Warning;

// =============================================================================
// Filter limits
// =============================================================================

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_PATTERN_LENGTH: usize = 4_096;

/// Maximum number of filters a single manager will hold.
/// Prevents a runaway script from growing the rule set without bound.
pub const MAX_FILTERS: usize = 10_000;

// =============================================================================
// Persistence
// =============================================================================

/// Schema version written into saved filter documents.
///
/// Increment whenever the on-disk shape of `FilterConfig` changes in a
/// breaking way. Documents with a *newer* version are rejected atomically
/// before any live filter state is touched.
pub const CONFIG_VERSION: u32 = 1;

/// Filter configuration file name (stored in the platform config directory).
pub const CONFIG_FILE_NAME: &str = "filters.json";

/// Maximum size of a filter configuration file in bytes.
pub const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024; // 1 MB

// =============================================================================
// Logging
// =============================================================================

/// Default log level for the tracing init helper.
pub const DEFAULT_LOG_LEVEL: &str = "info";
