// logsieve - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation. All errors preserve the causal
// chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all logsieve operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum SieveError {
    /// Filter creation or lookup failed.
    Filter(FilterError),

    /// Loading or saving the persisted filter document failed.
    Store(StoreError),
}

impl fmt::Display for SieveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(e) => write!(f, "Filter error: {e}"),
            Self::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for SieveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Filter(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

/// Errors related to filter creation and id-based operations.
#[derive(Debug)]
pub enum FilterError {
    /// A filter pattern failed to compile.
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// A filter pattern exceeds the maximum allowed length.
    PatternTooLong { length: usize, max: usize },

    /// An enable/disable/remove operation referenced a nonexistent filter id.
    UnknownId { id: u64 },

    /// The manager already holds the maximum number of filters.
    TooManyFilters { count: usize, max: usize },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern { pattern, source } => {
                write!(f, "Invalid filter pattern '{pattern}': {source}")
            }
            Self::PatternTooLong { length, max } => {
                write!(f, "Filter pattern is {length} chars, exceeds maximum of {max}")
            }
            Self::UnknownId { id } => {
                write!(f, "No filter with id {id}")
            }
            Self::TooManyFilters { count, max } => {
                write!(f, "Too many filters ({count}), maximum is {max}")
            }
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPattern { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<FilterError> for SieveError {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors related to the persisted filter document.
///
/// Every variant is raised *before* live filter state is mutated, so a
/// failed load or save always leaves the in-memory rule set untouched.
#[derive(Debug)]
pub enum StoreError {
    /// The document was written by a newer version of the code.
    VersionTooNew { found: u32, supported: u32 },

    /// The document is not valid JSON or is missing required fields.
    Parse { source: serde_json::Error },

    /// Two records in the document share an id, or a record collides with
    /// an id already live in the manager.
    DuplicateId { id: u64 },

    /// The document exceeds the maximum allowed size.
    FileTooLarge { path: PathBuf, size: u64, max_size: u64 },

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionTooNew { found, supported } => write!(
                f,
                "Saved filter document version ({found}) is newer than the \
                 supported version ({supported})"
            ),
            Self::Parse { source } => {
                write!(f, "Failed to parse filter document: {source}")
            }
            Self::DuplicateId { id } => {
                write!(f, "Duplicate filter id {id} in document")
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Filter document '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse { source } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<StoreError> for SieveError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Convenience type alias for logsieve results.
pub type Result<T> = std::result::Result<T, SieveError>;
