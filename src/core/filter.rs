// logsieve - core/filter.rs
//
// A single filtering rule: a severity level plus a pattern pair matched
// against a category's name and owner. Filters are stored and sequenced
// by the FilterManager; this module only knows how one rule matches and
// mutates one category.
// Core layer: pure logic, no I/O.

use crate::core::category::{Category, Level};
use crate::util::constants;
use crate::util::error::FilterError;
use regex::Regex;

// =============================================================================
// Pattern
// =============================================================================

/// A filter pattern: the text as the user wrote it plus the compiled
/// matcher. Matching is an unanchored regex search, so `render` matches
/// both `render` and `render3d`.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `text`, enforcing the length cap before handing it to the
    /// regex engine.
    pub fn compile(text: &str) -> Result<Pattern, FilterError> {
        if text.len() > constants::MAX_PATTERN_LENGTH {
            return Err(FilterError::PatternTooLong {
                length: text.len(),
                max: constants::MAX_PATTERN_LENGTH,
            });
        }
        let regex = Regex::new(text).map_err(|e| FilterError::InvalidPattern {
            pattern: text.to_string(),
            source: e,
        })?;
        Ok(Pattern {
            text: text.to_string(),
            regex,
        })
    }

    /// The pattern text as originally written (what gets persisted).
    pub fn text(&self) -> &str {
        &self.text
    }

    fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A pattern-matching rule assigning a severity level to matching
/// categories.
///
/// `level` is immutable after creation — changing the level of a rule
/// means creating a new rule, which also gives it a new (higher) id and
/// therefore higher priority. `match_count` is derived bookkeeping: it is
/// never persisted and is re-derived from live categories whenever the
/// manager recomputes.
#[derive(Debug, Clone)]
pub struct Filter {
    level: Level,
    category_pattern: Pattern,
    owner_pattern: Pattern,
    enabled: bool,
    persistent: bool,
    match_count: usize,
}

impl Filter {
    pub(crate) fn new(
        level: Level,
        category_pattern: Pattern,
        owner_pattern: Pattern,
        persistent: bool,
        enabled: bool,
    ) -> Self {
        Self {
            level,
            category_pattern,
            owner_pattern,
            enabled,
            persistent,
            match_count: 0,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn category_pattern(&self) -> &str {
        self.category_pattern.text()
    }

    pub fn owner_pattern(&self) -> &str {
        self.owner_pattern.text()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// Number of live categories this filter currently matches.
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub(crate) fn set_match_count(&mut self, count: usize) {
        self.match_count = count;
    }

    /// Whether this rule applies to `category`: the rule must be enabled
    /// and both patterns must match (logical AND).
    pub fn matches(&self, category: &Category) -> bool {
        self.enabled
            && self.category_pattern.is_match(category.name())
            && self.owner_pattern.is_match(category.owner())
    }

    /// Apply the rule to `category` if it matches, counting the match.
    /// Used when the rule and category pair is seen for the first time
    /// (filter creation, category registration).
    pub(crate) fn apply(&mut self, category: &Category) -> bool {
        if !self.reapply(category) {
            return false;
        }
        self.match_count += 1;
        true
    }

    /// Apply the rule to `category` if it matches, without touching the
    /// match count. Used when replaying the rule set during recomputation.
    pub(crate) fn reapply(&self, category: &Category) -> bool {
        if !self.matches(category) {
            return false;
        }
        tracing::trace!(
            owner = category.owner(),
            category = category.name(),
            owner_pattern = self.owner_pattern.text(),
            category_pattern = self.category_pattern.text(),
            level = %self.level,
            "Filter applied"
        );
        category.store_allowed(self.level);
        true
    }

    /// Drop `category` from the match count if the rule matches it.
    /// Bookkeeping only — restoring the category's level is the manager's
    /// recomputation's job.
    pub(crate) fn remove(&mut self, category: &Category) -> bool {
        if !self.matches(category) {
            return false;
        }
        self.match_count = self.match_count.saturating_sub(1);
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
