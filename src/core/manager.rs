// logsieve - core/manager.rs
//
// The reactive rule engine: an id-ordered table of filters driven by the
// category registry's event signal. Ascending id is rule priority (the
// most recently created matching rule wins), and every structural change
// to the rule set triggers a deterministic recomputation of all category
// levels. Also owns the persisted document model; actual file I/O lives
// in app::store.
//
// Lock order: registry guard first, then the filter table lock. Registry
// events arrive with the guard already held, so the listener only ever
// takes the table lock. Manager operations enter through
// `CategoryRegistry::with_categories` for the same reason.

use crate::core::category::{Category, CategoryEvent, CategoryEventKind, Level};
use crate::core::filter::{Filter, Pattern};
use crate::core::registry::CategoryRegistry;
use crate::core::signal::SharedConnection;
use crate::util::constants;
use crate::util::error::{FilterError, Result, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// Persistence document model
// =============================================================================

/// On-disk form of the filter table. Only persistent filters are written.
/// `match_count` is derived state and is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub version: u32,
    pub next_id: u64,
    pub filters: Vec<FilterRecord>,
}

/// One persisted filter rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRecord {
    pub id: u64,
    pub level: Level,
    pub category_pattern: String,
    pub owner_pattern: String,
    pub enabled: bool,
}

// =============================================================================
// FilterSnapshot
// =============================================================================

/// Plain-data view of one filter, for listing surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSnapshot {
    pub id: u64,
    pub level: Level,
    pub category_pattern: String,
    pub owner_pattern: String,
    pub enabled: bool,
    pub persistent: bool,
    pub match_count: usize,
}

// =============================================================================
// FilterManager
// =============================================================================

struct FilterTable {
    filters: BTreeMap<u64, Filter>,
    next_id: u64,
}

impl FilterTable {
    fn new() -> Self {
        Self {
            filters: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// The filter rule engine.
///
/// Holds the rule table and a subscription to the registry's category
/// events, so categories registered after a rule was created are still
/// picked up. Composition rule: the highest-id enabled matching filter
/// decides a category's level; a category matched by no filter sits at
/// [`constants::DEFAULT_LEVEL`].
pub struct FilterManager {
    registry: Arc<CategoryRegistry>,
    table: Arc<Mutex<FilterTable>>,
    // Held for its Drop: disconnects the listener when the manager goes.
    _listener: SharedConnection<CategoryEvent>,
}

fn lock_table(table: &Mutex<FilterTable>) -> MutexGuard<'_, FilterTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FilterManager {
    /// Create a manager bound to `registry` and subscribe to its events.
    pub fn new(registry: Arc<CategoryRegistry>) -> Self {
        let table = Arc::new(Mutex::new(FilterTable::new()));
        let listener_table = Arc::clone(&table);
        // Runs with the registry guard held; takes only the table lock.
        let listener = registry.events().connect(move |event: &CategoryEvent| {
            let mut table = lock_table(&listener_table);
            match event.kind {
                CategoryEventKind::Added => {
                    for filter in table.filters.values_mut() {
                        filter.apply(&event.category);
                    }
                }
                CategoryEventKind::Removed => {
                    for filter in table.filters.values_mut() {
                        filter.remove(&event.category);
                    }
                }
                CategoryEventKind::Modified => {}
            }
        });
        Self {
            registry,
            table,
            _listener: listener,
        }
    }

    /// The registry this manager filters.
    pub fn registry(&self) -> &Arc<CategoryRegistry> {
        &self.registry
    }

    /// Create a new rule and apply it to every live category.
    ///
    /// Both patterns are compiled before anything is touched, so an
    /// invalid or oversized pattern creates nothing. The new rule gets
    /// the next id and therefore the highest priority.
    pub fn create(
        &self,
        level: Level,
        category_pattern: &str,
        owner_pattern: &str,
        persistent: bool,
    ) -> Result<u64> {
        let category_pattern = Pattern::compile(category_pattern)?;
        let owner_pattern = Pattern::compile(owner_pattern)?;

        self.registry.with_categories(|categories| {
            let mut table = lock_table(&self.table);
            if table.filters.len() >= constants::MAX_FILTERS {
                return Err(FilterError::TooManyFilters {
                    count: table.filters.len(),
                    max: constants::MAX_FILTERS,
                }
                .into());
            }
            let id = table.next_id;
            table.next_id += 1;

            let mut filter = Filter::new(level, category_pattern, owner_pattern, persistent, true);
            for category in categories {
                filter.apply(category);
            }
            tracing::info!(
                id,
                level = %filter.level(),
                category_pattern = filter.category_pattern(),
                owner_pattern = filter.owner_pattern(),
                persistent,
                matched = filter.match_count(),
                "Created filter"
            );
            table.filters.insert(id, filter);
            Ok(id)
        })
    }

    /// Enable a rule. Returns `Ok(true)` if the rule was disabled and is
    /// now enabled, `Ok(false)` if it was already enabled (no
    /// recomputation happens in that case).
    pub fn enable(&self, id: u64) -> Result<bool> {
        self.set_enabled(id, true)
    }

    /// Disable a rule. Returns `Ok(true)` if the rule was enabled and is
    /// now disabled, `Ok(false)` if it was already disabled.
    pub fn disable(&self, id: u64) -> Result<bool> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: u64, enabled: bool) -> Result<bool> {
        self.registry.with_categories(|categories| {
            let mut table = lock_table(&self.table);
            let filter = table
                .filters
                .get_mut(&id)
                .ok_or(FilterError::UnknownId { id })?;
            if filter.enabled() == enabled {
                return Ok(false);
            }
            filter.set_enabled(enabled);
            tracing::debug!(id, enabled, "Toggled filter");
            recompute(&mut table, categories);
            Ok(true)
        })
    }

    /// Mark a rule as persistent (saved) or transient (skipped by save).
    /// Returns `Ok(true)` if the flag changed. No recomputation needed:
    /// persistence does not affect matching.
    pub fn set_persistent(&self, id: u64, persistent: bool) -> Result<bool> {
        let mut table = lock_table(&self.table);
        let filter = table
            .filters
            .get_mut(&id)
            .ok_or(FilterError::UnknownId { id })?;
        if filter.persistent() == persistent {
            return Ok(false);
        }
        filter.set_persistent(persistent);
        tracing::debug!(id, persistent, "Changed filter persistence");
        Ok(true)
    }

    /// Delete a rule and recompute category levels without it.
    pub fn remove(&self, id: u64) -> Result<()> {
        self.registry.with_categories(|categories| {
            let mut table = lock_table(&self.table);
            if table.filters.remove(&id).is_none() {
                return Err(FilterError::UnknownId { id }.into());
            }
            tracing::debug!(id, "Removed filter");
            recompute(&mut table, categories);
            Ok(())
        })
    }

    /// Snapshot of all rules in ascending id (priority) order.
    pub fn filters(&self) -> Vec<FilterSnapshot> {
        let table = lock_table(&self.table);
        table
            .filters
            .iter()
            .map(|(&id, filter)| FilterSnapshot {
                id,
                level: filter.level(),
                category_pattern: filter.category_pattern().to_string(),
                owner_pattern: filter.owner_pattern().to_string(),
                enabled: filter.enabled(),
                persistent: filter.persistent(),
                match_count: filter.match_count(),
            })
            .collect()
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        lock_table(&self.table).filters.len()
    }

    pub fn is_empty(&self) -> bool {
        lock_table(&self.table).filters.is_empty()
    }

    // =========================================================================
    // Persistence (pure; file I/O lives in app::store)
    // =========================================================================

    /// Serialise the persistent rules to a JSON document.
    pub fn save_to_string(&self) -> Result<String> {
        let table = lock_table(&self.table);
        let config = FilterConfig {
            version: constants::CONFIG_VERSION,
            next_id: table.next_id,
            filters: table
                .filters
                .iter()
                .filter(|(_, filter)| filter.persistent())
                .map(|(&id, filter)| FilterRecord {
                    id,
                    level: filter.level(),
                    category_pattern: filter.category_pattern().to_string(),
                    owner_pattern: filter.owner_pattern().to_string(),
                    enabled: filter.enabled(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| StoreError::Parse { source: e })?;
        Ok(json)
    }

    /// Load rules from a JSON document produced by [`save_to_string`].
    ///
    /// The whole document is validated and staged before any live state
    /// is touched: an unsupported version, an invalid or oversized
    /// pattern, or a duplicate id (within the document or against a live
    /// rule) rejects the document atomically. Loaded rules come back
    /// `persistent` with a zero match count; one recomputation afterwards
    /// primes every live category.
    ///
    /// [`save_to_string`]: FilterManager::save_to_string
    pub fn load_from_str(&self, text: &str) -> Result<()> {
        let config: FilterConfig =
            serde_json::from_str(text).map_err(|e| StoreError::Parse { source: e })?;
        if config.version > constants::CONFIG_VERSION {
            return Err(StoreError::VersionTooNew {
                found: config.version,
                supported: constants::CONFIG_VERSION,
            }
            .into());
        }

        // Stage every record fully before touching the table.
        let mut staged: Vec<(u64, Filter)> = Vec::with_capacity(config.filters.len());
        for record in &config.filters {
            if staged.iter().any(|(id, _)| *id == record.id) {
                return Err(StoreError::DuplicateId { id: record.id }.into());
            }
            let category_pattern = Pattern::compile(&record.category_pattern)?;
            let owner_pattern = Pattern::compile(&record.owner_pattern)?;
            staged.push((
                record.id,
                Filter::new(
                    record.level,
                    category_pattern,
                    owner_pattern,
                    true,
                    record.enabled,
                ),
            ));
        }

        self.registry.with_categories(|categories| {
            let mut table = lock_table(&self.table);
            for (id, _) in &staged {
                if table.filters.contains_key(id) {
                    return Err(StoreError::DuplicateId { id: *id }.into());
                }
            }
            if table.filters.len() + staged.len() > constants::MAX_FILTERS {
                return Err(FilterError::TooManyFilters {
                    count: table.filters.len() + staged.len(),
                    max: constants::MAX_FILTERS,
                }
                .into());
            }

            let mut max_id = 0;
            let loaded = staged.len();
            for (id, filter) in staged {
                max_id = max_id.max(id);
                table.filters.insert(id, filter);
            }
            table.next_id = table.next_id.max(config.next_id).max(max_id + 1);
            recompute(&mut table, categories);
            tracing::info!(loaded, total = table.filters.len(), "Loaded filter document");
            Ok(())
        })
    }
}

/// Reset every category to the default level, then replay all rules in
/// ascending id order so the highest-id enabled match decides each
/// category. Match counts are re-derived from scratch rather than
/// patched incrementally.
fn recompute(table: &mut FilterTable, categories: &[Arc<Category>]) {
    for category in categories {
        category.store_allowed(constants::DEFAULT_LEVEL);
    }
    for filter in table.filters.values_mut() {
        let mut matched = 0;
        for category in categories {
            if filter.reapply(category) {
                matched += 1;
            }
        }
        filter.set_match_count(matched);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::SieveError;

    fn setup() -> (Arc<CategoryRegistry>, FilterManager) {
        let registry = CategoryRegistry::new();
        let manager = FilterManager::new(Arc::clone(&registry));
        (registry, manager)
    }

    #[test]
    fn test_create_applies_to_live_categories() {
        let (registry, manager) = setup();
        let render = registry.register("core", "render", Level::Warning);
        let tick = registry.register("core", "tick", Level::Warning);

        let id = manager.create(Level::Trace, "render", ".", false).unwrap();
        assert_eq!(id, 1);
        assert_eq!(render.allowed(), Level::Trace);
        assert_eq!(tick.allowed(), Level::Warning);

        let snapshot = &manager.filters()[0];
        assert_eq!(snapshot.match_count, 1);
        assert!(snapshot.enabled);
    }

    #[test]
    fn test_higher_id_wins() {
        let (registry, manager) = setup();
        let cat = registry.register("core", "render", Level::Warning);

        manager.create(Level::Error, "render", ".", false).unwrap();
        manager.create(Level::Trace, "render", ".", false).unwrap();
        assert_eq!(cat.allowed(), Level::Trace);
    }

    #[test]
    fn test_disable_falls_back_to_lower_priority_rule() {
        let (registry, manager) = setup();
        let cat = registry.register("core", "render", Level::Warning);

        let low = manager.create(Level::Error, "render", ".", false).unwrap();
        let high = manager.create(Level::Trace, "render", ".", false).unwrap();
        assert_eq!(cat.allowed(), Level::Trace);

        assert!(manager.disable(high).unwrap());
        assert_eq!(cat.allowed(), Level::Error);

        assert!(manager.disable(low).unwrap());
        assert_eq!(cat.allowed(), Level::Warning);

        assert!(manager.enable(high).unwrap());
        assert_eq!(cat.allowed(), Level::Trace);
    }

    #[test]
    fn test_toggle_reports_no_change() {
        let (_registry, manager) = setup();
        let id = manager.create(Level::Trace, ".", ".", false).unwrap();
        assert!(!manager.enable(id).unwrap());
        assert!(manager.disable(id).unwrap());
        assert!(!manager.disable(id).unwrap());
    }

    #[test]
    fn test_remove_restores_default() {
        let (registry, manager) = setup();
        let cat = registry.register("core", "render", Level::Warning);

        let id = manager.create(Level::Debug, "render", ".", false).unwrap();
        assert_eq!(cat.allowed(), Level::Debug);

        manager.remove(id).unwrap();
        assert_eq!(cat.allowed(), Level::Warning);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_set_persistent_changes_what_is_saved() {
        let (_registry, manager) = setup();
        let id = manager.create(Level::Trace, "render", ".", false).unwrap();

        assert!(manager.set_persistent(id, true).unwrap());
        assert!(!manager.set_persistent(id, true).unwrap());
        let config: FilterConfig =
            serde_json::from_str(&manager.save_to_string().unwrap()).unwrap();
        assert_eq!(config.filters.len(), 1);

        assert!(manager.set_persistent(id, false).unwrap());
        let config: FilterConfig =
            serde_json::from_str(&manager.save_to_string().unwrap()).unwrap();
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let (_registry, manager) = setup();
        assert!(matches!(
            manager.enable(42),
            Err(SieveError::Filter(FilterError::UnknownId { id: 42 }))
        ));
        assert!(matches!(
            manager.remove(42),
            Err(SieveError::Filter(FilterError::UnknownId { id: 42 }))
        ));
    }

    #[test]
    fn test_invalid_pattern_creates_nothing() {
        let (_registry, manager) = setup();
        let result = manager.create(Level::Trace, "[oops", ".", false);
        assert!(matches!(
            result,
            Err(SieveError::Filter(FilterError::InvalidPattern { .. }))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_late_registered_category_is_primed() {
        let (registry, manager) = setup();
        manager.create(Level::Trace, "render", ".", false).unwrap();

        let cat = registry.register("core", "render", Level::Warning);
        assert_eq!(cat.allowed(), Level::Trace);
        assert_eq!(manager.filters()[0].match_count, 1);

        drop(cat);
        assert_eq!(manager.filters()[0].match_count, 0);
    }

    #[test]
    fn test_save_skips_transient_filters() {
        let (_registry, manager) = setup();
        manager.create(Level::Trace, "keep", ".", true).unwrap();
        manager.create(Level::Debug, "drop", ".", false).unwrap();

        let json = manager.save_to_string().unwrap();
        let config: FilterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.version, constants::CONFIG_VERSION);
        assert_eq!(config.filters.len(), 1);
        assert_eq!(config.filters[0].category_pattern, "keep");
    }

    #[test]
    fn test_round_trip_preserves_ids_and_state() {
        let (registry, manager) = setup();
        let a = manager.create(Level::Trace, "render", "core", true).unwrap();
        let b = manager.create(Level::Error, "tick", ".", true).unwrap();
        manager.disable(b).unwrap();
        let json = manager.save_to_string().unwrap();

        let manager2 = FilterManager::new(Arc::clone(&registry));
        let cat = registry.register("core", "render", Level::Warning);
        manager2.load_from_str(&json).unwrap();

        let snapshots = manager2.filters();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].id, a);
        assert!(snapshots[0].enabled);
        assert!(snapshots[0].persistent);
        assert_eq!(snapshots[1].id, b);
        assert!(!snapshots[1].enabled);

        // The post-load recomputation primed the live category.
        assert_eq!(cat.allowed(), Level::Trace);
        assert_eq!(snapshots[0].match_count, 1);

        // New ids continue past the loaded ones.
        let c = manager2.create(Level::Info, "other", ".", false).unwrap();
        assert!(c > b);
    }

    #[test]
    fn test_load_rejects_newer_version() {
        let (_registry, manager) = setup();
        let doc = format!(
            r#"{{"version": {}, "next_id": 1, "filters": []}}"#,
            constants::CONFIG_VERSION + 1
        );
        assert!(matches!(
            manager.load_from_str(&doc),
            Err(SieveError::Store(StoreError::VersionTooNew { .. }))
        ));
    }

    #[test]
    fn test_load_rejects_duplicate_ids_atomically() {
        let (_registry, manager) = setup();
        let doc = r#"{
            "version": 1,
            "next_id": 3,
            "filters": [
                {"id": 1, "level": "trace", "category_pattern": "a", "owner_pattern": ".", "enabled": true},
                {"id": 1, "level": "error", "category_pattern": "b", "owner_pattern": ".", "enabled": true}
            ]
        }"#;
        assert!(matches!(
            manager.load_from_str(doc),
            Err(SieveError::Store(StoreError::DuplicateId { id: 1 }))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_load_bad_pattern_leaves_state_untouched() {
        let (registry, manager) = setup();
        let cat = registry.register("core", "render", Level::Warning);
        let live = manager.create(Level::Error, "render", ".", false).unwrap();
        assert_eq!(cat.allowed(), Level::Error);

        let doc = r#"{
            "version": 1,
            "next_id": 5,
            "filters": [
                {"id": 3, "level": "trace", "category_pattern": "[oops", "owner_pattern": ".", "enabled": true}
            ]
        }"#;
        assert!(manager.load_from_str(doc).is_err());
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.filters()[0].id, live);
        assert_eq!(cat.allowed(), Level::Error);
    }

    #[test]
    fn test_load_rejects_id_colliding_with_live_filter() {
        let (_registry, manager) = setup();
        let id = manager.create(Level::Trace, "a", ".", false).unwrap();
        let doc = format!(
            r#"{{"version": 1, "next_id": 2, "filters": [
                {{"id": {id}, "level": "error", "category_pattern": "b", "owner_pattern": ".", "enabled": true}}
            ]}}"#
        );
        assert!(matches!(
            manager.load_from_str(&doc),
            Err(SieveError::Store(StoreError::DuplicateId { .. }))
        ));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_owner_pattern_narrows_match() {
        let (registry, manager) = setup();
        let core_cat = registry.register("core", "render", Level::Warning);
        let plugin_cat = registry.register("plugin", "render", Level::Warning);

        manager.create(Level::Trace, "render", "^core$", false).unwrap();
        assert_eq!(core_cat.allowed(), Level::Trace);
        assert_eq!(plugin_cat.allowed(), Level::Warning);
    }
}
