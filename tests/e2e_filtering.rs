// logsieve - tests/e2e_filtering.rs
//
// End-to-end tests for the signal primitive and the filter rule engine,
// exercised through the public API only: real registry, real filter
// manager, real JSON documents on a real temp filesystem. No mocks.

use logsieve::app::store;
use logsieve::{CategoryRegistry, FilterManager, Level, SharedSignal, Signal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// =============================================================================
// Signal primitive
// =============================================================================

/// Once `disconnect` returns, no later emission observes the callback.
#[test]
fn e2e_no_invocation_after_disconnect() {
    let signal = Signal::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&hits);
    let conn = signal.connect(move |_: &u32| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    signal.emit(&1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    conn.disconnect();
    signal.emit(&2);
    signal.emit(&3);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

/// Two nested block guards on one connection: releasing only one still
/// suppresses delivery; releasing both restores it.
#[test]
fn e2e_nested_blocking_composes() {
    let signal = SharedSignal::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&hits);
    let conn = signal.connect(move |_: &u32| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    {
        let _outer = conn.blocked();
        {
            let _inner = conn.blocked();
            signal.emit(&1);
        }
        // One guard released, one still held.
        signal.emit(&2);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
    signal.emit(&3);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    conn.disconnect();
}

/// Emission visits connections newest-first: c3, then c2, then c1.
#[test]
fn e2e_visitation_order_is_newest_first() {
    let signal = Signal::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&order);
    let c1 = signal.connect(move |_: &()| sink.lock().unwrap().push(1));
    let sink = Arc::clone(&order);
    let c2 = signal.connect(move |_: &()| sink.lock().unwrap().push(2));
    let sink = Arc::clone(&order);
    let c3 = signal.connect(move |_: &()| sink.lock().unwrap().push(3));

    signal.emit(&());
    assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);

    c1.disconnect();
    c2.disconnect();
    c3.disconnect();
}

// =============================================================================
// Rule engine composition
// =============================================================================

/// The most recently created enabled matching rule decides a category's
/// level; disabling and removing rules falls back down the chain.
#[test]
fn e2e_priority_by_recency_composition() {
    let registry = CategoryRegistry::new();
    let manager = FilterManager::new(Arc::clone(&registry));
    let cat = registry.register("core", "render", Level::Warning);

    let f1 = manager.create(Level::Info, "render", ".", false).unwrap();
    let f2 = manager.create(Level::Error, "render", ".", false).unwrap();
    assert_eq!(cat.allowed(), Level::Error);

    manager.disable(f2).unwrap();
    assert_eq!(cat.allowed(), Level::Info);

    manager.remove(f1).unwrap();
    assert_eq!(cat.allowed(), Level::Warning);
}

/// A category registered after filters exist is primed immediately by
/// the registry's event signal, with the highest-id rule winning.
#[test]
fn e2e_registry_event_priming() {
    let registry = CategoryRegistry::new();
    let manager = FilterManager::new(Arc::clone(&registry));

    manager.create(Level::Warning, "net", ".", false).unwrap();
    manager.create(Level::Error, "net", ".", false).unwrap();

    let cat = registry.register("plugin", "net", Level::Trace);
    assert_eq!(cat.allowed(), Level::Error);
}

/// The filtered level gates what the category reports as enabled, which
/// is the behaviour a logging call site would observe.
#[test]
fn e2e_filtering_gates_logging_call_sites() {
    let registry = CategoryRegistry::new();
    let manager = FilterManager::new(Arc::clone(&registry));
    let cat = registry.register("core", "pathfind", Level::Warning);

    assert!(!cat.enabled(Level::Debug));
    assert!(cat.enabled(Level::Error));

    let id = manager.create(Level::Debug, "pathfind", ".", false).unwrap();
    assert!(cat.enabled(Level::Debug));
    assert!(!cat.enabled(Level::Trace));

    manager.remove(id).unwrap();
    assert!(!cat.enabled(Level::Debug));
}

// =============================================================================
// Persistence
// =============================================================================

/// Saving filters {persistent, transient} and loading into a fresh
/// manager yields exactly the persistent one, with a zero match count.
#[test]
fn e2e_round_trip_persists_only_persistent_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filters.json");

    let registry = CategoryRegistry::new();
    let manager = FilterManager::new(Arc::clone(&registry));
    manager.create(Level::Info, "render", "core", true).unwrap();
    manager.create(Level::Error, "tick", ".", false).unwrap();
    store::save(&manager, &path).unwrap();

    let fresh = FilterManager::new(CategoryRegistry::new());
    assert!(store::load(&fresh, &path).unwrap());

    let filters = fresh.filters();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].category_pattern, "render");
    assert_eq!(filters[0].owner_pattern, "core");
    assert_eq!(filters[0].level, Level::Info);
    assert!(filters[0].enabled);
    assert!(filters[0].persistent);
    assert_eq!(filters[0].match_count, 0);
}

/// A document with an unsupported version is rejected without touching
/// the existing rule set.
#[test]
fn e2e_atomic_failure_on_bad_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filters.json");
    std::fs::write(
        &path,
        r#"{"version": 999, "next_id": 1, "filters": []}"#,
    )
    .unwrap();

    let registry = CategoryRegistry::new();
    let manager = FilterManager::new(Arc::clone(&registry));
    manager.create(Level::Trace, "keep", ".", true).unwrap();
    let before = manager.filters();

    assert!(store::load(&manager, &path).is_err());
    assert_eq!(manager.filters(), before);
}

/// Full lifecycle: build a rule set, save it, restart (fresh registry
/// and manager), load, and verify live categories are re-primed.
#[test]
fn e2e_save_restart_load_reprimes_categories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("filters.json");

    {
        let registry = CategoryRegistry::new();
        let manager = FilterManager::new(Arc::clone(&registry));
        let low = manager.create(Level::Trace, "render", ".", true).unwrap();
        manager.create(Level::Error, "render", "core", true).unwrap();
        manager.disable(low).unwrap();
        store::save(&manager, &path).unwrap();
    }

    let registry = CategoryRegistry::new();
    let core_cat = registry.register("core", "render", Level::Warning);
    let plugin_cat = registry.register("plugin", "render", Level::Warning);

    let manager = FilterManager::new(Arc::clone(&registry));
    assert!(store::load(&manager, &path).unwrap());

    // Only the enabled, owner-scoped rule applies after the reload.
    assert_eq!(core_cat.allowed(), Level::Error);
    assert_eq!(plugin_cat.allowed(), Level::Warning);

    let filters = manager.filters();
    assert_eq!(filters.len(), 2);
    assert!(!filters[0].enabled);
    assert_eq!(filters[1].match_count, 1);
}
