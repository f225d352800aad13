// logsieve - core/registry.rs
//
// Process-wide list of live diagnostic categories, with add/remove/modify
// events published through a SharedSignal. The registry is an explicitly
// constructed object injected into whatever needs it (category owners,
// the filter manager); its lifetime is owned by the application entry
// point, not a lazily initialised global.
//
// Contract: events are emitted while the registry guard is held, so the
// view a listener observes is always consistent with the list. The price
// is that a listener must never call back into the registry from inside
// its callback — that would deadlock. This is a documented caller
// obligation the registry cannot prevent.

use crate::core::category::{Category, CategoryEvent, CategoryEventKind, Level};
use crate::core::signal::SharedSignal;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry of live categories plus the event signal announcing changes.
pub struct CategoryRegistry {
    categories: Mutex<Vec<Arc<Category>>>,
    events: SharedSignal<CategoryEvent>,
}

impl CategoryRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            categories: Mutex::new(Vec::new()),
            events: SharedSignal::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Category>>> {
        self.categories.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The signal carrying `Added`/`Removed`/`Modified` events.
    ///
    /// Any subscriber works — the filter manager is simply one of them.
    /// Callbacks run with the registry guard held; do not call back into
    /// the registry from inside one.
    pub fn events(&self) -> &SharedSignal<CategoryEvent> {
        &self.events
    }

    /// Create and register a category.
    ///
    /// Emits `Added` under the guard. The returned handle unregisters the
    /// category when dropped and keeps the registry alive until then, so a
    /// category can always log for as long as it exists.
    pub fn register(self: &Arc<Self>, owner: &str, name: &str, default_level: Level) -> CategoryHandle {
        let category = Arc::new(Category::new(owner, name, default_level));
        let mut list = self.lock();
        list.push(Arc::clone(&category));
        tracing::debug!(
            owner = owner,
            category = name,
            allowed = %category.allowed(),
            "Registered category"
        );
        self.events.emit(&CategoryEvent {
            kind: CategoryEventKind::Added,
            category: Arc::clone(&category),
        });
        drop(list);
        CategoryHandle {
            registry: Arc::clone(self),
            category,
        }
    }

    /// Remove a category from the list and emit `Removed` under the guard.
    /// Order in the list carries no meaning, so swap-remove is fine.
    fn unregister(&self, category: &Arc<Category>) {
        let mut list = self.lock();
        if let Some(pos) = list.iter().position(|c| Arc::ptr_eq(c, category)) {
            list.swap_remove(pos);
            tracing::debug!(
                owner = category.owner(),
                category = category.name(),
                "Unregistered category"
            );
            self.events.emit(&CategoryEvent {
                kind: CategoryEventKind::Removed,
                category: Arc::clone(category),
            });
        }
    }

    /// Set a category's threshold on behalf of an external writer.
    ///
    /// No-op when unchanged; otherwise stores atomically and emits
    /// `Modified` under the guard.
    pub fn set_level(&self, category: &Arc<Category>, level: Level) {
        let list = self.lock();
        if category.allowed() == level {
            return;
        }
        let old = category.store_allowed(level);
        tracing::trace!(
            owner = category.owner(),
            category = category.name(),
            from = %old,
            to = %level,
            "Category level changed"
        );
        self.events.emit(&CategoryEvent {
            kind: CategoryEventKind::Modified,
            category: Arc::clone(category),
        });
        drop(list);
    }

    /// Run `f` over the live category list with the guard held.
    ///
    /// This is the consistency primitive for compound operations that must
    /// see a stable category set (filter application, recomputation).
    /// `f` must not call back into the registry.
    pub fn with_categories<R>(&self, f: impl FnOnce(&[Arc<Category>]) -> R) -> R {
        let list = self.lock();
        f(&list)
    }

    /// Clone the current category list, for listing surfaces.
    pub fn snapshot(&self) -> Vec<Arc<Category>> {
        self.lock().clone()
    }

    /// Number of live categories.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// =============================================================================
// CategoryHandle
// =============================================================================

/// Owning handle for one registered category.
///
/// Dereferences to [`Category`] for the logging fast path. Dropping the
/// handle unregisters the category and emits `Removed`.
pub struct CategoryHandle {
    registry: Arc<CategoryRegistry>,
    category: Arc<Category>,
}

impl CategoryHandle {
    /// The shared category, for holding in filters or event consumers.
    pub fn category(&self) -> &Arc<Category> {
        &self.category
    }
}

impl Deref for CategoryHandle {
    type Target = Category;

    fn deref(&self) -> &Category {
        &self.category
    }
}

impl Drop for CategoryHandle {
    fn drop(&mut self) {
        self.registry.unregister(&self.category);
    }
}

// =============================================================================
// Tests
// =============================================================================
