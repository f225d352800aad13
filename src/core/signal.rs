// logsieve - core/signal.rs
//
// Thread-safe signal/slot primitive with two subscription lifetime
// disciplines:
//
// - `Signal` (bound): the signal is a plain value. Connections borrow it,
//   so the borrow checker enforces that every connection is dropped before
//   the signal. Disconnect waits for in-flight calls on the slot to drain,
//   giving a strict "no invocation after disconnect returns" guarantee.
// - `SharedSignal`: reference-counted storage. Connections hold a weak
//   reference and safely no-op once the signal is gone. Disconnect never
//   spins, so it is safe from inside a callback.
//
// Both variants share one dispatch core. Per-slot state lives in a single
// atomic word (blocked counter, in-call counter, deleted flag) so emission
// can check and skip slots without serialising on the structural guard.
// Core layer: pure logic, no I/O or platform dependencies.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Callable stored in a slot. Invoked with a shared reference to the event.
type BoxedCallback<T> = Box<dyn Fn(&T) + Send + Sync + 'static>;

// =============================================================================
// Per-slot atomic state
// =============================================================================

/// Saturating blocked counter, bits 0..16.
const BLOCKED_MASK: u32 = 0xFFFF;
/// In-call counter, bits 16..31. One unit per thread currently invoking.
const IN_CALL_ONE: u32 = 1 << 16;
const IN_CALL_MASK: u32 = 0x7FFF_0000;
/// Terminal flag: the slot is logically disconnected.
const DELETED: u32 = 1 << 31;

/// The state word of one callback slot.
///
/// All three facets share one word so that a single compare-and-swap can
/// atomically test "not blocked, not deleted" and claim an in-call unit.
struct SlotState(AtomicU32);

impl SlotState {
    fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Increment the blocked counter. Saturates at the field width so a
    /// pathological number of nested guards cannot overflow into `in_call`.
    fn block(&self) {
        let mut state = self.0.load(Ordering::Relaxed);
        loop {
            if state & BLOCKED_MASK == BLOCKED_MASK {
                return;
            }
            match self.0.compare_exchange_weak(
                state,
                state + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => state = observed,
            }
        }
    }

    /// Decrement the blocked counter, saturating at zero.
    fn unblock(&self) {
        let mut state = self.0.load(Ordering::Relaxed);
        loop {
            if state & BLOCKED_MASK == 0 {
                return;
            }
            match self.0.compare_exchange_weak(
                state,
                state - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => state = observed,
            }
        }
    }

    /// Attempt to claim an in-call unit. Fails (without touching the word)
    /// when the slot is blocked or deleted.
    fn begin_call(&self) -> bool {
        let mut state = self.0.load(Ordering::Acquire);
        loop {
            if state & (DELETED | BLOCKED_MASK) != 0 {
                return false;
            }
            match self.0.compare_exchange_weak(
                state,
                state + IN_CALL_ONE,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => state = observed,
            }
        }
    }

    /// Release an in-call unit claimed by `begin_call`.
    fn end_call(&self) {
        self.0.fetch_sub(IN_CALL_ONE, Ordering::AcqRel);
    }

    /// Mark the slot deleted. New calls can no longer begin; in-flight
    /// calls run to completion.
    fn retire(&self) {
        self.0.fetch_or(DELETED, Ordering::AcqRel);
    }

    /// Spin until no thread holds an in-call unit on this slot.
    ///
    /// Bounded by callback duration; callbacks are expected to be short.
    /// Must not be called while the current thread itself holds a unit.
    fn wait_idle(&self) {
        while self.0.load(Ordering::Acquire) & IN_CALL_MASK != 0 {
            std::hint::spin_loop();
        }
    }

    fn is_deleted(&self) -> bool {
        self.0.load(Ordering::Acquire) & DELETED != 0
    }
}

/// One registered callback plus its state word. Owned by the signal's slot
/// list; referenced by `Arc` from connection handles so a slot is never
/// freed while a handle or an in-flight call can still reach it.
struct CallbackSlot<T> {
    callback: BoxedCallback<T>,
    state: SlotState,
}

impl<T> CallbackSlot<T> {
    fn new(callback: BoxedCallback<T>) -> Self {
        Self {
            callback,
            state: SlotState::new(),
        }
    }
}

// =============================================================================
// Shared dispatch core
// =============================================================================

struct SlotList<T> {
    /// Connection order, oldest first. Emission iterates in reverse so the
    /// most recently connected slot is visited first.
    slots: Vec<Arc<CallbackSlot<T>>>,

    /// Number of emissions currently in progress on this signal
    /// (including nested emissions from callbacks).
    recursion: u32,

    /// Set when a slot was retired while an emission was in progress;
    /// cleared by the sweep at the end of the outermost emission.
    sweep_pending: bool,
}

/// The guarded slot list shared by both signal variants.
struct SignalCore<T> {
    inner: Mutex<SlotList<T>>,
}

impl<T> SignalCore<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotList {
                slots: Vec::new(),
                recursion: 0,
                sweep_pending: false,
            }),
        }
    }

    /// Callbacks always run outside the guard, so a poisoned mutex means a
    /// panic inside our own bookkeeping; the list is still structurally
    /// valid and we continue with it.
    fn lock(&self) -> MutexGuard<'_, SlotList<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(&self, callback: BoxedCallback<T>) -> Arc<CallbackSlot<T>> {
        let slot = Arc::new(CallbackSlot::new(callback));
        self.lock().slots.push(Arc::clone(&slot));
        slot
    }

    /// Disconnect `slot`. With no emission in progress the slot is removed
    /// physically; otherwise it is retired and swept at the end of the
    /// outermost emission. When `wait_idle` is set, spins after retiring
    /// until no thread holds an in-flight call on the slot.
    fn disconnect(&self, slot: &Arc<CallbackSlot<T>>, wait_idle: bool) {
        let mut inner = self.lock();
        if inner.recursion == 0 {
            // Emissions bump `recursion` under the guard before invoking
            // anything, so depth zero here means no call is in flight
            // anywhere and physical removal is safe.
            inner.slots.retain(|s| !Arc::ptr_eq(s, slot));
            return;
        }
        slot.state.retire();
        inner.sweep_pending = true;
        drop(inner);
        if wait_idle {
            slot.state.wait_idle();
        }
    }

    /// Invoke all live slots, most recently connected first.
    ///
    /// The guard is held only long enough to snapshot the slot list; no
    /// callback ever runs under it. Slots connected after the snapshot are
    /// not observed by this emission.
    fn emit(&self, event: &T) {
        let snapshot = {
            let mut inner = self.lock();
            inner.recursion += 1;
            inner.slots.clone()
        };
        // Decrements recursion and sweeps retired slots even if a callback
        // panics.
        let _sweep = SweepGuard { core: self };
        for slot in snapshot.iter().rev() {
            if !slot.state.begin_call() {
                continue;
            }
            let _call = CallGuard { state: &slot.state };
            (slot.callback)(event);
        }
    }

    fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }
}

/// Releases the in-call unit on all exit paths, including unwinding.
struct CallGuard<'s> {
    state: &'s SlotState,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.state.end_call();
    }
}

/// End-of-emission bookkeeping: drops the recursion depth and, when the
/// outermost emission finishes, purges every retired slot.
struct SweepGuard<'s, T> {
    core: &'s SignalCore<T>,
}

impl<T> Drop for SweepGuard<'_, T> {
    fn drop(&mut self) {
        let mut inner = self.core.lock();
        inner.recursion -= 1;
        if inner.recursion == 0 && inner.sweep_pending {
            inner.slots.retain(|s| !s.state.is_deleted());
            inner.sweep_pending = false;
        }
    }
}

// =============================================================================
// Bound variant
// =============================================================================

/// A signal whose connections borrow it.
///
/// The borrow checker guarantees every [`Connection`] is dropped before the
/// signal itself, which is what makes the strict disconnect guarantee of
/// this variant possible. Suited to signals owned at module or object
/// scope whose subscribers have clearly nested lifetimes. When subscriber
/// lifetimes cannot be nested, use [`SharedSignal`].
pub struct Signal<T> {
    core: SignalCore<T>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            core: SignalCore::new(),
        }
    }

    /// Register `callback`. Newer connections are visited before older
    /// ones during emission.
    pub fn connect<F>(&self, callback: F) -> Connection<'_, T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Connection {
            core: &self.core,
            slot: self.core.connect(Box::new(callback)),
        }
    }

    /// Invoke every connected, non-blocked callback with `event`, most
    /// recently connected first. Safe to call from any thread and from
    /// within a callback (nested emission).
    pub fn emit(&self, event: &T) {
        self.core.emit(event);
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Signal<T> {
    fn drop(&mut self) {
        // Reaching this with live slots means a connection was leaked
        // (e.g. mem::forget). That is a caller contract violation: the
        // leaked handle would reference a dead signal.
        debug_assert!(
            self.core.is_empty(),
            "bound Signal dropped with live connections; \
             disconnect them first or use SharedSignal"
        );
    }
}

/// Handle for one subscription on a bound [`Signal`]. Move-only; dropping
/// it disconnects.
pub struct Connection<'s, T> {
    core: &'s SignalCore<T>,
    slot: Arc<CallbackSlot<T>>,
}

impl<T> Connection<'_, T> {
    /// Disconnect now. Once this returns, no subsequent emission observes
    /// the callback and no in-flight invocation of it is still running.
    ///
    /// May briefly spin waiting for an in-flight call on another thread to
    /// finish. Must not be called from inside this connection's own
    /// callback; disconnect it from outside, or use [`SharedSignal`].
    pub fn disconnect(self) {
        // Drop does the work.
    }

    /// Suppress delivery to this connection. Each `block` must be paired
    /// with an `unblock`; nesting composes. Prefer [`Connection::blocked`]
    /// where a scope is available.
    pub fn block(&self) {
        self.slot.state.block();
    }

    /// Remove one level of suppression.
    pub fn unblock(&self) {
        self.slot.state.unblock();
    }

    /// Scoped suppression: blocked while the returned guard lives.
    pub fn blocked(&self) -> BlockGuard<'_> {
        BlockGuard::new(&self.slot.state)
    }
}

impl<T> Drop for Connection<'_, T> {
    fn drop(&mut self) {
        self.core.disconnect(&self.slot, true);
    }
}

// =============================================================================
// Shared variant
// =============================================================================

/// A signal with reference-counted storage.
///
/// Cloning yields another handle to the same signal. Connections are owned
/// (`'static`) values holding a weak reference; they no-op safely once
/// every signal handle is gone, so subscriber and signal lifetimes need no
/// coordination.
pub struct SharedSignal<T> {
    core: Arc<SignalCore<T>>,
}

impl<T> SharedSignal<T> {
    pub fn new() -> Self {
        Self {
            core: Arc::new(SignalCore::new()),
        }
    }

    /// Register `callback`. Newer connections are visited before older
    /// ones during emission.
    pub fn connect<F>(&self, callback: F) -> SharedConnection<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        SharedConnection {
            core: Arc::downgrade(&self.core),
            slot: self.core.connect(Box::new(callback)),
        }
    }

    /// Invoke every connected, non-blocked callback with `event`, most
    /// recently connected first. Safe to call from any thread and from
    /// within a callback (nested emission).
    pub fn emit(&self, event: &T) {
        self.core.emit(event);
    }
}

impl<T> Clone for SharedSignal<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Default for SharedSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one subscription on a [`SharedSignal`]. Move-only; dropping
/// it disconnects (a no-op if the signal is already gone).
pub struct SharedConnection<T> {
    core: Weak<SignalCore<T>>,
    slot: Arc<CallbackSlot<T>>,
}

impl<T> SharedConnection<T> {
    /// Disconnect now. New emissions no longer observe the callback; an
    /// invocation already in flight on another thread is permitted to
    /// complete. Never spins, so this is safe to call from inside any
    /// callback, including this connection's own.
    pub fn disconnect(self) {
        // Drop does the work.
    }

    /// Suppress delivery to this connection. Works even after the signal
    /// itself has been destroyed (trivially: nothing emits any more).
    pub fn block(&self) {
        self.slot.state.block();
    }

    /// Remove one level of suppression.
    pub fn unblock(&self) {
        self.slot.state.unblock();
    }

    /// Scoped suppression: blocked while the returned guard lives.
    pub fn blocked(&self) -> BlockGuard<'_> {
        BlockGuard::new(&self.slot.state)
    }
}

impl<T> Drop for SharedConnection<T> {
    fn drop(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.disconnect(&self.slot, false);
        }
    }
}

// =============================================================================
// BlockGuard
// =============================================================================

/// Scoped suppression of one connection's delivery.
///
/// Construction blocks the connection; drop unblocks it on every exit path.
/// Nested guards on the same connection compose additively: delivery
/// resumes only when the outermost guard is dropped.
pub struct BlockGuard<'c> {
    state: &'c SlotState,
}

impl<'c> BlockGuard<'c> {
    fn new(state: &'c SlotState) -> Self {
        state.block();
        Self { state }
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        self.state.unblock();
    }
}

// =============================================================================
// Tests
// =============================================================================
