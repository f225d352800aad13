// logsieve - lib.rs
//
// Library entry point.
//
// logsieve provides two things:
// 1. A thread-safe signal/slot primitive (`Signal`, `SharedSignal`) with
//    two subscription lifetime disciplines: borrow-checked bound
//    connections and owned shared connections.
// 2. A reactive, persistent rule engine (`FilterManager`) that adjusts
//    the severity thresholds of named diagnostic categories by regex
//    pattern, driven by the registry's category events over that same
//    signal primitive.

pub mod app;
pub mod core;
pub mod util;

pub use crate::core::category::{Category, CategoryEvent, CategoryEventKind, Level};
pub use crate::core::filter::Pattern;
pub use crate::core::manager::{FilterConfig, FilterManager, FilterRecord, FilterSnapshot};
pub use crate::core::registry::{CategoryHandle, CategoryRegistry};
pub use crate::core::signal::{
    BlockGuard, Connection, SharedConnection, SharedSignal, Signal,
};
pub use crate::util::error::{FilterError, Result, SieveError, StoreError};
