// logsieve - core/mod.rs
//
// Core logic layer: the signal primitive, categories, the registry, and
// the filter rule engine.
// Must NOT depend on: app, or any filesystem I/O.

pub mod category;
pub mod filter;
pub mod manager;
pub mod registry;
pub mod signal;
