// logsieve - app/mod.rs
//
// Application layer: filesystem persistence over the core rule engine.
// Dependencies: core layer.

pub mod store;
