//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `rusqlite::Connection`. Outside a caller's
//! transaction each call is auto-committed. Sub-modules are re-exported here.

mod patient;
mod prediction;

pub use patient::*;
pub use prediction::*;
