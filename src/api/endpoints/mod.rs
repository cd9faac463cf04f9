//! API endpoint handlers.
//!
//! Handlers are thin: parse, hand blocking work to the pool, shape the
//! response. Storage lives in `db`, scoring in `prediction`.

pub mod health;
pub mod history;
pub mod patients;
