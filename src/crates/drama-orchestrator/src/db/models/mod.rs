//! Database models
//!
//! Timestamps are stored as RFC3339 strings (TEXT in SQLite) and statuses as
//! their lowercase names.

pub mod drama;
pub mod task;

pub use drama::{Drama, Episode, Scene};
pub use task::TaskRecord;
