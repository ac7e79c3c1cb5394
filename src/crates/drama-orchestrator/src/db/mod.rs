//! Database module
//!
//! Connection pooling, row models, repositories and the store seam the
//! pipelines write drama records through.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use connection::{DatabaseConnection, DatabasePool};
pub use error::DatabaseError;
pub use store::{DramaStore, NewEpisode, NewScene, SqliteDramaStore};
