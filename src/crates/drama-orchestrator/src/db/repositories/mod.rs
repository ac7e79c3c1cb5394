//! Repository pattern implementations for database access

pub mod drama_repo;
pub mod task_repo;

pub use drama_repo::DramaRepository;
pub use task_repo::TaskRepository;
