//! Persistence seam for pipeline output
//!
//! Pipelines write dramas, episodes and scenes through [`DramaStore`] rather
//! than through the repositories directly, so a failing store can be swapped
//! in when exercising the persist phase.

use crate::db::connection::DatabaseConnection;
use crate::db::models::{Drama, Episode, Scene};
use crate::db::repositories::DramaRepository;
use crate::Result;
use async_trait::async_trait;

/// Episode about to be written
///
/// `episode_number` is the 1-based position within the batch; the stored
/// number continues after the drama's existing episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub episode_number: i64,
    pub title: String,
    pub script_content: String,
}

/// Scene about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewScene {
    pub location: String,
    pub time: String,
    pub prompt: String,
}

/// Durable storage for drama records
#[async_trait]
pub trait DramaStore: Send + Sync {
    async fn get_drama(&self, id: i64) -> Result<Option<Drama>>;

    async fn create_drama(&self, title: &str, description: Option<&str>) -> Result<Drama>;

    /// Append episodes after the drama's last one and add their count to
    /// the drama's total
    async fn add_episodes(&self, drama_id: i64, episodes: Vec<NewEpisode>) -> Result<Vec<Episode>>;

    async fn get_episode(&self, id: i64) -> Result<Option<Episode>>;

    /// Swap an episode's scene set for `scenes`
    async fn replace_scenes(
        &self,
        drama_id: i64,
        episode_id: i64,
        scenes: Vec<NewScene>,
    ) -> Result<Vec<Scene>>;
}

/// [`DramaStore`] backed by the SQLite pool
#[derive(Clone)]
pub struct SqliteDramaStore {
    db: DatabaseConnection,
}

impl SqliteDramaStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DramaStore for SqliteDramaStore {
    async fn get_drama(&self, id: i64) -> Result<Option<Drama>> {
        Ok(DramaRepository::get_drama(self.db.pool(), id).await?)
    }

    async fn create_drama(&self, title: &str, description: Option<&str>) -> Result<Drama> {
        Ok(DramaRepository::create_drama(self.db.pool(), title, description).await?)
    }

    async fn add_episodes(&self, drama_id: i64, episodes: Vec<NewEpisode>) -> Result<Vec<Episode>> {
        let rows: Vec<(i64, String, String)> = episodes
            .into_iter()
            .map(|e| (e.episode_number, e.title, e.script_content))
            .collect();
        Ok(DramaRepository::add_episodes(self.db.pool(), drama_id, &rows).await?)
    }

    async fn get_episode(&self, id: i64) -> Result<Option<Episode>> {
        Ok(DramaRepository::get_episode(self.db.pool(), id).await?)
    }

    async fn replace_scenes(
        &self,
        drama_id: i64,
        episode_id: i64,
        scenes: Vec<NewScene>,
    ) -> Result<Vec<Scene>> {
        let rows: Vec<(String, String, String)> = scenes
            .into_iter()
            .map(|s| (s.location, s.time, s.prompt))
            .collect();
        Ok(DramaRepository::replace_scenes(self.db.pool(), drama_id, episode_id, &rows).await?)
    }
}
