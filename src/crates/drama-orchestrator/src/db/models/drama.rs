//! Drama, episode and scene rows written by the pipelines

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short drama assembled from a novel
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Drama {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub total_episodes: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// One episode of a drama
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Episode {
    pub id: i64,
    pub drama_id: i64,
    /// 1-based, contiguous within a single parse
    pub episode_number: i64,
    pub title: String,
    /// Rendered script text
    pub script_content: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Background scene extracted from an episode script
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Scene {
    pub id: i64,
    pub drama_id: i64,
    pub episode_id: i64,
    pub location: String,
    pub time: String,
    /// Image-generation prompt for the background
    pub prompt: String,
    pub created_at: String,
    pub updated_at: String,
}
