//! Drama, episode and scene repository

use crate::db::connection::DatabasePool;
use crate::db::models::{Drama, Episode, Scene};
use chrono::Utc;

/// Repository for drama records produced by the pipelines
pub struct DramaRepository;

impl DramaRepository {
    /// Create a draft drama
    pub async fn create_drama(
        pool: &DatabasePool,
        title: &str,
        description: Option<&str>,
    ) -> Result<Drama, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query_as::<_, Drama>(
            "INSERT INTO dramas (title, description, total_episodes, status, created_at, updated_at)
             VALUES (?, ?, 0, 'draft', ?, ?)
             RETURNING *",
        )
        .bind(title)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await
    }

    /// Get a drama by id
    pub async fn get_drama(pool: &DatabasePool, id: i64) -> Result<Option<Drama>, sqlx::Error> {
        sqlx::query_as::<_, Drama>("SELECT * FROM dramas WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert episodes after the drama's last one and bump its episode
    /// count, atomically
    ///
    /// # Arguments
    /// * `episodes` - (position, title, script_content) triples; position is
    ///   1-based within the batch and is stored offset by the highest
    ///   episode number the drama already has
    pub async fn add_episodes(
        pool: &DatabasePool,
        drama_id: i64,
        episodes: &[(i64, String, String)],
    ) -> Result<Vec<Episode>, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;

        let (last_number,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(episode_number), 0) FROM episodes WHERE drama_id = ?",
        )
        .bind(drama_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(episodes.len());
        for (position, title, script) in episodes {
            let number = last_number + position;
            let episode = sqlx::query_as::<_, Episode>(
                "INSERT INTO episodes (drama_id, episode_number, title, script_content, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, 'draft', ?, ?)
                 RETURNING *",
            )
            .bind(drama_id)
            .bind(number)
            .bind(title)
            .bind(script)
            .bind(&now)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await?;
            created.push(episode);
        }

        sqlx::query("UPDATE dramas SET total_episodes = total_episodes + ?, updated_at = ? WHERE id = ?")
            .bind(created.len() as i64)
            .bind(&now)
            .bind(drama_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Get an episode by id
    pub async fn get_episode(pool: &DatabasePool, id: i64) -> Result<Option<Episode>, sqlx::Error> {
        sqlx::query_as::<_, Episode>("SELECT * FROM episodes WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a drama's episodes in episode order
    pub async fn list_episodes(
        pool: &DatabasePool,
        drama_id: i64,
    ) -> Result<Vec<Episode>, sqlx::Error> {
        sqlx::query_as::<_, Episode>(
            "SELECT * FROM episodes WHERE drama_id = ? ORDER BY episode_number, id",
        )
        .bind(drama_id)
        .fetch_all(pool)
        .await
    }

    /// Replace an episode's scenes with a freshly extracted set
    ///
    /// # Arguments
    /// * `scenes` - (location, time, prompt) triples
    pub async fn replace_scenes(
        pool: &DatabasePool,
        drama_id: i64,
        episode_id: i64,
        scenes: &[(String, String, String)],
    ) -> Result<Vec<Scene>, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM scenes WHERE episode_id = ?")
            .bind(episode_id)
            .execute(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(scenes.len());
        for (location, time, prompt) in scenes {
            let scene = sqlx::query_as::<_, Scene>(
                "INSERT INTO scenes (drama_id, episode_id, location, time, prompt, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 RETURNING *",
            )
            .bind(drama_id)
            .bind(episode_id)
            .bind(location)
            .bind(time)
            .bind(prompt)
            .bind(&now)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await?;
            created.push(scene);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// List an episode's scenes
    pub async fn list_scenes(
        pool: &DatabasePool,
        episode_id: i64,
    ) -> Result<Vec<Scene>, sqlx::Error> {
        sqlx::query_as::<_, Scene>("SELECT * FROM scenes WHERE episode_id = ? ORDER BY id")
            .bind(episode_id)
            .fetch_all(pool)
            .await
    }
}
