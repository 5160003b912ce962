use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::{TopicId, UserId};

/// A discussion thread. Posts of every state belong to exactly one topic and
/// are removed with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub description: Option<String>,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(title: impl Into<String>, description: Option<String>, author_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: TopicId::new(),
            title: title.into(),
            description,
            author_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn find_by_id(id: TopicId, pool: &PgPool) -> Result<Option<Self>> {
        let topic = sqlx::query_as::<_, Self>(
            "SELECT id, title, description, author_id, created_at, updated_at FROM topics WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(topic)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let topic = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO topics (id, title, description, author_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, author_id, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.author_id)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await?;

        Ok(topic)
    }

    /// Delete the topic; foreign keys cascade to posts, pending and rejected
    /// submissions.
    pub async fn delete(id: TopicId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
