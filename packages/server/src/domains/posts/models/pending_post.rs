use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::common::{PostId, TopicId, UserId};
use crate::domains::posts::models::{Post, PostState};

/// Row in `pending_posts`.
#[derive(Debug, Clone, FromRow)]
pub struct PendingPostRow {
    pub id: PostId,
    pub author_id: UserId,
    pub topic_id: TopicId,
    pub parent_post_id: Option<PostId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PendingPostRow> for Post {
    fn from(row: PendingPostRow) -> Self {
        Post {
            id: row.id,
            author_id: row.author_id,
            topic_id: row.topic_id,
            parent_post_id: row.parent_post_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            state: PostState::Pending { analysis: None },
        }
    }
}

const COLUMNS: &str = "id, author_id, topic_id, parent_post_id, content, created_at, updated_at";

impl PendingPostRow {
    pub async fn insert(post: &Post, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO pending_posts (id, author_id, topic_id, parent_post_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.topic_id)
        .bind(post.parent_post_id)
        .bind(&post.content)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id(id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLUMNS} FROM pending_posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Oldest first, the order moderators work the queue in.
    pub async fn list(limit: i64, offset: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLUMNS} FROM pending_posts ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_by_author(author_id: UserId, pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            "SELECT {COLUMNS} FROM pending_posts WHERE author_id = $1 ORDER BY created_at DESC"
        ))
        .bind(author_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_in_topic_by_author(
        topic_id: TopicId,
        author_id: UserId,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {COLUMNS} FROM pending_posts
            WHERE topic_id = $1 AND author_id = $2
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(topic_id)
        .bind(author_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Remove the row and hand it back. Exactly one concurrent caller gets
    /// `Some`; this is the serialization point for moderation transitions.
    pub async fn take<'e, E>(id: PostId, executor: E) -> Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        let row = sqlx::query_as::<_, Self>(&format!(
            "DELETE FROM pending_posts WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
