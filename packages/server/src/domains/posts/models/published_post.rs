use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::common::{PostId, TopicId, UserId};
use crate::domains::posts::models::{Post, PostState};

/// Row in `posts` joined with its live reply count.
#[derive(Debug, Clone, FromRow)]
pub struct PublishedPostRow {
    pub id: PostId,
    pub author_id: UserId,
    pub topic_id: TopicId,
    pub parent_post_id: Option<PostId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reply_count: i64,
}

impl From<PublishedPostRow> for Post {
    fn from(row: PublishedPostRow) -> Self {
        Post {
            id: row.id,
            author_id: row.author_id,
            topic_id: row.topic_id,
            parent_post_id: row.parent_post_id,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            state: PostState::Published {
                reply_count: row.reply_count,
            },
        }
    }
}

// TODO: replace the correlated count with a counter maintained by
// approve/delete once large threads show up in query timings.
const SELECT: &str = r#"
    SELECT p.id, p.author_id, p.topic_id, p.parent_post_id, p.content, p.created_at, p.updated_at,
           (SELECT COUNT(*) FROM posts c WHERE c.parent_post_id = p.id) AS reply_count
    FROM posts p
"#;

impl PublishedPostRow {
    /// Insert a published post. The caller is responsible for the post being
    /// in the `Published` state.
    pub async fn insert<'e, E>(post: &Post, executor: E) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, topic_id, parent_post_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.topic_id)
        .bind(post.parent_post_id)
        .bind(&post.content)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(id: PostId, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(&format!("{SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }

    pub async fn count_top_level(topic_id: TopicId, pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE topic_id = $1 AND parent_post_id IS NULL",
        )
        .bind(topic_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// A page of top-level posts and all of their descendants, oldest first
    /// with id as tie-breaker.
    pub async fn list_thread_page(
        topic_id: TopicId,
        limit: i64,
        offset: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH RECURSIVE page AS (
                SELECT id FROM posts
                WHERE topic_id = $1 AND parent_post_id IS NULL
                ORDER BY created_at ASC, id ASC
                LIMIT $2 OFFSET $3
            ),
            thread (id) AS (
                SELECT id FROM page
                UNION
                SELECT c.id FROM posts c JOIN thread t ON c.parent_post_id = t.id
            )
            {SELECT}
            WHERE p.id IN (SELECT id FROM thread)
            ORDER BY p.created_at ASC, p.id ASC
            "#
        ))
        .bind(topic_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_by_author(
        author_id: UserId,
        limit: i64,
        offset: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(&format!(
            "{SELECT} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_by_author(author_id: UserId, pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Lock a published post that a reply is about to reference. Returns false
    /// when the post is gone or belongs to another topic.
    pub async fn lock_as_parent<'e, E>(id: PostId, topic_id: TopicId, executor: E) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let found = sqlx::query_scalar::<_, PostId>(
            "SELECT id FROM posts WHERE id = $1 AND topic_id = $2 FOR KEY SHARE",
        )
        .bind(id)
        .bind(topic_id)
        .fetch_optional(executor)
        .await?;

        Ok(found.is_some())
    }

    /// Lock a post for deletion and return its reply count.
    pub async fn lock_for_delete<'e, E>(id: PostId, executor: E) -> Result<Option<i64>>
    where
        E: PgExecutor<'e>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT (SELECT COUNT(*) FROM posts c WHERE c.parent_post_id = p.id)
            FROM posts p
            WHERE p.id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(count)
    }

    pub async fn delete<'e, E>(id: PostId, executor: E) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
