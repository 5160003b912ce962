// Postgres implementation of BasePostStore
//
// Each moderation transition runs in one transaction. Taking the pending row
// with DELETE ... RETURNING is what serializes concurrent moderators: only one
// transaction gets the row back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{ApproveOutcome, BasePostStore, DeleteOutcome};
use crate::common::{PostId, TopicId, UserId};
use crate::domains::moderation::models::AnalysisRecord;
use crate::domains::posts::models::{
    PendingPostRow, Post, PostApproval, PublishedPostRow, RejectedPostRow,
};
use crate::domains::topics::Topic;

#[derive(Clone)]
pub struct PostgresPostStore {
    pool: PgPool,
}

impl PostgresPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn into_posts<R: Into<Post>>(rows: Vec<R>) -> Vec<Post> {
    rows.into_iter().map(Into::into).collect()
}

#[async_trait]
impl BasePostStore for PostgresPostStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Topic::find_by_id(id, &self.pool).await
    }

    async fn insert_topic(&self, topic: Topic) -> Result<Topic> {
        topic.insert(&self.pool).await
    }

    async fn delete_topic(&self, id: TopicId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Analyses are not tied to pending posts by a foreign key
        sqlx::query(
            r#"
            DELETE FROM ai_analyses
            WHERE pending_post_id IN (SELECT id FROM pending_posts WHERE topic_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_pending(&self, post: Post) -> Result<Post> {
        let row = PendingPostRow::insert(&post, &self.pool).await?;
        Ok(row.into())
    }

    async fn find_pending(&self, id: PostId) -> Result<Option<Post>> {
        Ok(PendingPostRow::find_by_id(id, &self.pool).await?.map(Into::into))
    }

    async fn list_pending(&self, limit: i64, offset: i64) -> Result<Vec<Post>> {
        Ok(into_posts(PendingPostRow::list(limit, offset, &self.pool).await?))
    }

    async fn list_pending_by_author(&self, author_id: UserId) -> Result<Vec<Post>> {
        Ok(into_posts(
            PendingPostRow::list_by_author(author_id, &self.pool).await?,
        ))
    }

    async fn list_pending_in_topic_by_author(
        &self,
        topic_id: TopicId,
        author_id: UserId,
    ) -> Result<Vec<Post>> {
        Ok(into_posts(
            PendingPostRow::list_in_topic_by_author(topic_id, author_id, &self.pool).await?,
        ))
    }

    async fn save_analysis(&self, record: AnalysisRecord) -> Result<AnalysisRecord> {
        record.upsert(&self.pool).await
    }

    async fn find_analysis(&self, pending_post_id: PostId) -> Result<Option<AnalysisRecord>> {
        AnalysisRecord::find_for_pending_post(pending_post_id, &self.pool).await
    }

    async fn find_analyses(&self, pending_post_ids: &[PostId]) -> Result<Vec<AnalysisRecord>> {
        if pending_post_ids.is_empty() {
            return Ok(Vec::new());
        }
        AnalysisRecord::find_for_pending_posts(pending_post_ids, &self.pool).await
    }

    async fn approve_pending(&self, id: PostId) -> Result<ApproveOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = PendingPostRow::take(id, &mut *tx).await? else {
            return Ok(ApproveOutcome::NotFound);
        };
        let pending: Post = row.into();

        if let Some(parent_id) = pending.parent_post_id {
            if !PublishedPostRow::lock_as_parent(parent_id, pending.topic_id, &mut *tx).await? {
                tx.rollback().await?;
                debug!(pending_post_id = %id, parent_post_id = %parent_id, "parent gone, approval rolled back");
                return Ok(ApproveOutcome::ParentMissing);
            }
        }

        let author_id = pending.author_id;
        let published = pending
            .publish(PostId::new())
            .context("pending row decoded in a non-pending state")?;

        PublishedPostRow::insert(&published, &mut *tx).await?;
        PostApproval::new(id, published.id, author_id)
            .insert(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ApproveOutcome::Published(published))
    }

    async fn reject_pending(&self, id: PostId, reason: &str) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = PendingPostRow::take(id, &mut *tx).await? else {
            return Ok(None);
        };
        let rejected = Post::from(row).reject(reason)?;

        RejectedPostRow::insert(&rejected, &mut *tx).await?;

        tx.commit().await?;
        Ok(Some(rejected))
    }

    async fn find_published(&self, id: PostId) -> Result<Option<Post>> {
        Ok(PublishedPostRow::find_by_id(id, &self.pool).await?.map(Into::into))
    }

    async fn count_top_level_in_topic(&self, topic_id: TopicId) -> Result<i64> {
        PublishedPostRow::count_top_level(topic_id, &self.pool).await
    }

    async fn list_thread_page(
        &self,
        topic_id: TopicId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        Ok(into_posts(
            PublishedPostRow::list_thread_page(topic_id, limit, offset, &self.pool).await?,
        ))
    }

    async fn list_published_by_author(
        &self,
        author_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        Ok(into_posts(
            PublishedPostRow::list_by_author(author_id, limit, offset, &self.pool).await?,
        ))
    }

    async fn count_published_by_author(&self, author_id: UserId) -> Result<i64> {
        PublishedPostRow::count_by_author(author_id, &self.pool).await
    }

    async fn delete_published(&self, id: PostId) -> Result<DeleteOutcome> {
        let mut tx = self.pool.begin().await?;

        let outcome = match PublishedPostRow::lock_for_delete(id, &mut *tx).await? {
            None => DeleteOutcome::NotFound,
            Some(replies) if replies > 0 => DeleteOutcome::HasReplies(replies),
            Some(_) => {
                PublishedPostRow::delete(id, &mut *tx).await?;
                DeleteOutcome::Deleted
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn find_rejected(&self, id: PostId) -> Result<Option<Post>> {
        Ok(RejectedPostRow::find_by_id(id, &self.pool).await?.map(Into::into))
    }

    async fn list_rejected_by_author(&self, author_id: UserId) -> Result<Vec<Post>> {
        Ok(into_posts(
            RejectedPostRow::list_by_author(author_id, &self.pool).await?,
        ))
    }

    async fn find_approval(&self, pending_post_id: PostId) -> Result<Option<PostApproval>> {
        PostApproval::find_by_pending_post(pending_post_id, &self.pool).await
    }
}
