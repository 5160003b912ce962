// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Moderation rules live in domains/moderation; these traits only move text to
// the model and rows to storage.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BasePostStore)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{PostId, TopicId, UserId};
use crate::domains::moderation::models::AnalysisRecord;
use crate::domains::posts::models::{Post, PostApproval};
use crate::domains::topics::Topic;

// =============================================================================
// AI Trait (Infrastructure - structured LLM output)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Generate structured output with a JSON schema.
    /// Returns a JSON string; parse with serde_json in calling code.
    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String>;
}

// =============================================================================
// Post Store Trait (Infrastructure - persistence for every post state)
// =============================================================================

/// Result of moving a pending post to the published table.
#[derive(Debug, Clone, PartialEq)]
pub enum ApproveOutcome {
    Published(Post),
    /// The pending post was already gone (moderated by someone else).
    NotFound,
    /// The post it replies to is no longer published; nothing was changed.
    ParentMissing,
}

/// Result of deleting a published post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    HasReplies(i64),
    NotFound,
}

#[async_trait]
pub trait BasePostStore: Send + Sync {
    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<()>;

    // Topics
    async fn find_topic(&self, id: TopicId) -> Result<Option<Topic>>;
    async fn insert_topic(&self, topic: Topic) -> Result<Topic>;
    /// Delete a topic together with every post in it. False if it did not exist.
    async fn delete_topic(&self, id: TopicId) -> Result<bool>;

    // Pending posts
    async fn insert_pending(&self, post: Post) -> Result<Post>;
    async fn find_pending(&self, id: PostId) -> Result<Option<Post>>;
    /// Oldest first.
    async fn list_pending(&self, limit: i64, offset: i64) -> Result<Vec<Post>>;
    /// Newest first.
    async fn list_pending_by_author(&self, author_id: UserId) -> Result<Vec<Post>>;
    /// Oldest first.
    async fn list_pending_in_topic_by_author(
        &self,
        topic_id: TopicId,
        author_id: UserId,
    ) -> Result<Vec<Post>>;

    // Analyses
    /// Insert or supersede the analysis for `record.pending_post_id`.
    async fn save_analysis(&self, record: AnalysisRecord) -> Result<AnalysisRecord>;
    async fn find_analysis(&self, pending_post_id: PostId) -> Result<Option<AnalysisRecord>>;
    async fn find_analyses(&self, pending_post_ids: &[PostId]) -> Result<Vec<AnalysisRecord>>;

    // Transitions. Each is atomic; of two concurrent calls for the same id at
    // most one observes the pending post.
    async fn approve_pending(&self, id: PostId) -> Result<ApproveOutcome>;
    /// `None` when the pending post was already gone.
    async fn reject_pending(&self, id: PostId, reason: &str) -> Result<Option<Post>>;

    // Published posts
    async fn find_published(&self, id: PostId) -> Result<Option<Post>>;
    async fn count_top_level_in_topic(&self, topic_id: TopicId) -> Result<i64>;
    /// One page of top-level posts together with every reply below them,
    /// in thread order (oldest first). Limit and offset count top-level
    /// posts only.
    async fn list_thread_page(&self, topic_id: TopicId, limit: i64, offset: i64)
        -> Result<Vec<Post>>;
    /// Newest first.
    async fn list_published_by_author(
        &self,
        author_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>>;
    async fn count_published_by_author(&self, author_id: UserId) -> Result<i64>;
    /// Delete a post only if nothing replies to it.
    async fn delete_published(&self, id: PostId) -> Result<DeleteOutcome>;

    // Rejected posts
    async fn find_rejected(&self, id: PostId) -> Result<Option<Post>>;
    /// Newest first.
    async fn list_rejected_by_author(&self, author_id: UserId) -> Result<Vec<Post>>;

    // Approval events
    async fn find_approval(&self, pending_post_id: PostId) -> Result<Option<PostApproval>>;
}
