// TestDependencies - mock implementations for testing
//
// Provides in-memory services that can be injected into ServerDeps for tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::jobs::testing::InMemoryJobQueue;
use super::{ApproveOutcome, BaseAI, BasePostStore, DeleteOutcome, ServerDeps};
use crate::common::{PostId, TopicId, UserId};
use crate::config::ModerationConfig;
use crate::domains::auth::JwtService;
use crate::domains::moderation::models::AnalysisRecord;
use crate::domains::posts::models::{Post, PostApproval, PostState};
use crate::domains::topics::Topic;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Mock AI (Structured LLM output)
// =============================================================================

/// Arguments captured from a structured output call
#[derive(Debug, Clone)]
pub struct AICall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub schema: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct MockAI {
    responses: Arc<Mutex<Vec<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<AICall>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw response to the queue
    pub fn with_response(self, response: impl Into<String>) -> Self {
        lock(&self.responses).push(Ok(response.into()));
        self
    }

    /// Add a JSON verdict in the shape the analyzer requests
    pub fn with_verdict(self, decision: &str, confidence: f64) -> Self {
        let body = serde_json::json!({
            "decision": decision,
            "confidence": confidence,
            "analysis": format!("Mock analysis: {}", decision),
            "feedback": format!("Mock feedback: {}", decision),
        });
        self.with_response(body.to_string())
    }

    /// Queue a provider failure
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.responses).push(Err(message.into()));
        self
    }

    /// Get all calls made to the mock
    pub fn calls(&self) -> Vec<AICall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        // Record the call
        lock(&self.calls).push(AICall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            schema,
        });

        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            return Err(anyhow!("MockAI has no queued response"));
        }
        responses.remove(0).map_err(|message| anyhow!(message))
    }
}

// =============================================================================
// In-memory Post Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    topics: HashMap<TopicId, Topic>,
    pending: Vec<Post>,
    published: Vec<Post>,
    rejected: Vec<Post>,
    analyses: HashMap<PostId, AnalysisRecord>,
    approvals: Vec<PostApproval>,
}

impl StoreState {
    fn reply_count(&self, id: PostId) -> i64 {
        self.published
            .iter()
            .filter(|p| p.parent_post_id == Some(id))
            .count() as i64
    }

    /// Published posts carry a live reply count, like the SQL view.
    fn with_reply_count(&self, mut post: Post) -> Post {
        post.state = PostState::Published {
            reply_count: self.reply_count(post.id),
        };
        post
    }

    fn take_pending(&mut self, id: PostId) -> Option<Post> {
        let index = self.pending.iter().position(|p| p.id == id)?;
        Some(self.pending.remove(index))
    }
}

/// Store with the same transition rules as Postgres. One mutex guards every
/// table, so each transition is atomic.
#[derive(Clone, Default)]
pub struct InMemoryPostStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn published_count(&self) -> usize {
        lock(&self.state).published.len()
    }

    pub fn rejected_count(&self) -> usize {
        lock(&self.state).rejected.len()
    }

    pub fn analysis_count(&self) -> usize {
        lock(&self.state).analyses.len()
    }

    /// Seed a published post directly, bypassing moderation.
    pub fn seed_published(&self, post: Post) -> Post {
        let mut state = lock(&self.state);
        let post = Post {
            state: PostState::Published { reply_count: 0 },
            ..post
        };
        state.published.push(post.clone());
        post
    }
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    posts
}

fn oldest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    posts
}

#[async_trait]
impl BasePostStore for InMemoryPostStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(lock(&self.state).topics.get(&id).cloned())
    }

    async fn insert_topic(&self, topic: Topic) -> Result<Topic> {
        lock(&self.state).topics.insert(topic.id, topic.clone());
        Ok(topic)
    }

    async fn delete_topic(&self, id: TopicId) -> Result<bool> {
        let mut state = lock(&self.state);
        if state.topics.remove(&id).is_none() {
            return Ok(false);
        }

        let removed_pending: Vec<PostId> = state
            .pending
            .iter()
            .filter(|p| p.topic_id == id)
            .map(|p| p.id)
            .collect();
        for pending_id in removed_pending {
            state.analyses.remove(&pending_id);
        }

        state.pending.retain(|p| p.topic_id != id);
        state.rejected.retain(|p| p.topic_id != id);

        let removed_published: Vec<PostId> = state
            .published
            .iter()
            .filter(|p| p.topic_id == id)
            .map(|p| p.id)
            .collect();
        state.published.retain(|p| p.topic_id != id);
        state
            .approvals
            .retain(|a| !removed_published.contains(&a.post_id));

        Ok(true)
    }

    async fn insert_pending(&self, post: Post) -> Result<Post> {
        let mut state = lock(&self.state);
        if !state.topics.contains_key(&post.topic_id) {
            return Err(anyhow!("topic {} does not exist", post.topic_id));
        }
        state.pending.push(post.clone());
        Ok(post)
    }

    async fn find_pending(&self, id: PostId) -> Result<Option<Post>> {
        Ok(lock(&self.state).pending.iter().find(|p| p.id == id).cloned())
    }

    async fn list_pending(&self, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let state = lock(&self.state);
        Ok(oldest_first(state.pending.clone())
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_pending_by_author(&self, author_id: UserId) -> Result<Vec<Post>> {
        let state = lock(&self.state);
        Ok(newest_first(
            state
                .pending
                .iter()
                .filter(|p| p.author_id == author_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_pending_in_topic_by_author(
        &self,
        topic_id: TopicId,
        author_id: UserId,
    ) -> Result<Vec<Post>> {
        let state = lock(&self.state);
        Ok(oldest_first(
            state
                .pending
                .iter()
                .filter(|p| p.topic_id == topic_id && p.author_id == author_id)
                .cloned()
                .collect(),
        ))
    }

    async fn save_analysis(&self, record: AnalysisRecord) -> Result<AnalysisRecord> {
        if !(0.0..=1.0).contains(&record.confidence) {
            return Err(anyhow!("confidence {} out of range", record.confidence));
        }
        lock(&self.state)
            .analyses
            .insert(record.pending_post_id, record.clone());
        Ok(record)
    }

    async fn find_analysis(&self, pending_post_id: PostId) -> Result<Option<AnalysisRecord>> {
        Ok(lock(&self.state).analyses.get(&pending_post_id).cloned())
    }

    async fn find_analyses(&self, pending_post_ids: &[PostId]) -> Result<Vec<AnalysisRecord>> {
        let state = lock(&self.state);
        Ok(pending_post_ids
            .iter()
            .filter_map(|id| state.analyses.get(id).cloned())
            .collect())
    }

    async fn approve_pending(&self, id: PostId) -> Result<ApproveOutcome> {
        let mut state = lock(&self.state);

        let Some(pending) = state.pending.iter().find(|p| p.id == id).cloned() else {
            return Ok(ApproveOutcome::NotFound);
        };

        if let Some(parent_id) = pending.parent_post_id {
            let parent_live = state
                .published
                .iter()
                .any(|p| p.id == parent_id && p.topic_id == pending.topic_id);
            if !parent_live {
                return Ok(ApproveOutcome::ParentMissing);
            }
        }

        let pending = state
            .take_pending(id)
            .ok_or_else(|| anyhow!("pending post {} vanished under lock", id))?;
        let author_id = pending.author_id;
        let published = pending.publish(PostId::new())?;

        state.published.push(published.clone());
        state
            .approvals
            .push(PostApproval::new(id, published.id, author_id));

        Ok(ApproveOutcome::Published(published))
    }

    async fn reject_pending(&self, id: PostId, reason: &str) -> Result<Option<Post>> {
        let mut state = lock(&self.state);

        let Some(pending) = state.pending.iter().find(|p| p.id == id).cloned() else {
            return Ok(None);
        };
        let rejected = pending.reject(reason)?;

        state.take_pending(id);
        state.rejected.push(rejected.clone());
        Ok(Some(rejected))
    }

    async fn find_published(&self, id: PostId) -> Result<Option<Post>> {
        let state = lock(&self.state);
        Ok(state
            .published
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .map(|p| state.with_reply_count(p)))
    }

    async fn count_top_level_in_topic(&self, topic_id: TopicId) -> Result<i64> {
        let state = lock(&self.state);
        Ok(state
            .published
            .iter()
            .filter(|p| p.topic_id == topic_id && p.parent_post_id.is_none())
            .count() as i64)
    }

    async fn list_thread_page(
        &self,
        topic_id: TopicId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let state = lock(&self.state);
        let roots: Vec<Post> = state
            .published
            .iter()
            .filter(|p| p.topic_id == topic_id && p.parent_post_id.is_none())
            .cloned()
            .collect();

        let mut thread: Vec<Post> = oldest_first(roots)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        let mut frontier: HashSet<PostId> = thread.iter().map(|p| p.id).collect();
        while !frontier.is_empty() {
            let replies: Vec<Post> = state
                .published
                .iter()
                .filter(|p| p.parent_post_id.is_some_and(|parent| frontier.contains(&parent)))
                .cloned()
                .collect();
            frontier = replies.iter().map(|p| p.id).collect();
            thread.extend(replies);
        }

        let thread = thread.into_iter().map(|p| state.with_reply_count(p)).collect();
        Ok(oldest_first(thread))
    }

    async fn list_published_by_author(
        &self,
        author_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let state = lock(&self.state);
        let posts = state
            .published
            .iter()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .map(|p| state.with_reply_count(p))
            .collect();
        Ok(newest_first(posts)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_published_by_author(&self, author_id: UserId) -> Result<i64> {
        let state = lock(&self.state);
        Ok(state
            .published
            .iter()
            .filter(|p| p.author_id == author_id)
            .count() as i64)
    }

    async fn delete_published(&self, id: PostId) -> Result<DeleteOutcome> {
        let mut state = lock(&self.state);

        let Some(index) = state.published.iter().position(|p| p.id == id) else {
            return Ok(DeleteOutcome::NotFound);
        };

        let replies = state.reply_count(id);
        if replies > 0 {
            return Ok(DeleteOutcome::HasReplies(replies));
        }

        state.published.remove(index);
        state.approvals.retain(|a| a.post_id != id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn find_rejected(&self, id: PostId) -> Result<Option<Post>> {
        Ok(lock(&self.state).rejected.iter().find(|p| p.id == id).cloned())
    }

    async fn list_rejected_by_author(&self, author_id: UserId) -> Result<Vec<Post>> {
        let state = lock(&self.state);
        Ok(newest_first(
            state
                .rejected
                .iter()
                .filter(|p| p.author_id == author_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_approval(&self, pending_post_id: PostId) -> Result<Option<PostApproval>> {
        Ok(lock(&self.state)
            .approvals
            .iter()
            .find(|a| a.pending_post_id == pending_post_id)
            .cloned())
    }
}

// =============================================================================
// TestDependencies builder
// =============================================================================

pub const TEST_JWT_SECRET: &str = "test_secret_key";
pub const TEST_JWT_ISSUER: &str = "forum-test";

/// Builder for ServerDeps wired with in-memory services.
pub struct TestDependencies {
    pub store: InMemoryPostStore,
    pub ai: MockAI,
    pub job_queue: InMemoryJobQueue,
    pub moderation: ModerationConfig,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: InMemoryPostStore::new(),
            ai: MockAI::new(),
            job_queue: InMemoryJobQueue::new(),
            moderation: ModerationConfig::default(),
        }
    }

    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = ai;
        self
    }

    pub fn moderation(mut self, config: ModerationConfig) -> Self {
        self.moderation = config;
        self
    }

    pub fn into_deps(self) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            Arc::new(self.store),
            Arc::new(self.ai),
            Arc::new(self.job_queue),
            Arc::new(JwtService::new(TEST_JWT_SECRET, TEST_JWT_ISSUER.to_string())),
            self.moderation,
        ))
    }
}
