//! Post entry points - submission and deletion.
//!
//! Actions are self-contained: they take raw input, run the auth checks and
//! validation, and return final models.

use serde::Deserialize;
use tracing::{error, info};

use crate::common::auth::{Capability, CurrentUser};
use crate::common::{ForumError, ForumResult, PostId, TopicId};
use crate::domains::moderation::jobs::schedule_analysis;
use crate::domains::posts::activities::transitions;
use crate::domains::posts::models::Post;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPostInput {
    pub topic_id: TopicId,
    #[serde(default)]
    pub parent_post_id: Option<PostId>,
    pub content: String,
}

/// Store a new submission and queue its automatic moderation.
///
/// Returns as soon as the pending post is stored. Failing to queue the
/// analysis only means the post waits for a human.
pub async fn submit_post(
    input: SubmitPostInput,
    user: &CurrentUser,
    deps: &ServerDeps,
) -> ForumResult<Post> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ForumError::validation("Post content cannot be empty"));
    }

    if deps.store.find_topic(input.topic_id).await?.is_none() {
        return Err(ForumError::not_found(format!(
            "Topic {} not found",
            input.topic_id
        )));
    }

    if let Some(parent_id) = input.parent_post_id {
        let parent = deps
            .store
            .find_published(parent_id)
            .await?
            .ok_or_else(|| ForumError::not_found(format!("Parent post {} not found", parent_id)))?;

        if parent.topic_id != input.topic_id {
            return Err(ForumError::validation(
                "Parent post belongs to a different topic",
            ));
        }
    }

    let post = deps
        .store
        .insert_pending(Post::submitted(
            user.user_id,
            input.topic_id,
            input.parent_post_id,
            content.to_string(),
        ))
        .await?;

    info!(
        pending_post_id = %post.id,
        topic_id = %post.topic_id,
        author_id = %post.author_id,
        "post submitted"
    );

    if let Err(e) = schedule_analysis(post.id, false, deps).await {
        error!(pending_post_id = %post.id, error = %e, "failed to queue moderation");
    }

    Ok(post)
}

/// Delete a published post. Authors may delete their own; moderators any.
pub async fn delete_post(post_id: PostId, user: &CurrentUser, deps: &ServerDeps) -> ForumResult<()> {
    let post = deps
        .store
        .find_published(post_id)
        .await?
        .ok_or_else(|| ForumError::not_found(format!("Post {} not found", post_id)))?;

    user.actor()
        .can(Capability::DeleteAnyPost)
        .or_owner_of(post.author_id)
        .check()?;

    transitions::delete_published(post_id, deps).await
}
