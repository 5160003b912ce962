//! State transitions for submissions and published posts.
//!
//! Storage performs each move atomically; these functions translate the
//! storage outcome into domain errors. A second transition of the same
//! pending post always observes `NotFound`.

use tracing::info;

use crate::common::{ForumError, ForumResult, PostId, TopicId};
use crate::domains::posts::models::Post;
use crate::kernel::{ApproveOutcome, DeleteOutcome, ServerDeps};

/// Publish a pending post under a new id and record the approval event.
pub async fn approve(pending_post_id: PostId, deps: &ServerDeps) -> ForumResult<Post> {
    match deps.store.approve_pending(pending_post_id).await? {
        ApproveOutcome::Published(post) => {
            info!(pending_post_id = %pending_post_id, post_id = %post.id, "pending post published");
            Ok(post)
        }
        ApproveOutcome::NotFound => Err(ForumError::not_found(format!(
            "Pending post {} not found",
            pending_post_id
        ))),
        ApproveOutcome::ParentMissing => Err(ForumError::validation(
            "The post this replies to no longer exists",
        )),
    }
}

/// Move a pending post to the rejected set. The reason is mandatory.
pub async fn reject(pending_post_id: PostId, reason: &str, deps: &ServerDeps) -> ForumResult<Post> {
    if reason.trim().is_empty() {
        return Err(ForumError::validation("A rejection needs a reason"));
    }

    match deps.store.reject_pending(pending_post_id, reason).await? {
        Some(post) => {
            info!(pending_post_id = %pending_post_id, "pending post rejected");
            Ok(post)
        }
        None => Err(ForumError::not_found(format!(
            "Pending post {} not found",
            pending_post_id
        ))),
    }
}

/// Delete a published post. Refused while anything replies to it.
pub async fn delete_published(post_id: PostId, deps: &ServerDeps) -> ForumResult<()> {
    match deps.store.delete_published(post_id).await? {
        DeleteOutcome::Deleted => {
            info!(post_id = %post_id, "post deleted");
            Ok(())
        }
        DeleteOutcome::HasReplies(count) => Err(ForumError::validation(format!(
            "Cannot delete post as it has {} {}",
            count,
            if count == 1 { "reply" } else { "replies" }
        ))),
        DeleteOutcome::NotFound => Err(ForumError::not_found(format!("Post {} not found", post_id))),
    }
}

/// Delete a topic with every post in it, in any state.
pub async fn delete_topic(topic_id: TopicId, deps: &ServerDeps) -> ForumResult<()> {
    if deps.store.delete_topic(topic_id).await? {
        info!(topic_id = %topic_id, "topic deleted");
        Ok(())
    } else {
        Err(ForumError::not_found(format!("Topic {} not found", topic_id)))
    }
}
