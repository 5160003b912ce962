//! Moderation entry points.
//!
//! Authorization happens here, before any storage access.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::auth::{Capability, CurrentUser};
use crate::common::pagination::Page;
use crate::common::{ForumError, ForumResult, PostId};
use crate::domains::moderation::jobs::schedule_analysis;
use crate::domains::moderation::models::AnalysisRecord;
use crate::domains::posts::activities::transitions;
use crate::domains::posts::models::Post;
use crate::kernel::jobs::{EnqueueResult, Job};
use crate::kernel::ServerDeps;

/// A manual verdict on a pending post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl std::str::FromStr for ModerationAction {
    type Err = ForumError;

    /// Exactly `approve` or `reject`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ModerationAction::Approve),
            "reject" => Ok(ModerationAction::Reject),
            other => Err(ForumError::validation(format!(
                "Invalid action '{}': expected 'approve' or 'reject'",
                other
            ))),
        }
    }
}

/// Approve or reject a pending post by hand. Bypasses analysis.
///
/// Returns the published post (under its new id) or the rejected post.
pub async fn moderate_post(
    pending_post_id: PostId,
    action: &str,
    reason: Option<&str>,
    user: &CurrentUser,
    deps: &ServerDeps,
) -> ForumResult<Post> {
    user.actor().can(Capability::ModeratePosts).check()?;
    let action: ModerationAction = action.parse()?;

    info!(
        pending_post_id = %pending_post_id,
        moderator_id = %user.user_id,
        ?action,
        "manual moderation"
    );

    match action {
        ModerationAction::Approve => transitions::approve(pending_post_id, deps).await,
        ModerationAction::Reject => {
            let reason = reason.unwrap_or_default();
            transitions::reject(pending_post_id, reason, deps).await
        }
    }
}

/// Pending posts, oldest first, each with its analysis if one exists.
pub async fn list_queue(page: Page, user: &CurrentUser, deps: &ServerDeps) -> ForumResult<Vec<Post>> {
    user.actor().can(Capability::ViewModerationQueue).check()?;

    let pending = deps.store.list_pending(page.limit, page.offset).await?;
    let ids: Vec<PostId> = pending.iter().map(|p| p.id).collect();

    let mut analyses: HashMap<PostId, AnalysisRecord> = deps
        .store
        .find_analyses(&ids)
        .await?
        .into_iter()
        .map(|a| (a.pending_post_id, a))
        .collect();

    Ok(pending
        .into_iter()
        .map(|post| {
            let analysis = analyses.remove(&post.id);
            post.with_analysis(analysis)
        })
        .collect())
}

/// The stored analysis for a pending post. Visible to moderators and to the
/// post's author while it is pending.
pub async fn get_analysis(
    pending_post_id: PostId,
    user: &CurrentUser,
    deps: &ServerDeps,
) -> ForumResult<AnalysisRecord> {
    let not_found = || ForumError::not_found(format!("No analysis for post {}", pending_post_id));

    match deps.store.find_pending(pending_post_id).await? {
        Some(pending) => user
            .actor()
            .can(Capability::ViewModerationQueue)
            .or_owner_of(pending.author_id)
            .check()?,
        None => user.actor().can(Capability::ViewModerationQueue).check()?,
    }

    deps.store
        .find_analysis(pending_post_id)
        .await?
        .ok_or_else(not_found)
}

/// Queue a fresh analysis that supersedes the stored one.
pub async fn reanalyze(
    pending_post_id: PostId,
    user: &CurrentUser,
    deps: &ServerDeps,
) -> ForumResult<EnqueueResult> {
    user.actor().can(Capability::ModeratePosts).check()?;

    if deps.store.find_pending(pending_post_id).await?.is_none() {
        return Err(ForumError::not_found(format!(
            "Pending post {} not found",
            pending_post_id
        )));
    }

    let result = schedule_analysis(pending_post_id, true, deps).await?;
    info!(
        pending_post_id = %pending_post_id,
        job_id = %result.job_id(),
        created = result.is_created(),
        "re-analysis requested"
    );
    Ok(result)
}

/// A verdict pushed by an external moderation service.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookVerdict {
    pub pending_post_id: PostId,
    /// `approved` or `rejected`, any case
    pub status: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
    pub status: &'static str,
    pub message: String,
    pub post: Post,
}

const WEBHOOK_DEFAULT_REASON: &str = "Rejected by external moderation";

/// Apply a verdict from an external moderation service.
///
/// The caller proves itself with the configured key instead of a user token.
/// A verdict for a post that is no longer pending is not found, so a repeated
/// delivery changes nothing.
pub async fn moderation_webhook(
    api_key: Option<&str>,
    verdict: WebhookVerdict,
    deps: &ServerDeps,
) -> ForumResult<WebhookReceipt> {
    let Some(expected) = deps.moderation.webhook_key.as_deref() else {
        warn!("moderation webhook called but MODERATION_WEBHOOK_KEY is not set");
        return Err(ForumError::Forbidden("Moderation webhook is disabled".into()));
    };
    match api_key {
        None => return Err(ForumError::Unauthenticated),
        Some(key) if key != expected => {
            warn!(pending_post_id = %verdict.pending_post_id, "moderation webhook key mismatch");
            return Err(ForumError::Unauthenticated);
        }
        Some(_) => {}
    }

    let action = match verdict.status.to_lowercase().as_str() {
        "approved" => ModerationAction::Approve,
        "rejected" => ModerationAction::Reject,
        other => {
            return Err(ForumError::validation(format!(
                "Invalid status '{}': expected 'approved' or 'rejected'",
                other
            )))
        }
    };

    info!(
        pending_post_id = %verdict.pending_post_id,
        ?action,
        confidence = verdict.confidence,
        "external moderation verdict"
    );

    let post = match action {
        ModerationAction::Approve => transitions::approve(verdict.pending_post_id, deps).await?,
        ModerationAction::Reject => {
            let reason = match verdict.feedback.trim() {
                "" => WEBHOOK_DEFAULT_REASON,
                feedback => feedback,
            };
            transitions::reject(verdict.pending_post_id, reason, deps).await?
        }
    };

    Ok(WebhookReceipt {
        status: "success",
        message: format!("Post moderation processed: {}", verdict.status.to_lowercase()),
        post,
    })
}

/// Background jobs recorded for a pending post, newest first.
pub async fn list_jobs(
    pending_post_id: PostId,
    user: &CurrentUser,
    deps: &ServerDeps,
) -> ForumResult<Vec<Job>> {
    user.actor().can(Capability::ViewModerationQueue).check()?;
    Ok(deps
        .job_queue
        .find_by_reference(pending_post_id.into_uuid())
        .await?)
}
