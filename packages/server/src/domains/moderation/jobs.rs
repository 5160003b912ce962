//! Background jobs for the moderation domain.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::common::PostId;
use crate::domains::moderation::orchestrator::{process_pending_post, ModerationOutcome};
use crate::kernel::jobs::{enqueue_command, CommandMeta, EnqueueResult, JobRegistry};
use crate::kernel::ServerDeps;

/// Analyze one pending post and apply the moderation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzePendingPost {
    pub pending_post_id: PostId,
    /// Ignore a stored analysis and ask the analyzer again
    #[serde(default)]
    pub force: bool,
}

impl AnalyzePendingPost {
    pub const JOB_TYPE: &'static str = "moderation:analyze_post";

    pub fn new(pending_post_id: PostId) -> Self {
        Self {
            pending_post_id,
            force: false,
        }
    }

    pub fn forced(pending_post_id: PostId) -> Self {
        Self {
            pending_post_id,
            force: true,
        }
    }
}

impl CommandMeta for AnalyzePendingPost {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    /// One active job per pending post and mode. A forced run gets its own
    /// key so it is not swallowed by a queued regular run.
    fn idempotency_key(&self) -> Option<String> {
        if self.force {
            Some(format!("moderate-post:{}:forced", self.pending_post_id))
        } else {
            Some(format!("moderate-post:{}", self.pending_post_id))
        }
    }

    fn reference_id(&self) -> Option<Uuid> {
        Some(self.pending_post_id.into_uuid())
    }
}

/// Queue automatic moderation for a pending post.
pub async fn schedule_analysis(
    pending_post_id: PostId,
    force: bool,
    deps: &ServerDeps,
) -> Result<EnqueueResult> {
    let command = if force {
        AnalyzePendingPost::forced(pending_post_id)
    } else {
        AnalyzePendingPost::new(pending_post_id)
    };
    enqueue_command(deps.job_queue.as_ref(), &command).await
}

async fn handle_analyze_pending_post(job: AnalyzePendingPost, deps: Arc<ServerDeps>) -> Result<()> {
    let outcome = process_pending_post(job.pending_post_id, job.force, &deps).await?;

    match &outcome {
        ModerationOutcome::AutoApproved { post_id } => {
            info!(pending_post_id = %job.pending_post_id, post_id = %post_id, "auto-approved")
        }
        ModerationOutcome::AutoRejected { .. } => {
            info!(pending_post_id = %job.pending_post_id, "auto-rejected")
        }
        ModerationOutcome::AwaitingManual { analysis } => info!(
            pending_post_id = %job.pending_post_id,
            confidence = analysis.confidence,
            "left for manual review"
        ),
        ModerationOutcome::Disabled | ModerationOutcome::AlreadyHandled => {}
    }

    Ok(())
}

/// Register every moderation job type.
pub fn register_jobs(registry: &mut JobRegistry) {
    registry.register::<AnalyzePendingPost, _, _>(
        AnalyzePendingPost::JOB_TYPE,
        handle_analyze_pending_post,
    );
}
