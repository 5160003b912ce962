//! Automatic moderation of a single pending post.
//!
//! Runs off the request path, inside the `moderation:analyze_post` job.
//! Losing a race against a human moderator is not an error: the post is
//! simply reported as already handled.

use tracing::{info, warn};

use crate::common::{ForumError, ForumResult, PostId};
use crate::domains::moderation::models::AnalysisRecord;
use crate::domains::moderation::policy::PolicyAction;
use crate::domains::posts::activities::transitions;
use crate::kernel::ServerDeps;

/// How one run of the automatic path ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ModerationOutcome {
    /// Moderation is switched off; nothing was analyzed.
    Disabled,
    /// The post left the pending set before the automatic path could act.
    AlreadyHandled,
    AutoApproved { post_id: PostId },
    AutoRejected { reason: String },
    /// The analysis is stored and the post waits for a human.
    AwaitingManual { analysis: AnalysisRecord },
}

/// Analyze a pending post and apply the policy to the verdict.
///
/// An existing analysis is reused unless `force` is set, so a retried job
/// does not pay for a second model call.
pub async fn process_pending_post(
    pending_post_id: PostId,
    force: bool,
    deps: &ServerDeps,
) -> ForumResult<ModerationOutcome> {
    let policy = deps.policy();
    if !policy.is_enabled() {
        info!(pending_post_id = %pending_post_id, "moderation disabled, leaving post for manual review");
        return Ok(ModerationOutcome::Disabled);
    }

    let Some(pending) = deps.store.find_pending(pending_post_id).await? else {
        info!(pending_post_id = %pending_post_id, "pending post already handled");
        return Ok(ModerationOutcome::AlreadyHandled);
    };

    let existing = if force {
        None
    } else {
        deps.store.find_analysis(pending_post_id).await?
    };

    let analysis = match existing {
        Some(record) => record,
        None => {
            let verdict = deps.analyzer().analyze(&pending.content).await;
            deps.store
                .save_analysis(AnalysisRecord::from_verdict(pending_post_id, verdict))
                .await?
        }
    };

    info!(
        pending_post_id = %pending_post_id,
        decision = %analysis.decision,
        confidence = analysis.confidence,
        "analysis stored"
    );

    match policy.decide(&analysis) {
        PolicyAction::AutoApprove => match transitions::approve(pending_post_id, deps).await {
            Ok(post) => Ok(ModerationOutcome::AutoApproved { post_id: post.id }),
            Err(ForumError::NotFound(_)) => Ok(ModerationOutcome::AlreadyHandled),
            Err(ForumError::Validation(reason)) => {
                warn!(pending_post_id = %pending_post_id, %reason, "auto-approve refused");
                Ok(ModerationOutcome::AwaitingManual { analysis })
            }
            Err(e) => Err(e),
        },
        PolicyAction::AutoReject { reason } => {
            match transitions::reject(pending_post_id, &reason, deps).await {
                Ok(_) => Ok(ModerationOutcome::AutoRejected { reason }),
                Err(ForumError::NotFound(_)) => Ok(ModerationOutcome::AlreadyHandled),
                Err(ForumError::Validation(reason)) => {
                    warn!(pending_post_id = %pending_post_id, %reason, "auto-reject refused");
                    Ok(ModerationOutcome::AwaitingManual { analysis })
                }
                Err(e) => Err(e),
            }
        }
        PolicyAction::DeferToHuman => Ok(ModerationOutcome::AwaitingManual { analysis }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserId;
    use crate::config::ModerationConfig;
    use crate::domains::moderation::models::ModerationDecision;
    use crate::domains::posts::models::Post;
    use crate::domains::topics::Topic;
    use crate::kernel::{InMemoryPostStore, MockAI, TestDependencies};
    use std::sync::Arc;

    fn enabled() -> ModerationConfig {
        ModerationConfig {
            enabled: true,
            auto_approve_enabled: true,
            auto_reject_enabled: true,
            ..ModerationConfig::default()
        }
    }

    async fn setup(
        ai: MockAI,
        config: ModerationConfig,
        content: &str,
    ) -> (Arc<ServerDeps>, InMemoryPostStore, Post) {
        let test_deps = TestDependencies::new().mock_ai(ai).moderation(config);
        let store = test_deps.store.clone();
        let deps = test_deps.into_deps();
        let topic = deps
            .store
            .insert_topic(Topic::new("Debate", None, UserId::new()))
            .await
            .unwrap();
        let pending = deps
            .store
            .insert_pending(Post::submitted(UserId::new(), topic.id, None, content.into()))
            .await
            .unwrap();
        (deps, store, pending)
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let ai = MockAI::new().with_verdict("APPROVED", 0.99);
        let (deps, store, pending) =
            setup(ai.clone(), ModerationConfig::default(), "A fine argument").await;

        let outcome = process_pending_post(pending.id, false, &deps).await.unwrap();

        assert_eq!(outcome, ModerationOutcome::Disabled);
        assert_eq!(ai.call_count(), 0);
        assert_eq!(store.analysis_count(), 0);
        assert_eq!(store.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_confident_approval_publishes() {
        let (deps, store, pending) = setup(
            MockAI::new().with_verdict("APPROVED", 0.95),
            enabled(),
            "A fine argument",
        )
        .await;

        let outcome = process_pending_post(pending.id, false, &deps).await.unwrap();

        assert!(matches!(outcome, ModerationOutcome::AutoApproved { .. }));
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.published_count(), 1);
    }

    #[tokio::test]
    async fn test_deny_list_rejects_at_default_threshold() {
        let ai = MockAI::new();
        let (deps, store, pending) =
            setup(ai.clone(), enabled(), "This is all propaganda").await;

        let outcome = process_pending_post(pending.id, false, &deps).await.unwrap();

        match outcome {
            ModerationOutcome::AutoRejected { reason } => assert!(reason.contains("propaganda")),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(ai.call_count(), 0);
        assert_eq!(store.rejected_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_verdict_waits_for_human() {
        let (deps, store, pending) = setup(
            MockAI::new().with_failure("timeout"),
            enabled(),
            "A fine argument",
        )
        .await;

        let outcome = process_pending_post(pending.id, false, &deps).await.unwrap();

        match outcome {
            ModerationOutcome::AwaitingManual { analysis } => {
                assert_eq!(analysis.decision, ModerationDecision::Approve);
                assert_eq!(analysis.confidence, 0.5);
            }
            other => panic!("expected manual review, got {:?}", other),
        }
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.analysis_count(), 1);
    }

    #[tokio::test]
    async fn test_analysis_is_reused_unless_forced() {
        let ai = MockAI::new()
            .with_verdict("APPROVED", 0.3)
            .with_verdict("APPROVED", 0.9);
        let (deps, _store, pending) = setup(ai.clone(), enabled(), "A fine argument").await;

        let first = process_pending_post(pending.id, false, &deps).await.unwrap();
        assert!(matches!(first, ModerationOutcome::AwaitingManual { .. }));

        let second = process_pending_post(pending.id, false, &deps).await.unwrap();
        assert!(matches!(second, ModerationOutcome::AwaitingManual { .. }));
        assert_eq!(ai.call_count(), 1);

        let forced = process_pending_post(pending.id, true, &deps).await.unwrap();
        assert!(matches!(forced, ModerationOutcome::AutoApproved { .. }));
        assert_eq!(ai.call_count(), 2);
    }

    #[tokio::test]
    async fn test_manual_decision_first_means_already_handled() {
        let ai = MockAI::new().with_verdict("APPROVED", 0.95);
        let (deps, store, pending) = setup(ai.clone(), enabled(), "A fine argument").await;

        transitions::reject(pending.id, "moderator got there first", &deps)
            .await
            .unwrap();

        let outcome = process_pending_post(pending.id, false, &deps).await.unwrap();

        assert_eq!(outcome, ModerationOutcome::AlreadyHandled);
        assert_eq!(ai.call_count(), 0);
        assert_eq!(store.published_count(), 0);
    }
}
