use crate::config::ModerationConfig;
use crate::domains::moderation::models::{AnalysisRecord, ModerationDecision};

/// What the automatic path should do with an analyzed submission.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyAction {
    AutoApprove,
    AutoReject { reason: String },
    DeferToHuman,
}

/// Threshold rules for automatic moderation. Pure; built once from config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModerationPolicy {
    enabled: bool,
    auto_approve_enabled: bool,
    approve_threshold: f64,
    auto_reject_enabled: bool,
    reject_threshold: f64,
}

impl ModerationPolicy {
    pub fn from_config(config: &ModerationConfig) -> Self {
        Self {
            enabled: config.enabled,
            auto_approve_enabled: config.auto_approve_enabled,
            approve_threshold: config.approve_threshold,
            auto_reject_enabled: config.auto_reject_enabled,
            reject_threshold: config.reject_threshold,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Inclusive: a confidence equal to the threshold qualifies.
    pub fn should_auto_approve(&self, confidence: f64) -> bool {
        self.enabled && self.auto_approve_enabled && confidence >= self.approve_threshold
    }

    /// Inclusive: a confidence equal to the threshold qualifies.
    pub fn should_auto_reject(&self, confidence: f64) -> bool {
        self.enabled && self.auto_reject_enabled && confidence >= self.reject_threshold
    }

    /// Combine the analyzer's decision with the thresholds. A confident
    /// verdict only triggers the action it argues for.
    pub fn decide(&self, analysis: &AnalysisRecord) -> PolicyAction {
        match analysis.decision {
            ModerationDecision::Approve if self.should_auto_approve(analysis.confidence) => {
                PolicyAction::AutoApprove
            }
            ModerationDecision::Reject if self.should_auto_reject(analysis.confidence) => {
                PolicyAction::AutoReject {
                    reason: analysis.feedback.clone(),
                }
            }
            _ => PolicyAction::DeferToHuman,
        }
    }
}
