//! Content analyzer: decides whether a piece of text belongs in a debate.
//!
//! Two paths:
//! - a deny-list shortcut that rejects on a trigger substring without any
//!   network call
//! - a structured-output call to the model, constrained by a strict schema
//!
//! `analyze` never fails. Provider errors, malformed JSON and out-of-range
//! values all turn into a safe default verdict (approve at 0.5), which the
//! default thresholds leave for a human.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::domains::moderation::models::{ModerationDecision, Verdict};
use crate::kernel::BaseAI;

/// Confidence reported for a deny-list hit.
pub const DENY_LIST_CONFIDENCE: f64 = 0.9;
/// Confidence reported when the model could not be used.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const SYSTEM_PROMPT: &str = r#"You are the house moderator of a debate forum. You are stern but good-humoured, and you care about the quality of the argument more than about which side it takes.

Decide whether to APPROVE or REJECT the post using these criteria:
1. LOGICAL COHERENCE: the post reasons soundly and avoids obvious fallacies.
2. CIVILITY: disagreement is fine, personal attacks are not.
3. RELEVANCE: the post contributes to the discussion.
4. CLARITY: the post can be understood.

Approve only posts that meet all four. When rejecting, name the criteria that were violated.

Respond with:
- decision: exactly "APPROVED" or "REJECTED"
- confidence: a number between 0 and 1 (higher = more certain)
- analysis: a short evaluation for the moderation team
- feedback: a message addressed to the author, in your moderator voice"#;

/// Reasons the model path did not produce a verdict.
#[derive(Debug, Error)]
enum AnalyzeError {
    #[error("AI provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("malformed AI response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum WireDecision {
    Approved,
    Rejected,
}

/// Exactly the fields the schema asks for; anything else is malformed.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireVerdict {
    decision: WireDecision,
    confidence: f64,
    analysis: String,
    feedback: String,
}

fn verdict_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "decision": { "type": "string", "enum": ["APPROVED", "REJECTED"] },
            "confidence": { "type": "number" },
            "analysis": { "type": "string" },
            "feedback": { "type": "string" }
        },
        "required": ["decision", "confidence", "analysis", "feedback"],
        "additionalProperties": false
    })
}

#[derive(Clone)]
pub struct ContentAnalyzer {
    ai: Arc<dyn BaseAI>,
    deny_list: Vec<String>,
}

impl ContentAnalyzer {
    pub fn new(ai: Arc<dyn BaseAI>, deny_list: Vec<String>) -> Self {
        let deny_list = deny_list
            .into_iter()
            .map(|kw| kw.trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();
        Self { ai, deny_list }
    }

    /// First deny-list entry contained in `text`, case-insensitively.
    pub fn deny_list_hit(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.deny_list
            .iter()
            .find(|kw| lowered.contains(kw.as_str()))
            .map(String::as_str)
    }

    pub async fn analyze(&self, text: &str) -> Verdict {
        let start = Instant::now();

        if let Some(keyword) = self.deny_list_hit(text) {
            info!(keyword, "deny-list hit, skipping AI analysis");
            return Verdict {
                decision: ModerationDecision::Reject,
                confidence: DENY_LIST_CONFIDENCE,
                analysis: format!("Post contains prohibited content: '{}'", keyword),
                feedback: format!(
                    "Your post was rejected because it contains '{}', which is not allowed here. \
                     Make your case with evidence instead.",
                    keyword
                ),
                processing_time_ms: elapsed_ms(start),
            };
        }

        match self.ask_model(text).await {
            Ok(wire) => {
                let decision = match wire.decision {
                    WireDecision::Approved => ModerationDecision::Approve,
                    WireDecision::Rejected => ModerationDecision::Reject,
                };
                info!(%decision, confidence = wire.confidence, "AI analysis complete");
                Verdict {
                    decision,
                    confidence: wire.confidence,
                    analysis: wire.analysis,
                    feedback: wire.feedback,
                    processing_time_ms: elapsed_ms(start),
                }
            }
            Err(e) => {
                warn!(error = %e, "AI analysis failed, using fallback verdict");
                Verdict {
                    decision: ModerationDecision::Approve,
                    confidence: FALLBACK_CONFIDENCE,
                    analysis: format!("Automatic analysis failed: {}", e),
                    feedback: "We could not review your post automatically due to technical \
                               difficulties. A moderator will take a look."
                        .to_string(),
                    processing_time_ms: elapsed_ms(start),
                }
            }
        }
    }

    async fn ask_model(&self, text: &str) -> Result<WireVerdict, AnalyzeError> {
        let user_prompt = format!("Evaluate the following post.\n\n---\n{}\n---", text);

        let raw = self
            .ai
            .generate_structured(SYSTEM_PROMPT, &user_prompt, verdict_schema())
            .await?;

        let wire: WireVerdict = serde_json::from_str(&raw)?;

        if !wire.confidence.is_finite() || !(0.0..=1.0).contains(&wire.confidence) {
            return Err(AnalyzeError::ConfidenceOutOfRange(wire.confidence));
        }

        Ok(wire)
    }
}

fn elapsed_ms(start: Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}
