//! Moderation domain - automatic and manual review of submitted posts.
//!
//! The automatic path runs as a background job: analyze the text, store the
//! verdict, and let the policy decide whether to publish, reject, or leave
//! the post for a human.

pub mod actions;
pub mod analyzer;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod policy;

pub use analyzer::ContentAnalyzer;
pub use jobs::{register_jobs, AnalyzePendingPost};
pub use orchestrator::{process_pending_post, ModerationOutcome};
pub use policy::{ModerationPolicy, PolicyAction};
