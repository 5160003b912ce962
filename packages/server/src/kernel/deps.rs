//! Server dependencies for actions and jobs (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! entry points. All external services use trait abstractions to enable testing.

use std::sync::Arc;

use crate::config::ModerationConfig;
use crate::domains::auth::JwtService;
use crate::domains::moderation::{ContentAnalyzer, ModerationPolicy};
use crate::kernel::jobs::JobQueue;
use crate::kernel::{BaseAI, BasePostStore};

/// Server dependencies accessible to actions (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BasePostStore>,
    /// Structured-output model used by the content analyzer
    pub ai: Arc<dyn BaseAI>,
    pub job_queue: Arc<dyn JobQueue>,
    /// JWT service for token verification (and creation in tests)
    pub jwt_service: Arc<JwtService>,
    pub moderation: ModerationConfig,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BasePostStore>,
        ai: Arc<dyn BaseAI>,
        job_queue: Arc<dyn JobQueue>,
        jwt_service: Arc<JwtService>,
        moderation: ModerationConfig,
    ) -> Self {
        Self {
            store,
            ai,
            job_queue,
            jwt_service,
            moderation,
        }
    }

    pub fn analyzer(&self) -> ContentAnalyzer {
        ContentAnalyzer::new(self.ai.clone(), self.moderation.deny_list.clone())
    }

    pub fn policy(&self) -> ModerationPolicy {
        ModerationPolicy::from_config(&self.moderation)
    }
}
