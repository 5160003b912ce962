//! Job registry for deserializing and executing jobs.
//!
//! The registry maps job type strings (e.g., "moderation:analyze_post") to
//! handlers that reconstruct the typed command from JSON and run it.
//!
//! This allows the JobRunner to claim jobs from the database and dispatch
//! them to the appropriate domain handlers without knowing the concrete types.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;

use super::queue::{ClaimedJob, CommandMeta};
use crate::kernel::ServerDeps;

/// Type alias for the async handler function.
///
/// Handlers take the JSON payload and ServerDeps and return a Result.
type BoxedHandler = Box<
    dyn Fn(serde_json::Value, Arc<ServerDeps>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Why a registered handler could not run a job.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("invalid payload for {job_type}: {message}")]
    InvalidPayload { job_type: String, message: String },
}

/// Registry that maps job type strings to handlers.
///
/// Each domain registers its job types at startup.
///
/// # Example
///
/// ```ignore
/// let mut registry = JobRegistry::new();
///
/// registry.register::<AnalyzePendingPost, _, _>(
///     AnalyzePendingPost::JOB_TYPE,
///     |job, deps| async move {
///         process_pending_post(job.pending_post_id, job.force, &deps).await?;
///         Ok(())
///     },
/// );
///
/// // Later, in JobRunner
/// registry.execute(&claimed_job, deps.clone()).await?;
/// ```
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, BoxedHandler>,
}

impl JobRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a job type with its handler.
    pub fn register<J, F, Fut>(&mut self, job_type: &'static str, handler: F)
    where
        J: CommandMeta + DeserializeOwned + Send + Sync + 'static,
        F: Fn(J, Arc<ServerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let boxed_handler: BoxedHandler = Box::new(move |value, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let job: J =
                    serde_json::from_value(value).map_err(|e| DispatchError::InvalidPayload {
                        job_type: job_type.to_string(),
                        message: e.to_string(),
                    })?;
                handler(job, deps).await
            })
        });

        self.handlers.insert(job_type, boxed_handler);
    }

    /// Execute a claimed job using its registered handler.
    ///
    /// Unknown types and undecodable payloads surface as [`DispatchError`].
    pub async fn execute(&self, job: &ClaimedJob, deps: Arc<ServerDeps>) -> Result<()> {
        let job_type = job.command_type();
        let handler = self
            .handlers
            .get(job_type)
            .ok_or_else(|| DispatchError::UnknownJobType(job_type.to_string()))?;

        handler(job.job.args.clone(), deps).await
    }

    /// Check if a job type is registered.
    pub fn is_registered(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get all registered job types.
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedJobRegistry = Arc<JobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestJob {
        pub id: Uuid,
        pub name: String,
    }

    impl CommandMeta for TestJob {
        fn command_type(&self) -> &'static str {
            "test_job"
        }
    }

    #[test]
    fn test_register_and_check() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _, _>("test_job", |_job, _deps| async move { Ok(()) });

        assert!(registry.is_registered("test_job"));
        assert!(!registry.is_registered("unknown_job"));
    }

    #[test]
    fn test_registered_types() {
        let mut registry = JobRegistry::new();
        registry.register::<TestJob, _, _>("test_job", |_job, _deps| async move { Ok(()) });

        let types = registry.registered_types();
        assert!(types.contains(&"test_job"));
    }
}
