//! In-memory test harness.
//!
//! Wires the real router, actions and job runner to the in-memory store,
//! queue and a scripted AI. Background jobs only run when a test drains them.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use forum_core::common::auth::{CurrentUser, UserRole};
use forum_core::common::UserId;
use forum_core::config::ModerationConfig;
use forum_core::domains::moderation::register_jobs;
use forum_core::domains::topics::Topic;
use forum_core::kernel::jobs::testing::InMemoryJobQueue;
use forum_core::kernel::jobs::{JobRegistry, JobRunner, JobRunnerConfig};
use forum_core::kernel::{InMemoryPostStore, MockAI, ServerDeps, TestDependencies};
use forum_core::server::build_app;
use serde_json::Value;
use tower::ServiceExt;

/// Moderation on, both automatic actions on, default thresholds.
pub fn moderation_enabled() -> ModerationConfig {
    ModerationConfig {
        enabled: true,
        auto_approve_enabled: true,
        auto_reject_enabled: true,
        ..ModerationConfig::default()
    }
}

pub struct TestHarness {
    pub deps: Arc<ServerDeps>,
    pub store: InMemoryPostStore,
    pub queue: InMemoryJobQueue,
    pub ai: MockAI,
    runner: JobRunner,
}

impl TestHarness {
    pub fn new(moderation: ModerationConfig, ai: MockAI) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let test_deps = TestDependencies::new().mock_ai(ai.clone()).moderation(moderation);
        let store = test_deps.store.clone();
        let queue = test_deps.job_queue.clone();
        let deps = test_deps.into_deps();

        let mut registry = JobRegistry::new();
        register_jobs(&mut registry);
        let runner = JobRunner::with_config(
            Arc::new(queue.clone()),
            Arc::new(registry),
            deps.clone(),
            JobRunnerConfig::with_worker_id("test-runner"),
        );

        Self {
            deps,
            store,
            queue,
            ai,
            runner,
        }
    }

    /// Moderation disabled; the AI is never consulted.
    pub fn manual() -> Self {
        Self::new(ModerationConfig::default(), MockAI::new())
    }

    pub fn router(&self) -> Router {
        build_app(self.deps.clone(), &[])
    }

    /// Run queued jobs until the queue is empty. Returns how many ran.
    pub async fn drain_jobs(&self) -> usize {
        let mut total = 0;
        loop {
            let processed = self.runner.run_once().await.expect("job batch failed");
            if processed == 0 {
                return total;
            }
            total += processed;
        }
    }

    pub fn user(&self, role: UserRole) -> CurrentUser {
        CurrentUser::new(UserId::new(), role)
    }

    pub fn token_for(&self, user: &CurrentUser) -> String {
        self.deps
            .jwt_service
            .create_token(user.user_id, user.role)
            .expect("token")
    }

    pub async fn topic(&self, author: &CurrentUser) -> Topic {
        self.deps
            .store
            .insert_topic(Topic::new("Is free will an illusion?", None, author.user_id))
            .await
            .expect("topic")
    }

    /// Send a JSON request through the router.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let headers = token
            .map(|token| vec![("authorization", format!("Bearer {}", token))])
            .unwrap_or_default();
        self.send_with_headers(method, uri, &headers, body).await
    }

    /// Send a JSON request with arbitrary extra headers.
    pub async fn send_with_headers(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, String)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
