//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::kernel::ServerDeps;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    analyze_handler, create_topic_handler, delete_post_handler, delete_topic_handler,
    get_analysis_handler, get_post_handler, health_handler, list_jobs_handler,
    list_queue_handler, moderate_handler, moderation_webhook_handler, own_profile_handler,
    resolve_pending_handler, submit_post_handler, thread_handler, user_profile_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router.
///
/// An empty `allowed_origins` list allows any origin (development).
pub fn build_app(deps: Arc<ServerDeps>, allowed_origins: &[String]) -> Router {
    let jwt_service = deps.jwt_service.clone();
    let state = AppState { deps };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
        ]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/posts", post(submit_post_handler))
        .route(
            "/api/posts/:id",
            get(get_post_handler).delete(delete_post_handler),
        )
        .route("/api/pending-posts", get(list_queue_handler))
        .route("/api/pending-posts/:id/analysis", get(get_analysis_handler))
        .route(
            "/api/pending-posts/:id/resolution",
            get(resolve_pending_handler),
        )
        .route("/api/pending-posts/:id/jobs", get(list_jobs_handler))
        .route("/api/pending-posts/:id/moderate", post(moderate_handler))
        .route("/api/pending-posts/:id/analyze", post(analyze_handler))
        .route("/api/moderation-webhook", post(moderation_webhook_handler))
        .route("/api/topics", post(create_topic_handler))
        .route("/api/topics/:id", delete(delete_topic_handler))
        .route("/api/topics/:id/thread", get(thread_handler))
        .route("/api/profile", get(own_profile_handler))
        .route("/api/users/:id/profile", get(user_profile_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allow_origin(allowed_origins: &[String]) -> AllowOrigin {
    if allowed_origins.is_empty() {
        return AllowOrigin::from(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    AllowOrigin::list(origins)
}
