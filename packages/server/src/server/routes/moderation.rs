use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::pagination::PaginationArgs;
use crate::common::{ForumError, ForumResult, PostId};
use crate::domains::moderation::actions::{self, WebhookReceipt, WebhookVerdict};
use crate::domains::moderation::models::AnalysisRecord;
use crate::domains::posts::Post;
use crate::kernel::jobs::Job;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub job_id: Uuid,
    /// False when an analysis for this post was already queued
    pub created: bool,
}

pub async fn list_queue_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(args): Query<PaginationArgs>,
) -> ForumResult<Json<Vec<Post>>> {
    let page = args.validate().map_err(ForumError::validation)?;
    let queue = actions::list_queue(page, &auth.current_user(), &state.deps).await?;
    Ok(Json(queue))
}

pub async fn get_analysis_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pending_post_id): Path<PostId>,
) -> ForumResult<Json<AnalysisRecord>> {
    let analysis = actions::get_analysis(pending_post_id, &auth.current_user(), &state.deps).await?;
    Ok(Json(analysis))
}

pub async fn moderate_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pending_post_id): Path<PostId>,
    Json(request): Json<ModerateRequest>,
) -> ForumResult<Json<Post>> {
    let post = actions::moderate_post(
        pending_post_id,
        &request.action,
        request.reason.as_deref(),
        &auth.current_user(),
        &state.deps,
    )
    .await?;
    Ok(Json(post))
}

pub async fn analyze_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pending_post_id): Path<PostId>,
) -> ForumResult<(StatusCode, Json<AnalyzeResponse>)> {
    let result = actions::reanalyze(pending_post_id, &auth.current_user(), &state.deps).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            job_id: result.job_id(),
            created: result.is_created(),
        }),
    ))
}

pub async fn list_jobs_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(pending_post_id): Path<PostId>,
) -> ForumResult<Json<Vec<Job>>> {
    let jobs = actions::list_jobs(pending_post_id, &auth.current_user(), &state.deps).await?;
    Ok(Json(jobs))
}

/// Verdicts from an external moderation service, authenticated by the
/// `X-API-Key` header rather than a user token.
pub async fn moderation_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(verdict): Json<WebhookVerdict>,
) -> ForumResult<Json<WebhookReceipt>> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    let receipt = actions::moderation_webhook(api_key, verdict, &state.deps).await?;
    Ok(Json(receipt))
}
