use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::common::{ForumResult, PostId};
use crate::domains::posts::actions::{self, SubmitPostInput};
use crate::domains::posts::activities::{lookup_post, resolve_pending, PendingResolution};
use crate::domains::posts::Post;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

pub async fn submit_post_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<SubmitPostInput>,
) -> ForumResult<(StatusCode, Json<Post>)> {
    let post = actions::submit_post(input, &auth.current_user(), &state.deps).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(post_id): Path<PostId>,
) -> ForumResult<Json<Post>> {
    let viewer = auth.map(|a| a.current_user());
    let post = lookup_post(post_id, viewer.as_ref(), &state.deps).await?;
    Ok(Json(post))
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<PostId>,
) -> ForumResult<StatusCode> {
    actions::delete_post(post_id, &auth.current_user(), &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resolve_pending_handler(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(pending_post_id): Path<PostId>,
) -> ForumResult<Json<PendingResolution>> {
    let viewer = auth.map(|a| a.current_user());
    let resolution = resolve_pending(pending_post_id, viewer.as_ref(), &state.deps).await?;
    Ok(Json(resolution))
}
