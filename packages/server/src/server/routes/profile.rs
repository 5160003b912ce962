use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::common::pagination::PaginationArgs;
use crate::common::{ForumError, ForumResult, UserId};
use crate::domains::posts::activities::{profile, Profile};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

/// The caller's own published, pending and rejected posts.
pub async fn own_profile_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(args): Query<PaginationArgs>,
) -> ForumResult<Json<Profile>> {
    let page = args.validate().map_err(ForumError::validation)?;
    let viewer = auth.current_user();
    Ok(Json(
        profile(viewer.user_id, Some(&viewer), page, &state.deps).await?,
    ))
}

/// Anyone's published posts; their own pending and rejected posts as well
/// when the caller is that user.
pub async fn user_profile_handler(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(user_id): Path<UserId>,
    Query(args): Query<PaginationArgs>,
) -> ForumResult<Json<Profile>> {
    let page = args.validate().map_err(ForumError::validation)?;
    let viewer = auth.map(|a| a.current_user());
    Ok(Json(
        profile(user_id, viewer.as_ref(), page, &state.deps).await?,
    ))
}
