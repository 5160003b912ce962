use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::common::pagination::PaginationArgs;
use crate::common::{ForumError, ForumResult, TopicId};
use crate::domains::posts::activities::{topic_thread, TopicThread};
use crate::domains::topics::{self, CreateTopicInput, Topic};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

pub async fn create_topic_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateTopicInput>,
) -> ForumResult<(StatusCode, Json<Topic>)> {
    let topic = topics::create_topic(input, &auth.current_user(), &state.deps).await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

pub async fn thread_handler(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Path(topic_id): Path<TopicId>,
    Query(args): Query<PaginationArgs>,
) -> ForumResult<Json<TopicThread>> {
    let page = args.validate().map_err(ForumError::validation)?;
    let viewer = auth.map(|a| a.current_user());
    let thread = topic_thread(topic_id, viewer.as_ref(), page, &state.deps).await?;
    Ok(Json(thread))
}

pub async fn delete_topic_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(topic_id): Path<TopicId>,
) -> ForumResult<StatusCode> {
    topics::delete_topic(topic_id, &auth.current_user(), &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}
