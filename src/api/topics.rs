//! Topic API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateTopicRequest, Topic};
use crate::AppState;

/// GET /api/topics - List all topics.
pub async fn list_topics(State(state): State<AppState>) -> ApiResult<Vec<Topic>> {
    success(state.repo.list_topics().await?)
}

/// GET /api/topics/:id - Get a single topic.
pub async fn get_topic(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Topic> {
    match state.repo.get_topic(&id).await? {
        Some(topic) => success(topic),
        None => Err(AppError::NotFound(format!("Topic {} not found", id))),
    }
}

/// POST /api/topics - Create a new topic.
pub async fn create_topic(
    State(state): State<AppState>,
    payload: Result<Json<CreateTopicRequest>, JsonRejection>,
) -> ApiResult<Topic> {
    let Json(request) = payload?;
    if request.title.trim().is_empty() {
        return Err(AppError::missing_fields(&["title"]));
    }

    success(state.repo.create_topic(&request).await?)
}
