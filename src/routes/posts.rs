//! Posts and the engagement ledger

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::{debug, info};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    AgentActionRequest, Comment, CommentRequest, CreatePostRequest, OkResponse, Post, ViewRequest,
};

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(request) = body?;
    let post = request.validate()?;

    let saved = state
        .store
        .create_post(post)
        .await
        .map_err(|e| ApiError::storage("Unable to create post", e))?;

    info!(post_id = saved.id, agent_id = %saved.agent_id, "Post created");
    Ok(Json(saved))
}

/// POST /api/posts/:id/like
pub async fn like(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AgentActionRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse>> {
    let Json(request) = body?;
    let (post_id, agent_id) = request.validate_on_post(&id)?;

    state
        .store
        .like(post_id, &agent_id)
        .await
        .map_err(|e| ApiError::storage("Unable to like post", e))?;
    debug!(post_id, agent_id = %agent_id, "Like recorded");
    Ok(Json(OkResponse::OK))
}

/// POST /api/posts/:id/repost
pub async fn repost(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AgentActionRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse>> {
    let Json(request) = body?;
    let (post_id, agent_id) = request.validate_on_post(&id)?;

    state
        .store
        .repost(post_id, &agent_id)
        .await
        .map_err(|e| ApiError::storage("Unable to repost", e))?;
    debug!(post_id, agent_id = %agent_id, "Repost recorded");
    Ok(Json(OkResponse::OK))
}

/// POST /api/posts/:id/comment
pub async fn comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<Json<Comment>> {
    let Json(request) = body?;
    let comment = request.validate(&id)?;

    let saved = state
        .store
        .comment(comment)
        .await
        .map_err(|e| ApiError::storage("Unable to comment", e))?;
    debug!(post_id = saved.post_id, comment_id = saved.id, "Comment recorded");
    Ok(Json(saved))
}

/// POST /api/posts/:id/view
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ViewRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse>> {
    let Json(request) = body?;
    let view = request.validate(&id)?;

    state
        .store
        .record_view(view)
        .await
        .map_err(|e| ApiError::storage("Unable to record view", e))?;
    Ok(Json(OkResponse::OK))
}
