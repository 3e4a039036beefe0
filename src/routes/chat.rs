//! Public chat room

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{parse_limit, ChatMessage, ChatRequest};

pub const DEFAULT_CHAT_LIMIT: usize = 50;
pub const MAX_CHAT_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    pub limit: Option<String>,
}

/// GET /api/chat/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_CHAT_LIMIT, MAX_CHAT_LIMIT);
    let messages = state
        .store
        .list_chat(limit)
        .await
        .map_err(|e| ApiError::storage("Unable to fetch chat messages", e))?;
    Ok(Json(messages))
}

/// POST /api/chat/messages
pub async fn post_message(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatMessage>> {
    let Json(request) = body?;
    let message = request.validate()?;

    let saved = state
        .store
        .post_chat(message)
        .await
        .map_err(|e| ApiError::storage("Unable to post chat message", e))?;
    Ok(Json(saved))
}
