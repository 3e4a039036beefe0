//! Agent directory, follow edges and per-agent state

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::{debug, info};

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    Agent, AgentActionRequest, AgentState, FollowRequest, OkResponse, RegisterAgentRequest,
    StateRequest,
};

/// Agents returned by `GET /api/agents`
pub const AGENT_LIST_LIMIT: usize = 200;

/// POST /api/agents/register
pub async fn register_agent(
    State(state): State<AppState>,
    body: Result<Json<RegisterAgentRequest>, JsonRejection>,
) -> ApiResult<Json<Agent>> {
    let Json(request) = body?;
    let agent = request.validate()?;

    let saved = state
        .store
        .register_agent(agent)
        .await
        .map_err(|e| ApiError::storage("Unable to register agent", e))?;

    info!(
        agent_id = %saved.id,
        handle = %saved.handle,
        framework = %saved.framework,
        "Agent registered"
    );
    Ok(Json(saved))
}

/// GET /api/agents
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<Json<Vec<Agent>>> {
    let agents = state
        .store
        .list_agents(AGENT_LIST_LIMIT)
        .await
        .map_err(|e| ApiError::storage("Unable to list agents", e))?;
    Ok(Json(agents))
}

/// POST /api/follow
pub async fn follow(
    State(state): State<AppState>,
    body: Result<Json<FollowRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse>> {
    let Json(request) = body?;
    let (follower, following) = request.validate()?;
    save_follow(&state, &follower, &following).await
}

/// POST /api/agents/:target_agent_id/follow
pub async fn follow_target(
    State(state): State<AppState>,
    Path(target_agent_id): Path<String>,
    body: Result<Json<AgentActionRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse>> {
    let Json(request) = body?;
    let (follower, following) = request.validate_follow(&target_agent_id)?;
    save_follow(&state, &follower, &following).await
}

async fn save_follow(
    state: &AppState,
    follower: &str,
    following: &str,
) -> ApiResult<Json<OkResponse>> {
    state
        .store
        .follow(follower, following)
        .await
        .map_err(|e| ApiError::storage("Unable to follow", e))?;
    debug!(follower, following, "Follow recorded");
    Ok(Json(OkResponse::OK))
}

/// GET /api/agents/:agent_id/state
pub async fn get_state(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentState>> {
    let agent_id = agent_id.trim();
    if agent_id.is_empty() {
        return Err(ApiError::validation("agentId is required"));
    }

    let current = state
        .store
        .get_state(agent_id)
        .await
        .map_err(|e| ApiError::storage("Unable to fetch agent state", e))?;
    Ok(Json(current))
}

/// PUT /api/agents/:agent_id/state
pub async fn put_state(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    body: Result<Json<StateRequest>, JsonRejection>,
) -> ApiResult<Json<AgentState>> {
    let Json(request) = body?;
    let (agent_id, document) = request.validate(&agent_id)?;

    let saved = state
        .store
        .put_state(&agent_id, document)
        .await
        .map_err(|e| ApiError::storage("Unable to save agent state", e))?;
    debug!(agent_id = %saved.agent_id, "Agent state saved");
    Ok(Json(saved))
}
