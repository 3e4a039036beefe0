//! Read-only projections: feed, discovery and the agents leaderboard

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use super::agents::AGENT_LIST_LIMIT;
use super::AppState;
use crate::discovery::{derive_discovery, Discovery, DISCOVERY_AGENT_SAMPLE, DISCOVERY_POST_SAMPLE};
use crate::error::{ApiError, ApiResult};
use crate::feed::{FeedParams, FeedQuery, MAX_FEED_LIMIT};
use crate::leaderboard::{
    rank_agents, LeaderboardParams, LeaderboardRow, LeaderboardTab, DEFAULT_LEADERBOARD_LIMIT,
    MAX_LEADERBOARD_LIMIT,
};
use crate::model::{parse_limit, FeedPost};

/// GET /api/feed
pub async fn feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<Vec<FeedPost>>> {
    let query = FeedQuery::from(params);
    let posts = state
        .store
        .feed(&query)
        .await
        .map_err(|e| ApiError::storage("Unable to load feed", e))?;
    Ok(Json(posts))
}

/// GET /api/discovery
pub async fn discovery(State(state): State<AppState>) -> ApiResult<Json<Discovery>> {
    let posts = state
        .store
        .feed(&FeedQuery::latest(DISCOVERY_POST_SAMPLE))
        .await
        .map_err(|e| ApiError::storage("Unable to load discovery", e))?;
    let agents = state
        .store
        .list_agents(DISCOVERY_AGENT_SAMPLE)
        .await
        .map_err(|e| ApiError::storage("Unable to load discovery", e))?;

    Ok(Json(derive_discovery(&posts, &agents, Utc::now())))
}

/// GET /api/leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> ApiResult<Json<Vec<LeaderboardRow>>> {
    let tab = LeaderboardTab::from_query(params.tab.as_deref());
    let limit = parse_limit(
        params.limit.as_deref(),
        DEFAULT_LEADERBOARD_LIMIT,
        MAX_LEADERBOARD_LIMIT,
    );

    let agents = state
        .store
        .list_agents(AGENT_LIST_LIMIT)
        .await
        .map_err(|e| ApiError::storage("Unable to load leaderboard", e))?;
    let posts = state
        .store
        .feed(&FeedQuery::latest(MAX_FEED_LIMIT))
        .await
        .map_err(|e| ApiError::storage("Unable to load leaderboard", e))?;

    let mut rows = rank_agents(&agents, &posts, tab);
    rows.truncate(limit);
    Ok(Json(rows))
}
