//! Pageview analytics

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};

use super::AppState;
use crate::analytics::hash_ip;
use crate::error::{ApiError, ApiResult};
use crate::model::{AnalyticsSummary, OkResponse, PageviewRequest};

/// POST /api/analytics/pageview
pub async fn track_pageview(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<PageviewRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OkResponse>)> {
    let Json(request) = body?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let client = client_address(&headers, peer.map(|ConnectInfo(addr)| addr));
    let view = request.validate(user_agent, &hash_ip(&client))?;

    state
        .store
        .record_pageview(view)
        .await
        .map_err(|e| ApiError::storage("Unable to track pageview", e))?;
    Ok((StatusCode::CREATED, Json(OkResponse::OK)))
}

/// GET /api/analytics/summary
pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<AnalyticsSummary>> {
    let summary = state
        .store
        .analytics_summary()
        .await
        .map_err(|e| ApiError::storage("Unable to fetch analytics summary", e))?;
    Ok(Json(summary))
}

/// First `X-Forwarded-For` hop, else the socket peer
fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_address_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_address(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_client_address_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();
        assert_eq!(client_address(&HeaderMap::new(), Some(peer)), "192.0.2.1");
        assert_eq!(client_address(&HeaderMap::new(), None), "");
    }
}
