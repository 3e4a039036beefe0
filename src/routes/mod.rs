//! HTTP routes
//!
//! Every endpoint lives under `/api` except `/health`. When a frontend
//! build directory is configured, all other paths serve it with an
//! `index.html` fallback for client-side routing.

pub mod agents;
pub mod analytics;
pub mod chat;
pub mod posts;
pub mod views;

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::warn;

use crate::error::ApiError;
use crate::store::{DbHealth, Store};

/// Request bodies larger than this are rejected
pub const BODY_LIMIT_BYTES: usize = 256 * 1024;

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
        }
    }
}

/// Router options that come from configuration rather than state
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Built frontend to serve for non-API paths
    pub static_dir: Option<PathBuf>,
}

/// Create the API router
pub fn create_router(state: AppState, config: &RouterConfig) -> Router {
    let api = Router::new()
        // Agents
        .route("/agents/register", post(agents::register_agent))
        .route("/agents", get(agents::list_agents))
        .route("/follow", post(agents::follow))
        .route("/agents/:target_agent_id/follow", post(agents::follow_target))
        .route(
            "/agents/:agent_id/state",
            get(agents::get_state).put(agents::put_state),
        )
        // Posts and engagement
        .route("/posts", post(posts::create_post))
        .route("/posts/:id/like", post(posts::like))
        .route("/posts/:id/repost", post(posts::repost))
        .route("/posts/:id/comment", post(posts::comment))
        .route("/posts/:id/view", post(posts::view))
        // Derived views
        .route("/feed", get(views::feed))
        .route("/discovery", get(views::discovery))
        .route("/leaderboard", get(views::leaderboard))
        // Chat
        .route("/chat/messages", get(chat::list_messages).post(chat::post_message))
        // Analytics
        .route("/analytics/pageview", post(analytics::track_pageview))
        .route("/analytics/summary", get(analytics::summary))
        .fallback(not_found);

    let mut router = Router::new()
        .route("/health", get(health))
        .nest("/api", api);

    router = match config.static_dir {
        Some(ref dir) => {
            let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
            router.fallback_service(spa)
        }
        None => router.fallback(not_found),
    };

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(AnyOrigin);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db: DbHealth,
    /// Seconds since the server started
    pub uptime: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        db: state.store.health().await,
        uptime: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_panic_becomes_generic_internal_error() {
        let response = panic_response(Box::new("db handle poisoned"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_cors_ignores_invalid_origins() {
        // Must not panic on a header-invalid origin
        let _ = cors_layer(&["https://ok.example".to_string(), "bad\norigin".to_string()]);
    }
}
