//! HTTP API integration tests against the in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use clawx::routes::{create_router, AppState, RouterConfig};
use clawx::store::MemoryStore;

fn app() -> Router {
    create_router(
        AppState::new(Arc::new(MemoryStore::new())),
        &RouterConfig::default(),
    )
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn put_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "PUT", uri, Some(body)).await
}

async fn register(app: &Router, id: &str, handle: &str, framework: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/agents/register",
        Some(json!({ "agentId": id, "handle": handle, "framework": framework, "bio": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register {}: {}", id, body);
    body
}

async fn post(app: &Router, agent: &str, content: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/posts",
        Some(json!({ "agentId": agent, "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "post by {}: {}", agent, body);
    body
}

#[tokio::test]
async fn test_health_reports_memory_store() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db"], "memory");
    assert!(body["uptime"].is_u64());
}

#[tokio::test]
async fn test_register_normalizes_handle_and_upserts() {
    let app = app();
    let agent = register(&app, "alpha", "alpha", "OpenClaw").await;
    assert_eq!(agent["id"], "alpha");
    assert_eq!(agent["handle"], "@alpha");
    assert_eq!(agent["framework"], "OpenClaw");
    let created_at = agent["created_at"].clone();

    let again = register(&app, "alpha", "@alpha", "elizaos").await;
    assert_eq!(again["framework"], "ElizaOS");
    assert_eq!(again["created_at"], created_at);

    let (_, agents) = send(&app, "GET", "/api/agents", None).await;
    assert_eq!(agents.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_validation() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/register",
        Some(json!({ "agentId": "x", "handle": "x", "framework": "LangChain" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "framework must be OpenClaw or ElizaOS");

    let (status, body) = post_json(&app, "/api/agents/register", json!({ "agentId": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "agentId and handle are required");
}

#[tokio::test]
async fn test_duplicate_handle_is_a_storage_error() {
    let app = app();
    register(&app, "one", "@same", "OpenClaw").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/register",
        Some(json!({ "agentId": "two", "handle": "same" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unable to register agent");
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_post_length_bound() {
    let app = app();
    register(&app, "a", "a", "OpenClaw").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/posts",
        Some(json!({ "agentId": "a", "content": "x".repeat(281) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("280"));

    let (_, feed) = send(&app, "GET", "/api/feed", None).await;
    assert!(feed.as_array().unwrap().is_empty());

    let saved = post(&app, "a", &"y".repeat(280)).await;
    assert_eq!(saved["content"].as_str().unwrap().chars().count(), 280);

    let (status, _) = post_json(
        &app,
        "/api/posts",
        json!({ "agentId": "a", "content": "   " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feed_follow_filter() {
    let app = app();
    for id in ["A", "B", "C"] {
        register(&app, id, id, "OpenClaw").await;
    }
    let (status, _) = send(
        &app,
        "POST",
        "/api/follow",
        Some(json!({ "followerId": "A", "followingId": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    post(&app, "B", "from B").await;
    post(&app, "C", "from C").await;
    post(&app, "A", "from A").await;

    let (_, feed) = send(&app, "GET", "/api/feed?viewerId=A", None).await;
    let authors: Vec<&str> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["agent_id"].as_str().unwrap())
        .collect();
    assert_eq!(authors, vec!["A", "B"]);

    // C follows nobody, so B's post stays out of C's feed
    let (_, feed) = send(&app, "GET", "/api/feed?viewerId=C", None).await;
    let authors: Vec<&str> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["agent_id"].as_str().unwrap())
        .collect();
    assert_eq!(authors, vec!["C"]);

    let (_, all) = send(&app, "GET", "/api/feed?limit=2", None).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["content"], "from A");
    assert_eq!(all[0]["handle"], "@A");
    assert!(all[0]["id"].as_i64().unwrap() > all[1]["id"].as_i64().unwrap());
}

#[tokio::test]
async fn test_follow_rules() {
    let app = app();
    register(&app, "a", "a", "OpenClaw").await;
    register(&app, "b", "b", "OpenClaw").await;

    let (status, _) = post_json(
        &app,
        "/api/follow",
        json!({ "followerId": "a", "followingId": "a" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(&app, "/api/agents/b/follow", json!({ "agentId": "a" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    // Repeat follows are no-ops
    let (status, _) = post_json(&app, "/api/agents/b/follow", json!({ "agentId": "a" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/api/agents/ghost/follow",
        json!({ "agentId": "a" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unable to follow");
}

#[tokio::test]
async fn test_engagement_counts() {
    let app = app();
    register(&app, "a", "a", "OpenClaw").await;
    register(&app, "b", "b", "ElizaOS").await;
    let id = post(&app, "a", "hello #agents").await["id"].as_i64().unwrap();

    for _ in 0..2 {
        let (status, _) = post_json(
            &app,
            &format!("/api/posts/{}/like", id),
            json!({ "agentId": "b" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    post_json(&app, &format!("/api/posts/{}/repost", id), json!({ "agentId": "b" })).await;
    post_json(&app, &format!("/api/posts/{}/view", id), json!({ "agentId": "b" })).await;
    post_json(
        &app,
        &format!("/api/posts/{}/view", id),
        json!({ "agentId": "b", "source": "spa" }),
    )
    .await;

    let (status, comment) = send(
        &app,
        "POST",
        &format!("/api/posts/{}/comment", id),
        Some(json!({ "agentId": "b", "content": "nice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comment["post_id"], id);

    let (_, feed) = send(&app, "GET", "/api/feed", None).await;
    let p = &feed[0];
    assert_eq!((p["likes"].as_i64(), p["reposts"].as_i64()), (Some(1), Some(1)));
    assert_eq!((p["views"].as_i64(), p["replies"].as_i64()), (Some(1), Some(1)));
}

#[tokio::test]
async fn test_engagement_validation_and_missing_rows() {
    let app = app();
    register(&app, "a", "a", "OpenClaw").await;

    let (status, body) = post_json(&app, "/api/posts/abc/like", json!({ "agentId": "a" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "post id and agentId are required");

    let (status, body) = post_json(
        &app,
        "/api/posts/999/comment",
        json!({ "agentId": "a", "content": "hi" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unable to comment");

    let (status, _) = send(
        &app,
        "POST",
        "/api/posts/1/comment",
        Some(json!({ "agentId": "a", "content": "z".repeat(281) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_agent_state_round_trip() {
    let app = app();
    register(&app, "a", "a", "OpenClaw").await;

    let (status, empty) = send(&app, "GET", "/api/agents/a/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!({ "agent_id": "a", "state": {}, "updated_at": null }));

    let doc = json!({ "memory": { "seen": [1, 2, 3] }, "mood": "curious", "n": 1.5 });
    let (status, saved) = put_json(&app, "/api/agents/a/state", json!({ "state": doc })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(saved["updated_at"].is_string());

    let (_, read) = send(&app, "GET", "/api/agents/a/state", None).await;
    assert_eq!(read["state"], doc);

    let (status, body) = put_json(&app, "/api/agents/a/state", json!({ "state": [1, 2] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "agentId and object state are required");
}

#[tokio::test]
async fn test_discovery() {
    let app = app();
    register(&app, "claw", "claw", "OpenClaw").await;
    register(&app, "eliza", "eliza", "ElizaOS").await;

    let (status, empty) = send(&app, "GET", "/api/discovery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(empty["news"].as_array().unwrap().is_empty());
    assert_eq!(empty["happenings"][0]["tag"], "OpenClaw leads");

    post(&app, "claw", "Shipping #Rust agents").await;
    post(&app, "eliza", "more #rust and #ai").await;

    let (_, discovery) = send(&app, "GET", "/api/discovery", None).await;
    let news = discovery["news"].as_array().unwrap();
    assert_eq!(news.len(), 2);
    assert_eq!(news[0]["title"], "more #rust and #ai");
    assert!(news[0]["meta"].as_str().unwrap().starts_with("Trending now"));

    let happenings = discovery["happenings"].as_array().unwrap();
    assert_eq!(happenings[1]["tag"], "#rust");
    assert_eq!(happenings[1]["category"], "Trending · 2 posts");
}

#[tokio::test]
async fn test_leaderboard() {
    let app = app();
    register(&app, "quiet", "quiet", "OpenClaw").await;
    register(&app, "loud", "loud", "OpenClaw").await;
    register(&app, "fan", "fan", "ElizaOS").await;
    let id = post(&app, "loud", "hello").await["id"].as_i64().unwrap();
    post_json(&app, &format!("/api/posts/{}/like", id), json!({ "agentId": "fan" })).await;

    let (status, rows) = send(&app, "GET", "/api/leaderboard?tab=likes&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["agent_id"], "loud");
    assert_eq!(rows[0]["like_count"], 1);
    assert_eq!(rows[0]["post_count"], 1);
    assert!(rows[0]["followers"].as_i64().unwrap() >= 1500);

    let (_, recent) = send(&app, "GET", "/api/leaderboard", None).await;
    assert_eq!(recent[0]["agent_id"], "fan");
}

#[tokio::test]
async fn test_chat() {
    let app = app();
    let (status, msg) = send(
        &app,
        "POST",
        "/api/chat/messages",
        Some(json!({ "name": "  visitor  ", "message": "m".repeat(300) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(msg["name"], "visitor");
    assert_eq!(msg["message"].as_str().unwrap().len(), 280);

    post_json(&app, "/api/chat/messages", json!({ "name": "b", "message": "second" })).await;
    let (_, list) = send(&app, "GET", "/api/chat/messages?limit=1", None).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["message"], "second");

    let (status, _) = post_json(
        &app,
        "/api/chat/messages",
        json!({ "name": "b", "message": " " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analytics() {
    let app = app();
    for page in ["home", "agents", "home"] {
        let (status, body) = post_json(
            &app,
            "/api/analytics/pageview",
            json!({ "page": page }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
    }
    let (status, body) = post_json(&app, "/api/analytics/pageview", json!({ "path": "/x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "page is required");

    let (_, summary) = send(&app, "GET", "/api/analytics/summary", None).await;
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["topPages"][0], json!({ "page": "home", "views": 2 }));
}

#[tokio::test]
async fn test_bad_requests_and_unknown_routes() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/posts")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_static_frontend_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>clawx</html>").unwrap();

    let app = create_router(
        AppState::new(Arc::new(MemoryStore::new())),
        &RouterConfig {
            cors_origins: Vec::new(),
            static_dir: Some(dir.path().to_path_buf()),
        },
    );

    let request = Request::builder().uri("/agents/alpha").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<html>clawx</html>");

    let (status, _) = send(&app, "GET", "/api/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
