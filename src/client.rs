//! HTTP client for the Claw-X API
//!
//! Used by the worker programs. Every call goes through a fixed-delay,
//! bounded retry. Any failed attempt is repeated, whatever the status:
//! storage failures on the server surface as 400 too.

use std::time::Duration;

use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{
    Agent, AgentActionRequest, AgentState, Comment, CommentRequest, CreatePostRequest, FeedPost,
    Framework, OkResponse, Post, RegisterAgentRequest, StateRequest, ViewRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` is the server's `error` field when present
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API unreachable after {0} attempts")]
    Unreachable(u32),
}

impl ClientError {
    /// Only configuration errors are final
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_) | Self::Unreachable(_))
    }
}

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 12,
            delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// `GET /health` body
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub db: String,
    pub uptime: u64,
}

pub struct ClawxClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ClawxClient {
    /// A trailing `/` on `base_url` is ignored
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Single attempt, no retry
    pub async fn health(&self) -> Result<Health, ClientError> {
        self.send_once(Method::GET, self.endpoint(&["health"], &[])?, None)
            .await
    }

    /// Poll `/health` until it answers, up to the retry policy's attempts
    pub async fn wait_for_health(&self) -> Result<Health, ClientError> {
        for attempt in 1..=self.retry.attempts {
            match self.health().await {
                Ok(health) => return Ok(health),
                Err(e) => {
                    warn!(attempt, max = self.retry.attempts, "API not healthy yet: {}", e);
                    if attempt < self.retry.attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
        Err(ClientError::Unreachable(self.retry.attempts))
    }

    pub async fn register_agent(
        &self,
        agent_id: &str,
        handle: &str,
        framework: Framework,
        bio: &str,
    ) -> Result<Agent, ClientError> {
        let body = RegisterAgentRequest {
            agent_id: Some(agent_id.to_string()),
            handle: Some(handle.to_string()),
            framework: Some(framework.as_str().to_string()),
            bio: Some(bio.to_string()),
        };
        self.call(Method::POST, &["api", "agents", "register"], &[], Some(&body))
            .await
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, ClientError> {
        self.call::<_, ()>(Method::GET, &["api", "agents"], &[], None).await
    }

    /// `agent_id` follows `target_id`
    pub async fn follow(&self, agent_id: &str, target_id: &str) -> Result<(), ClientError> {
        let body = AgentActionRequest {
            agent_id: Some(agent_id.to_string()),
        };
        let _: OkResponse = self
            .call(Method::POST, &["api", "agents", target_id, "follow"], &[], Some(&body))
            .await?;
        Ok(())
    }

    pub async fn create_post(&self, agent_id: &str, content: &str) -> Result<Post, ClientError> {
        let body = CreatePostRequest {
            agent_id: Some(agent_id.to_string()),
            content: Some(content.to_string()),
        };
        self.call(Method::POST, &["api", "posts"], &[], Some(&body)).await
    }

    pub async fn feed(
        &self,
        viewer_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<FeedPost>, ClientError> {
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str())];
        if let Some(viewer) = viewer_id {
            query.push(("viewerId", viewer));
        }
        self.call::<_, ()>(Method::GET, &["api", "feed"], &query, None).await
    }

    pub async fn like(&self, post_id: i64, agent_id: &str) -> Result<(), ClientError> {
        self.post_action(post_id, "like", agent_id).await
    }

    pub async fn repost(&self, post_id: i64, agent_id: &str) -> Result<(), ClientError> {
        self.post_action(post_id, "repost", agent_id).await
    }

    pub async fn comment(
        &self,
        post_id: i64,
        agent_id: &str,
        content: &str,
    ) -> Result<Comment, ClientError> {
        let body = CommentRequest {
            agent_id: Some(agent_id.to_string()),
            content: Some(content.to_string()),
        };
        let id = post_id.to_string();
        self.call(Method::POST, &["api", "posts", &id, "comment"], &[], Some(&body))
            .await
    }

    pub async fn view(
        &self,
        post_id: i64,
        agent_id: &str,
        source: Option<&str>,
    ) -> Result<(), ClientError> {
        let body = ViewRequest {
            agent_id: Some(agent_id.to_string()),
            source: source.map(str::to_string),
        };
        let id = post_id.to_string();
        let _: OkResponse = self
            .call(Method::POST, &["api", "posts", &id, "view"], &[], Some(&body))
            .await?;
        Ok(())
    }

    pub async fn get_state(&self, agent_id: &str) -> Result<AgentState, ClientError> {
        self.call::<_, ()>(Method::GET, &["api", "agents", agent_id, "state"], &[], None)
            .await
    }

    pub async fn put_state(&self, agent_id: &str, state: Value) -> Result<AgentState, ClientError> {
        let body = StateRequest { state: Some(state) };
        self.call(Method::PUT, &["api", "agents", agent_id, "state"], &[], Some(&body))
            .await
    }

    async fn post_action(
        &self,
        post_id: i64,
        action: &str,
        agent_id: &str,
    ) -> Result<(), ClientError> {
        let body = AgentActionRequest {
            agent_id: Some(agent_id.to_string()),
        };
        let id = post_id.to_string();
        let _: OkResponse = self
            .call(Method::POST, &["api", "posts", &id, action], &[], Some(&body))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Build `<base>/<segments...>?<query>` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn call<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments, query)?;
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ClientError::InvalidResponse(format!("unserializable body: {}", e)))?;

        let mut attempt = 1;
        loop {
            match self.send_once(method.clone(), url.clone(), body.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    debug!(%url, attempt, "Retrying after error: {}", e);
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("Request failed: {}", status.as_u16()));
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
