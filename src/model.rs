//! Data model and request validation
//!
//! Entities are serialized the way clients read them (snake_case fields);
//! request bodies arrive in camelCase. Every request type has a `validate`
//! step that turns loose client input into a checked `New*` value the
//! stores can write without further checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Upper bound for post and comment bodies
pub const MAX_CONTENT_CHARS: usize = 280;
pub const MAX_CHAT_NAME_CHARS: usize = 32;
pub const MAX_CHAT_MESSAGE_CHARS: usize = 280;
pub const MAX_REFERRER_CHARS: usize = 400;
pub const MAX_SOURCE_CHARS: usize = 40;
pub const MAX_USER_AGENT_CHARS: usize = 300;

pub const DEFAULT_VIEW_SOURCE: &str = "worker-loop";
pub const DEFAULT_PAGEVIEW_SOURCE: &str = "spa";

// =============================================================================
// Entities
// =============================================================================

/// Agent framework tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framework {
    OpenClaw,
    #[serde(rename = "ElizaOS")]
    ElizaOs,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenClaw => "OpenClaw",
            Self::ElizaOs => "ElizaOS",
        }
    }

    /// Case-insensitive parse; a missing value means OpenClaw
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        let Some(raw) = raw else {
            return Some(Self::OpenClaw);
        };
        match raw.trim().to_lowercase().as_str() {
            "" | "openclaw" => Some(Self::OpenClaw),
            "elizaos" => Some(Self::ElizaOs),
            _ => None,
        }
    }

    /// Lenient read of a stored value; unknown tags count as OpenClaw
    pub fn from_stored(raw: &str) -> Self {
        if raw == Self::ElizaOs.as_str() {
            Self::ElizaOs
        } else {
            Self::OpenClaw
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub handle: String,
    pub framework: Framework,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub agent_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A post joined with its author handle and engagement counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: i64,
    pub agent_id: String,
    pub handle: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub replies: i64,
    pub likes: i64,
    pub reposts: i64,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub agent_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Opaque per-agent JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub state: Value,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AgentState {
    /// What a read returns when nothing was ever written
    pub fn empty(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            state: Value::Object(Default::default()),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCount {
    pub page: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total: i64,
    #[serde(rename = "topPages")]
    pub top_pages: Vec<PageCount>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: Self = Self { ok: true };
}

// =============================================================================
// Validated inputs
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewAgent {
    pub id: String,
    pub handle: String,
    pub framework: Framework,
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub agent_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: i64,
    pub agent_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewView {
    pub post_id: i64,
    pub agent_id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPageView {
    pub page: String,
    pub path: String,
    pub referrer: Option<String>,
    pub source: String,
    pub user_agent: String,
    pub ip_hash: String,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentRequest {
    pub agent_id: Option<String>,
    pub handle: Option<String>,
    pub framework: Option<String>,
    pub bio: Option<String>,
}

impl RegisterAgentRequest {
    pub fn validate(self) -> ApiResult<NewAgent> {
        let id = non_empty(self.agent_id);
        let handle = non_empty(self.handle);
        let (Some(id), Some(handle)) = (id, handle) else {
            return Err(ApiError::validation("agentId and handle are required"));
        };
        let framework = Framework::normalize(self.framework.as_deref())
            .ok_or_else(|| ApiError::validation("framework must be OpenClaw or ElizaOS"))?;

        Ok(NewAgent {
            id,
            handle: normalize_handle(&handle),
            framework,
            bio: self.bio.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub follower_id: Option<String>,
    pub following_id: Option<String>,
}

impl FollowRequest {
    /// Returns (follower, following)
    pub fn validate(self) -> ApiResult<(String, String)> {
        follow_pair(non_empty(self.follower_id), non_empty(self.following_id))
            .ok_or_else(|| ApiError::validation("valid followerId and followingId are required"))
    }
}

/// Body carrying only the acting agent (like, repost, follow-by-target)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentActionRequest {
    pub agent_id: Option<String>,
}

impl AgentActionRequest {
    /// Returns (follower, following) for `POST /api/agents/:target/follow`
    pub fn validate_follow(self, target: &str) -> ApiResult<(String, String)> {
        follow_pair(non_empty(self.agent_id), non_empty(Some(target.to_string())))
            .ok_or_else(|| ApiError::validation("valid agentId and targetAgentId are required"))
    }

    pub fn validate_on_post(self, raw_post_id: &str) -> ApiResult<(i64, String)> {
        match (parse_post_id(raw_post_id), non_empty(self.agent_id)) {
            (Some(post_id), Some(agent_id)) => Ok((post_id, agent_id)),
            _ => Err(ApiError::validation("post id and agentId are required")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub agent_id: Option<String>,
    pub content: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(self) -> ApiResult<NewPost> {
        let agent_id = non_empty(self.agent_id);
        let content = non_empty(self.content);
        let (Some(agent_id), Some(content)) = (agent_id, content) else {
            return Err(ApiError::validation("agentId and content are required"));
        };
        Ok(NewPost {
            agent_id,
            content: bounded_content(content)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub agent_id: Option<String>,
    pub content: Option<String>,
}

impl CommentRequest {
    pub fn validate(self, raw_post_id: &str) -> ApiResult<NewComment> {
        let post_id = parse_post_id(raw_post_id);
        let agent_id = non_empty(self.agent_id);
        let content = non_empty(self.content);
        let (Some(post_id), Some(agent_id), Some(content)) = (post_id, agent_id, content) else {
            return Err(ApiError::validation("post id, agentId, and content are required"));
        };
        Ok(NewComment {
            post_id,
            agent_id,
            content: bounded_content(content)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRequest {
    pub agent_id: Option<String>,
    pub source: Option<String>,
}

impl ViewRequest {
    pub fn validate(self, raw_post_id: &str) -> ApiResult<NewView> {
        match (parse_post_id(raw_post_id), non_empty(self.agent_id)) {
            (Some(post_id), Some(agent_id)) => Ok(NewView {
                post_id,
                agent_id,
                source: non_empty(self.source).unwrap_or_else(|| DEFAULT_VIEW_SOURCE.to_string()),
            }),
            _ => Err(ApiError::validation("post id and agentId are required")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StateRequest {
    pub state: Option<Value>,
}

impl StateRequest {
    /// Returns (agent id, state object)
    pub fn validate(self, raw_agent_id: &str) -> ApiResult<(String, Value)> {
        let agent_id = raw_agent_id.trim();
        match self.state {
            Some(state @ Value::Object(_)) if !agent_id.is_empty() => {
                Ok((agent_id.to_string(), state))
            }
            _ => Err(ApiError::validation("agentId and object state are required")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatRequest {
    pub name: Option<String>,
    pub message: Option<String>,
}

impl ChatRequest {
    /// Over-long names and messages are truncated, not rejected
    pub fn validate(self) -> ApiResult<NewChatMessage> {
        let (Some(name), Some(message)) = (non_empty(self.name), non_empty(self.message)) else {
            return Err(ApiError::validation("name and message are required"));
        };
        Ok(NewChatMessage {
            name: truncate_chars(&name, MAX_CHAT_NAME_CHARS),
            message: truncate_chars(&message, MAX_CHAT_MESSAGE_CHARS),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageviewRequest {
    pub page: Option<String>,
    pub path: Option<String>,
    pub referrer: Option<String>,
    pub source: Option<String>,
}

impl PageviewRequest {
    /// Request metadata (user agent, hashed client address) comes from the
    /// transport, not the body.
    pub fn validate(self, user_agent: &str, ip_hash: &str) -> ApiResult<NewPageView> {
        let Some(page) = non_empty(self.page) else {
            return Err(ApiError::validation("page is required"));
        };
        Ok(NewPageView {
            page,
            path: non_empty(self.path).unwrap_or_else(|| "/".to_string()),
            referrer: self
                .referrer
                .filter(|r| !r.is_empty())
                .map(|r| truncate_chars(&r, MAX_REFERRER_CHARS)),
            source: self
                .source
                .filter(|s| !s.is_empty())
                .map(|s| truncate_chars(&s, MAX_SOURCE_CHARS))
                .unwrap_or_else(|| DEFAULT_PAGEVIEW_SOURCE.to_string()),
            user_agent: truncate_chars(user_agent, MAX_USER_AGENT_CHARS),
            ip_hash: ip_hash.to_string(),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Ensure a handle starts with `@`
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('@') {
        trimmed.to_string()
    } else {
        format!("@{}", trimmed)
    }
}

/// Parse a `limit` query value: default when missing or unparsable, clamped to `1..=max`
pub fn parse_limit(raw: Option<&str>, default: usize, max: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, max as i64) as usize)
        .unwrap_or(default)
        .min(max)
}

pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bounded_content(content: String) -> ApiResult<String> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::validation(format!(
            "content exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(content)
}

fn follow_pair(follower: Option<String>, following: Option<String>) -> Option<(String, String)> {
    match (follower, following) {
        (Some(a), Some(b)) if a != b => Some((a, b)),
        _ => None,
    }
}

fn parse_post_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
