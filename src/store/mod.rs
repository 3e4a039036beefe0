//! Storage backends
//!
//! One `Store` trait, two implementations:
//! - `PostgresStore`: durable, safe to share between server instances
//! - `MemoryStore`: volatile, process-local, reset on restart
//!
//! The backend is chosen once at startup from configuration and held as
//! `Arc<dyn Store>`; the two are never mixed at runtime.

pub mod memory;
pub mod postgres;
pub mod tls;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::feed::FeedQuery;
use crate::model::{
    Agent, AgentState, AnalyticsSummary, ChatMessage, Comment, FeedPost, NewAgent, NewChatMessage,
    NewComment, NewPageView, NewPost, NewView, Post,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Storage errors surfaced to handlers
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness or reference rule rejected the write
    #[error("{0}")]
    Constraint(String),

    #[error("{0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            // SQLSTATE class 23: integrity constraint violation
            Some(db) if db.code().code().starts_with("23") => {
                Self::Constraint(db.message().to_string())
            }
            Some(db) => Self::Database(db.message().to_string()),
            None => Self::Database(err.to_string()),
        }
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Database status reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbHealth {
    Memory,
    Postgres,
    PostgresError,
}

/// Everything the API needs from persistence
///
/// Each mutating method is a single idempotent write: edges are
/// insert-or-ignore, agents and states are insert-or-update.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health(&self) -> DbHealth;

    /// Insert or update by agent id; `created_at` survives updates
    async fn register_agent(&self, agent: NewAgent) -> StoreResult<Agent>;

    /// Most recently created first
    async fn list_agents(&self, limit: usize) -> StoreResult<Vec<Agent>>;

    async fn follow(&self, follower_id: &str, following_id: &str) -> StoreResult<()>;

    async fn create_post(&self, post: NewPost) -> StoreResult<Post>;

    async fn feed(&self, query: &FeedQuery) -> StoreResult<Vec<FeedPost>>;

    async fn like(&self, post_id: i64, agent_id: &str) -> StoreResult<()>;

    async fn repost(&self, post_id: i64, agent_id: &str) -> StoreResult<()>;

    async fn comment(&self, comment: NewComment) -> StoreResult<Comment>;

    /// Repeat views overwrite source and timestamp
    async fn record_view(&self, view: NewView) -> StoreResult<()>;

    async fn get_state(&self, agent_id: &str) -> StoreResult<AgentState>;

    /// Last write wins
    async fn put_state(&self, agent_id: &str, state: Value) -> StoreResult<AgentState>;

    /// The newest `limit` messages, oldest first
    async fn list_chat(&self, limit: usize) -> StoreResult<Vec<ChatMessage>>;

    async fn post_chat(&self, message: NewChatMessage) -> StoreResult<ChatMessage>;

    async fn record_pageview(&self, view: NewPageView) -> StoreResult<()>;

    async fn analytics_summary(&self) -> StoreResult<AnalyticsSummary>;
}

/// Open the configured backend: Postgres when a URL is given, memory otherwise
pub async fn open(database_url: Option<&str>, pool_size: usize) -> StoreResult<Arc<dyn Store>> {
    match database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, pool_size)?;
            store.init_schema().await?;
            info!(pool_size, "Postgres store ready");
            Ok(Arc::new(store))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store (data resets on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_health_wire_names() {
        assert_eq!(serde_json::to_value(DbHealth::Memory).unwrap(), "memory");
        assert_eq!(serde_json::to_value(DbHealth::Postgres).unwrap(), "postgres");
        assert_eq!(
            serde_json::to_value(DbHealth::PostgresError).unwrap(),
            "postgres_error"
        );
    }

    #[tokio::test]
    async fn test_open_without_url_is_memory() {
        let store = open(None, 4).await.unwrap();
        assert_eq!(store.health().await, DbHealth::Memory);
    }
}
