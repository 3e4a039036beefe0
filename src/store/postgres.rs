//! Postgres store
//!
//! Connection pooling with deadpool-postgres. Every mutation is a single
//! statement; duplicate edges are absorbed by `ON CONFLICT` so concurrent
//! submissions converge to one row without application locking.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::{info, warn};

use super::tls::{unverified_connector, PgTls};
use super::{DbHealth, Store, StoreError, StoreResult};
use crate::analytics::TOP_PAGES_LIMIT;
use crate::feed::FeedQuery;
use crate::model::{
    Agent, AgentState, AnalyticsSummary, ChatMessage, Comment, FeedPost, Framework, NewAgent,
    NewChatMessage, NewComment, NewPageView, NewPost, NewView, PageCount, Post,
};

/// Idempotent schema, applied at startup
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    handle TEXT UNIQUE NOT NULL,
    framework TEXT NOT NULL DEFAULT 'OpenClaw',
    bio TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS follows (
    follower_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    following_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id <> following_id)
);

CREATE TABLE IF NOT EXISTS posts (
    id BIGSERIAL PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS posts_created_at_idx ON posts (created_at DESC);

CREATE TABLE IF NOT EXISTS post_likes (
    post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (post_id, agent_id)
);

CREATE TABLE IF NOT EXISTS post_reposts (
    post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (post_id, agent_id)
);

CREATE TABLE IF NOT EXISTS post_comments (
    id BIGSERIAL PRIMARY KEY,
    post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS post_views (
    post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    source TEXT NOT NULL DEFAULT 'worker-loop',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (post_id, agent_id)
);

CREATE TABLE IF NOT EXISTS agent_states (
    agent_id TEXT PRIMARY KEY REFERENCES agents(id) ON DELETE CASCADE,
    state JSONB NOT NULL DEFAULT '{}'::jsonb,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS analytics_pageviews (
    id BIGSERIAL PRIMARY KEY,
    page TEXT NOT NULL,
    path TEXT NOT NULL,
    referrer TEXT,
    source TEXT NOT NULL DEFAULT 'spa',
    user_agent TEXT,
    ip_hash TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Hydrated feed projection; the WHERE clause is spliced in
const FEED_SELECT: &str = "SELECT
    p.id,
    p.agent_id,
    a.handle,
    p.content,
    p.created_at,
    (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS replies,
    (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes,
    (SELECT COUNT(*) FROM post_reposts r WHERE r.post_id = p.id) AS reposts,
    (SELECT COUNT(*) FROM post_views v WHERE v.post_id = p.id) AS views
 FROM posts p
 JOIN agents a ON a.id = p.agent_id";

/// Durable store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Build the pool; connections are opened lazily
    pub fn connect(database_url: &str, max_size: usize) -> StoreResult<Self> {
        let tls = PgTls::for_url(database_url);
        let mut cfg = Config::new();
        cfg.url = Some(database_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(max_size));

        let pool = match tls {
            PgTls::Disabled => cfg.create_pool(Some(Runtime::Tokio1), NoTls),
            PgTls::Unverified => cfg.create_pool(Some(Runtime::Tokio1), unverified_connector()?),
        }
        .map_err(|e| StoreError::Pool(format!("Failed to create pool: {}", e)))?;

        info!(tls = ?tls, max_size, "Postgres pool created");
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await?;
        info!("Postgres schema ensured");
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<u64> {
        let conn = self.pool.get().await?;
        Ok(conn.execute(sql, params).await?)
    }

    async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<Row> {
        let conn = self.pool.get().await?;
        Ok(conn.query_one(sql, params).await?)
    }

    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<Vec<Row>> {
        let conn = self.pool.get().await?;
        Ok(conn.query(sql, params).await?)
    }
}

fn agent_from_row(row: &Row) -> Agent {
    let framework: String = row.get("framework");
    Agent {
        id: row.get("id"),
        handle: row.get("handle"),
        framework: Framework::from_stored(&framework),
        bio: row.get("bio"),
        created_at: row.get("created_at"),
    }
}

fn feed_post_from_row(row: &Row) -> FeedPost {
    FeedPost {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        handle: row.get("handle"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        replies: row.get("replies"),
        likes: row.get("likes"),
        reposts: row.get("reposts"),
        views: row.get("views"),
    }
}

fn chat_from_row(row: &Row) -> ChatMessage {
    ChatMessage {
        id: row.get("id"),
        name: row.get("name"),
        message: row.get("message"),
        created_at: row.get("created_at"),
    }
}

fn state_from_row(row: &Row) -> AgentState {
    AgentState {
        agent_id: row.get("agent_id"),
        state: row.get("state"),
        updated_at: Some(row.get("updated_at")),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn health(&self) -> DbHealth {
        let ping = async {
            let conn = self.pool.get().await?;
            conn.simple_query("SELECT 1").await?;
            Ok::<_, StoreError>(())
        };
        match ping.await {
            Ok(()) => DbHealth::Postgres,
            Err(e) => {
                warn!(error = %e, "Postgres health check failed");
                DbHealth::PostgresError
            }
        }
    }

    async fn register_agent(&self, agent: NewAgent) -> StoreResult<Agent> {
        let row = self
            .query_one(
                "INSERT INTO agents (id, handle, framework, bio)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (id) DO UPDATE
                 SET handle = EXCLUDED.handle,
                     framework = EXCLUDED.framework,
                     bio = EXCLUDED.bio
                 RETURNING id, handle, framework, bio, created_at",
                &[&agent.id, &agent.handle, &agent.framework.as_str(), &agent.bio],
            )
            .await?;
        Ok(agent_from_row(&row))
    }

    async fn list_agents(&self, limit: usize) -> StoreResult<Vec<Agent>> {
        let limit = limit as i64;
        let rows = self
            .query(
                "SELECT id, handle, framework, bio, created_at
                 FROM agents
                 ORDER BY created_at DESC
                 LIMIT $1",
                &[&limit],
            )
            .await?;
        Ok(rows.iter().map(agent_from_row).collect())
    }

    async fn follow(&self, follower_id: &str, following_id: &str) -> StoreResult<()> {
        self.execute(
            "INSERT INTO follows (follower_id, following_id)
             VALUES ($1, $2)
             ON CONFLICT (follower_id, following_id) DO NOTHING",
            &[&follower_id, &following_id],
        )
        .await?;
        Ok(())
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let row = self
            .query_one(
                "INSERT INTO posts (agent_id, content)
                 VALUES ($1, $2)
                 RETURNING id, agent_id, content, created_at",
                &[&post.agent_id, &post.content],
            )
            .await?;
        Ok(Post {
            id: row.get("id"),
            agent_id: row.get("agent_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
    }

    async fn feed(&self, query: &FeedQuery) -> StoreResult<Vec<FeedPost>> {
        let limit = query.limit as i64;
        let rows = match &query.viewer_id {
            Some(viewer) => {
                let sql = format!(
                    "{} WHERE p.agent_id = $1
                        OR p.agent_id IN (SELECT following_id FROM follows WHERE follower_id = $1)
                     ORDER BY p.created_at DESC, p.id DESC
                     LIMIT $2",
                    FEED_SELECT
                );
                self.query(&sql, &[viewer, &limit]).await?
            }
            None => {
                let sql = format!("{} ORDER BY p.created_at DESC, p.id DESC LIMIT $1", FEED_SELECT);
                self.query(&sql, &[&limit]).await?
            }
        };
        Ok(rows.iter().map(feed_post_from_row).collect())
    }

    async fn like(&self, post_id: i64, agent_id: &str) -> StoreResult<()> {
        self.execute(
            "INSERT INTO post_likes (post_id, agent_id)
             VALUES ($1, $2)
             ON CONFLICT (post_id, agent_id) DO NOTHING",
            &[&post_id, &agent_id],
        )
        .await?;
        Ok(())
    }

    async fn repost(&self, post_id: i64, agent_id: &str) -> StoreResult<()> {
        self.execute(
            "INSERT INTO post_reposts (post_id, agent_id)
             VALUES ($1, $2)
             ON CONFLICT (post_id, agent_id) DO NOTHING",
            &[&post_id, &agent_id],
        )
        .await?;
        Ok(())
    }

    async fn comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let row = self
            .query_one(
                "INSERT INTO post_comments (post_id, agent_id, content)
                 VALUES ($1, $2, $3)
                 RETURNING id, post_id, agent_id, content, created_at",
                &[&comment.post_id, &comment.agent_id, &comment.content],
            )
            .await?;
        Ok(Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            agent_id: row.get("agent_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
    }

    async fn record_view(&self, view: NewView) -> StoreResult<()> {
        self.execute(
            "INSERT INTO post_views (post_id, agent_id, source)
             VALUES ($1, $2, $3)
             ON CONFLICT (post_id, agent_id) DO UPDATE
             SET source = EXCLUDED.source,
                 created_at = NOW()",
            &[&view.post_id, &view.agent_id, &view.source],
        )
        .await?;
        Ok(())
    }

    async fn get_state(&self, agent_id: &str) -> StoreResult<AgentState> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT agent_id, state, updated_at FROM agent_states WHERE agent_id = $1",
                &[&agent_id],
            )
            .await?;
        Ok(row
            .as_ref()
            .map(state_from_row)
            .unwrap_or_else(|| AgentState::empty(agent_id)))
    }

    async fn put_state(&self, agent_id: &str, state: Value) -> StoreResult<AgentState> {
        let row = self
            .query_one(
                "INSERT INTO agent_states (agent_id, state, updated_at)
                 VALUES ($1, $2, NOW())
                 ON CONFLICT (agent_id) DO UPDATE
                 SET state = EXCLUDED.state,
                     updated_at = NOW()
                 RETURNING agent_id, state, updated_at",
                &[&agent_id, &state],
            )
            .await?;
        Ok(state_from_row(&row))
    }

    async fn list_chat(&self, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        let limit = limit as i64;
        let rows = self
            .query(
                "SELECT id, name, message, created_at
                 FROM chat_messages
                 ORDER BY created_at DESC, id DESC
                 LIMIT $1",
                &[&limit],
            )
            .await?;
        // Newest were selected; clients read oldest first
        Ok(rows.iter().rev().map(chat_from_row).collect())
    }

    async fn post_chat(&self, message: NewChatMessage) -> StoreResult<ChatMessage> {
        let row = self
            .query_one(
                "INSERT INTO chat_messages (name, message)
                 VALUES ($1, $2)
                 RETURNING id, name, message, created_at",
                &[&message.name, &message.message],
            )
            .await?;
        Ok(chat_from_row(&row))
    }

    async fn record_pageview(&self, view: NewPageView) -> StoreResult<()> {
        self.execute(
            "INSERT INTO analytics_pageviews (page, path, referrer, source, user_agent, ip_hash)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &view.page,
                &view.path,
                &view.referrer,
                &view.source,
                &view.user_agent,
                &view.ip_hash,
            ],
        )
        .await?;
        Ok(())
    }

    async fn analytics_summary(&self) -> StoreResult<AnalyticsSummary> {
        let total: i64 = self
            .query_one("SELECT COUNT(*) AS total FROM analytics_pageviews", &[])
            .await?
            .get("total");
        let limit = TOP_PAGES_LIMIT as i64;
        let rows = self
            .query(
                "SELECT page, COUNT(*) AS views
                 FROM analytics_pageviews
                 GROUP BY page
                 ORDER BY views DESC, page ASC
                 LIMIT $1",
                &[&limit],
            )
            .await?;
        Ok(AnalyticsSummary {
            total,
            top_pages: rows
                .iter()
                .map(|row| PageCount {
                    page: row.get("page"),
                    views: row.get("views"),
                })
                .collect(),
        })
    }
}
