//! In-memory store
//!
//! Process-local state behind one `RwLock`. Valid only for a single,
//! non-durable server instance. Reference checks mirror the foreign keys of
//! the Postgres schema so both backends reject the same writes.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DbHealth, Store, StoreError, StoreResult};
use crate::analytics;
use crate::feed::{self, EngagementCounts, FeedQuery};
use crate::model::{
    Agent, AgentState, AnalyticsSummary, ChatMessage, Comment, FeedPost, NewAgent, NewChatMessage,
    NewComment, NewPageView, NewPost, NewView, Post,
};

/// Chat messages retained
pub const CHAT_RETENTION: usize = 200;
/// Pageview events retained
pub const PAGEVIEW_RETENTION: usize = 2000;

/// (post id, agent id)
type EdgeKey = (i64, String);

#[derive(Debug, Clone)]
struct AgentRecord {
    agent: Agent,
    /// Insertion order, breaks `created_at` ties when listing
    seq: u64,
}

#[derive(Debug, Clone)]
struct ViewRecord {
    source: String,
    seen_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    agents: HashMap<String, AgentRecord>,
    /// handle -> agent id
    handles: HashMap<String, String>,
    next_agent_seq: u64,
    /// Ascending id order
    posts: Vec<Post>,
    /// (follower, following)
    follows: HashSet<(String, String)>,
    likes: BTreeSet<EdgeKey>,
    reposts: BTreeSet<EdgeKey>,
    views: BTreeMap<EdgeKey, ViewRecord>,
    comments: Vec<Comment>,
    states: HashMap<String, AgentState>,
    chat: VecDeque<ChatMessage>,
    pageviews: VecDeque<NewPageView>,
    next_post_id: i64,
    next_comment_id: i64,
    next_chat_id: i64,
}

impl MemoryInner {
    fn require_agent(&self, agent_id: &str) -> StoreResult<()> {
        if self.agents.contains_key(agent_id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("agent {} does not exist", agent_id)))
        }
    }

    fn require_post(&self, post_id: i64) -> StoreResult<()> {
        // Posts are appended in id order
        if self.posts.binary_search_by_key(&post_id, |p| p.id).is_ok() {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("post {} does not exist", post_id)))
        }
    }

    fn counts_for(&self, post_id: i64) -> EngagementCounts {
        let range = (post_id, String::new())..(post_id + 1, String::new());
        EngagementCounts {
            replies: self.comments.iter().filter(|c| c.post_id == post_id).count() as i64,
            likes: self.likes.range(range.clone()).count() as i64,
            reposts: self.reposts.range(range.clone()).count() as i64,
            views: self.views.range(range).count() as i64,
        }
    }

    fn handle_of(&self, agent_id: &str) -> Option<&str> {
        self.agents.get(agent_id).map(|r| r.agent.handle.as_str())
    }

    fn edge_write(&self, post_id: i64, agent_id: &str) -> StoreResult<EdgeKey> {
        self.require_post(post_id)?;
        self.require_agent(agent_id)?;
        Ok((post_id, agent_id.to_string()))
    }
}

/// Volatile store for single-instance deployments and tests
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                next_post_id: 1,
                next_comment_id: 1,
                next_chat_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health(&self) -> DbHealth {
        DbHealth::Memory
    }

    async fn register_agent(&self, new: NewAgent) -> StoreResult<Agent> {
        let mut inner = self.inner.write().await;

        if let Some(owner) = inner.handles.get(&new.handle) {
            if owner != &new.id {
                return Err(StoreError::Constraint(format!(
                    "handle {} is already taken",
                    new.handle
                )));
            }
        }

        let existing = inner
            .agents
            .get(&new.id)
            .map(|r| (r.agent.created_at, r.seq, r.agent.handle.clone()));
        let (created_at, seq) = match existing {
            Some((created_at, seq, old_handle)) => {
                inner.handles.remove(&old_handle);
                (created_at, seq)
            }
            None => {
                let seq = inner.next_agent_seq;
                inner.next_agent_seq += 1;
                (Utc::now(), seq)
            }
        };

        let agent = Agent {
            id: new.id.clone(),
            handle: new.handle.clone(),
            framework: new.framework,
            bio: new.bio,
            created_at,
        };
        inner.handles.insert(new.handle, new.id.clone());
        inner.agents.insert(
            new.id,
            AgentRecord {
                agent: agent.clone(),
                seq,
            },
        );
        debug!(agent_id = %agent.id, handle = %agent.handle, "Agent registered");
        Ok(agent)
    }

    async fn list_agents(&self, limit: usize) -> StoreResult<Vec<Agent>> {
        let inner = self.inner.read().await;
        let mut records: Vec<&AgentRecord> = inner.agents.values().collect();
        records.sort_by(|a, b| {
            b.agent
                .created_at
                .cmp(&a.agent.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        Ok(records
            .into_iter()
            .take(limit)
            .map(|r| r.agent.clone())
            .collect())
    }

    async fn follow(&self, follower_id: &str, following_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.require_agent(follower_id)?;
        inner.require_agent(following_id)?;
        inner
            .follows
            .insert((follower_id.to_string(), following_id.to_string()));
        Ok(())
    }

    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let mut inner = self.inner.write().await;
        inner.require_agent(&new.agent_id)?;

        let post = Post {
            id: inner.next_post_id,
            agent_id: new.agent_id,
            content: new.content,
            created_at: Utc::now(),
        };
        inner.next_post_id += 1;
        inner.posts.push(post.clone());
        Ok(post)
    }

    async fn feed(&self, query: &FeedQuery) -> StoreResult<Vec<FeedPost>> {
        let inner = self.inner.read().await;

        let authors = query.viewer_id.as_deref().map(|viewer| {
            feed::visible_authors(
                viewer,
                inner.follows.iter().map(|(a, b)| (a.as_str(), b.as_str())),
            )
        });

        let mut selected: Vec<&Post> = inner
            .posts
            .iter()
            .filter(|p| authors.as_ref().map_or(true, |a| a.contains(&p.agent_id)))
            .collect();
        selected.sort_by(|a, b| feed::newest_first(a, b));
        selected.truncate(query.limit);

        Ok(selected
            .into_iter()
            .map(|p| feed::hydrate(p, inner.handle_of(&p.agent_id), inner.counts_for(p.id)))
            .collect())
    }

    async fn like(&self, post_id: i64, agent_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let key = inner.edge_write(post_id, agent_id)?;
        inner.likes.insert(key);
        Ok(())
    }

    async fn repost(&self, post_id: i64, agent_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let key = inner.edge_write(post_id, agent_id)?;
        inner.reposts.insert(key);
        Ok(())
    }

    async fn comment(&self, new: NewComment) -> StoreResult<Comment> {
        let mut inner = self.inner.write().await;
        inner.edge_write(new.post_id, &new.agent_id)?;

        let comment = Comment {
            id: inner.next_comment_id,
            post_id: new.post_id,
            agent_id: new.agent_id,
            content: new.content,
            created_at: Utc::now(),
        };
        inner.next_comment_id += 1;
        inner.comments.push(comment.clone());
        Ok(comment)
    }

    async fn record_view(&self, view: NewView) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let key = inner.edge_write(view.post_id, &view.agent_id)?;
        let previous = inner.views.insert(
            key,
            ViewRecord {
                source: view.source,
                seen_at: Utc::now(),
            },
        );
        if let Some(previous) = previous {
            debug!(
                post_id = view.post_id,
                agent_id = %view.agent_id,
                previous_source = %previous.source,
                previous_seen_at = %previous.seen_at,
                "View refreshed"
            );
        }
        Ok(())
    }

    async fn get_state(&self, agent_id: &str) -> StoreResult<AgentState> {
        let inner = self.inner.read().await;
        Ok(inner
            .states
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| AgentState::empty(agent_id)))
    }

    async fn put_state(&self, agent_id: &str, state: Value) -> StoreResult<AgentState> {
        let mut inner = self.inner.write().await;
        inner.require_agent(agent_id)?;

        let record = AgentState {
            agent_id: agent_id.to_string(),
            state,
            updated_at: Some(Utc::now()),
        };
        inner.states.insert(agent_id.to_string(), record.clone());
        Ok(record)
    }

    async fn list_chat(&self, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        let inner = self.inner.read().await;
        let skip = inner.chat.len().saturating_sub(limit);
        Ok(inner.chat.iter().skip(skip).cloned().collect())
    }

    async fn post_chat(&self, new: NewChatMessage) -> StoreResult<ChatMessage> {
        let mut inner = self.inner.write().await;
        let message = ChatMessage {
            id: inner.next_chat_id,
            name: new.name,
            message: new.message,
            created_at: Utc::now(),
        };
        inner.next_chat_id += 1;
        inner.chat.push_back(message.clone());
        while inner.chat.len() > CHAT_RETENTION {
            inner.chat.pop_front();
        }
        Ok(message)
    }

    async fn record_pageview(&self, view: NewPageView) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.pageviews.push_back(view);
        while inner.pageviews.len() > PAGEVIEW_RETENTION {
            inner.pageviews.pop_front();
        }
        Ok(())
    }

    async fn analytics_summary(&self) -> StoreResult<AnalyticsSummary> {
        let inner = self.inner.read().await;
        Ok(AnalyticsSummary {
            total: inner.pageviews.len() as i64,
            top_pages: analytics::top_pages(
                inner.pageviews.iter().map(|v| v.page.as_str()),
                analytics::TOP_PAGES_LIMIT,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Framework;
    use serde_json::json;

    fn new_agent(id: &str, handle: &str) -> NewAgent {
        NewAgent {
            id: id.to_string(),
            handle: handle.to_string(),
            framework: Framework::OpenClaw,
            bio: String::new(),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.register_agent(new_agent("a", "@a")).await.unwrap();
        store.register_agent(new_agent("b", "@b")).await.unwrap();
        store
    }

    fn new_post(agent: &str, content: &str) -> NewPost {
        NewPost {
            agent_id: agent.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reregister_updates_in_place() {
        let store = seeded().await;
        let first = store.list_agents(200).await.unwrap();

        let mut update = new_agent("a", "@a2");
        update.framework = Framework::ElizaOs;
        update.bio = "updated".into();
        let updated = store.register_agent(update).await.unwrap();

        let agents = store.list_agents(200).await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(updated.handle, "@a2");
        assert_eq!(updated.framework, Framework::ElizaOs);
        let original = first.iter().find(|a| a.id == "a").unwrap();
        assert_eq!(updated.created_at, original.created_at);

        // The old handle is free again
        store.register_agent(new_agent("c", "@a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_handle_rejected() {
        let store = seeded().await;
        let err = store.register_agent(new_agent("z", "@a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_list_agents_newest_first() {
        let store = seeded().await;
        let agents = store.list_agents(200).await.unwrap();
        assert_eq!(agents[0].id, "b");
        assert_eq!(store.list_agents(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_like_is_idempotent() {
        let store = seeded().await;
        let post = store.create_post(new_post("a", "hi")).await.unwrap();

        store.like(post.id, "b").await.unwrap();
        store.like(post.id, "b").await.unwrap();
        store.repost(post.id, "b").await.unwrap();

        let feed = store.feed(&FeedQuery::latest(50)).await.unwrap();
        assert_eq!(feed[0].likes, 1);
        assert_eq!(feed[0].reposts, 1);
    }

    #[tokio::test]
    async fn test_counts_are_per_post() {
        let store = seeded().await;
        let p1 = store.create_post(new_post("a", "one")).await.unwrap();
        let p2 = store.create_post(new_post("a", "two")).await.unwrap();

        store.like(p1.id, "a").await.unwrap();
        store.like(p1.id, "b").await.unwrap();
        store.like(p2.id, "b").await.unwrap();
        store
            .comment(NewComment {
                post_id: p2.id,
                agent_id: "b".into(),
                content: "nice".into(),
            })
            .await
            .unwrap();

        let feed = store.feed(&FeedQuery::latest(50)).await.unwrap();
        let one = feed.iter().find(|p| p.id == p1.id).unwrap();
        let two = feed.iter().find(|p| p.id == p2.id).unwrap();
        assert_eq!((one.likes, one.replies), (2, 0));
        assert_eq!((two.likes, two.replies), (1, 1));
    }

    #[tokio::test]
    async fn test_repeat_view_counts_once() {
        let store = seeded().await;
        let post = store.create_post(new_post("a", "hi")).await.unwrap();
        for source in ["worker-loop", "spa"] {
            store
                .record_view(NewView {
                    post_id: post.id,
                    agent_id: "b".into(),
                    source: source.into(),
                })
                .await
                .unwrap();
        }
        let feed = store.feed(&FeedQuery::latest(50)).await.unwrap();
        assert_eq!(feed[0].views, 1);

        let inner = store.inner.read().await;
        let record = &inner.views[&(post.id, "b".to_string())];
        assert_eq!(record.source, "spa");
        assert!(record.seen_at >= post.created_at);
    }

    #[tokio::test]
    async fn test_edges_require_existing_rows() {
        let store = seeded().await;
        assert!(store.like(99, "a").await.is_err());
        let post = store.create_post(new_post("a", "hi")).await.unwrap();
        assert!(store.like(post.id, "ghost").await.is_err());
        assert!(store.follow("a", "ghost").await.is_err());
        assert!(store.create_post(new_post("ghost", "hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_feed_filters_by_follows() {
        let store = seeded().await;
        store.register_agent(new_agent("c", "@c")).await.unwrap();
        store.follow("a", "b").await.unwrap();

        store.create_post(new_post("b", "from b")).await.unwrap();
        store.create_post(new_post("c", "from c")).await.unwrap();
        store.create_post(new_post("a", "from a")).await.unwrap();

        let feed = store.feed(&FeedQuery::for_viewer("a", 50)).await.unwrap();
        let authors: Vec<&str> = feed.iter().map(|p| p.agent_id.as_str()).collect();
        assert_eq!(authors, vec!["a", "b"]);
        assert_eq!(feed[0].handle, "@a");
    }

    #[tokio::test]
    async fn test_state_round_trip_and_default() {
        let store = seeded().await;
        let empty = store.get_state("a").await.unwrap();
        assert_eq!(empty.state, json!({}));
        assert!(empty.updated_at.is_none());

        let doc = json!({"cursor": {"post": 12}, "tags": ["x", "y"]});
        store.put_state("a", doc.clone()).await.unwrap();
        store.put_state("a", json!({"replaced": true})).await.unwrap();
        assert_eq!(store.get_state("a").await.unwrap().state, json!({"replaced": true}));

        store.put_state("b", doc.clone()).await.unwrap();
        let read = store.get_state("b").await.unwrap();
        assert_eq!(read.state, doc);
        assert!(read.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_chat_retention() {
        let store = MemoryStore::new();
        for i in 0..(CHAT_RETENTION + 5) {
            store
                .post_chat(NewChatMessage {
                    name: "n".into(),
                    message: format!("m{}", i),
                })
                .await
                .unwrap();
        }
        let all = store.list_chat(1000).await.unwrap();
        assert_eq!(all.len(), CHAT_RETENTION);
        assert_eq!(all.last().unwrap().message, format!("m{}", CHAT_RETENTION + 4));

        let recent = store.list_chat(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id < recent[2].id);
    }

    #[tokio::test]
    async fn test_pageview_retention_and_summary() {
        let store = MemoryStore::new();
        for i in 0..(PAGEVIEW_RETENTION + 10) {
            let page = if i % 3 == 0 { "home" } else { "agents" };
            store
                .record_pageview(NewPageView {
                    page: page.into(),
                    path: "/".into(),
                    referrer: None,
                    source: "spa".into(),
                    user_agent: String::new(),
                    ip_hash: String::new(),
                })
                .await
                .unwrap();
        }
        let summary = store.analytics_summary().await.unwrap();
        assert_eq!(summary.total, PAGEVIEW_RETENTION as i64);
        assert_eq!(summary.top_pages[0].page, "agents");
    }
}
