//! Heartbeat loop for an ElizaOS agent swarm
//!
//! On start the swarm (main agent plus interaction peers) is registered and
//! each actor's cursor is loaded from its state blob. Every interval one
//! cycle runs:
//! 1. every ordered pair of actors follows (failures ignored)
//! 2. each actor may post a heartbeat
//! 3. the latest feed is fetched once
//! 4. each actor engages with one post it did not write
//! 5. each actor's cursor is written back to its state blob
//!
//! Individual action failures are logged and skipped; a cycle never aborts.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::policy::EngagementPolicy;
use super::{peer_handle, worker_handle, CommonArgs};
use crate::client::{ClawxClient, ClientError};
use crate::model::{FeedPost, Framework};

pub const DEFAULT_FEED_LIMIT: usize = 50;

/// Claw-X heartbeat worker
#[derive(Parser, Debug, Clone)]
#[command(name = "clawx-heartbeat")]
#[command(about = "Keeps an ElizaOS agent swarm active on Claw-X")]
pub struct HeartbeatArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, env = "AGENT_ID", default_value = "eliza-scout")]
    pub agent_id: String,

    #[arg(long, env = "AGENT_HANDLE", default_value = "@scout")]
    pub agent_handle: String,

    #[arg(long, env = "AGENT_BIO", default_value = "Autonomous ElizaOS agent on ClawX")]
    pub agent_bio: String,

    /// Comment text used when the policy decides to reply
    #[arg(long, env = "AUTO_INTERACTION_COMMENT", default_value = "Signal acknowledged.")]
    pub auto_interaction_comment: String,

    /// Minutes between cycles (minimum 1)
    #[arg(long, env = "HEARTBEAT_INTERVAL_MINUTES", default_value = "5")]
    pub heartbeat_interval_minutes: u64,

    /// Post template; `{timestamp}` is replaced with the current time
    #[arg(
        long,
        env = "HEARTBEAT_POST_TEMPLATE",
        default_value = "Heartbeat: ElizaOS runtime healthy at {timestamp}."
    )]
    pub heartbeat_post_template: String,

    /// File holding the worker's process id while it runs
    #[arg(long, env = "PID_FILE", default_value = ".heartbeat.pid")]
    pub pid_file: PathBuf,
}

impl HeartbeatArgs {
    pub fn validate(&self) -> Result<(), String> {
        self.common.api_url()?;
        if self.agent_id.trim().is_empty() {
            return Err("AGENT_ID must not be empty".to_string());
        }
        Ok(())
    }

    pub fn config(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            agent_id: self.agent_id.trim().to_string(),
            agent_handle: worker_handle(&self.agent_handle),
            agent_bio: self.agent_bio.clone(),
            peers: self.common.peers(self.agent_id.trim()),
            auto_create_peers: self.common.auto_create_interaction_agents,
            comment: self.auto_interaction_comment.clone(),
            interval: Duration::from_secs(self.heartbeat_interval_minutes.max(1) * 60),
            post_template: self.heartbeat_post_template.clone(),
            feed_limit: DEFAULT_FEED_LIMIT,
        }
    }
}

/// Heartbeat loop configuration
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub agent_id: String,
    pub agent_handle: String,
    pub agent_bio: String,
    /// Interaction peers, never including `agent_id`
    pub peers: Vec<String>,
    pub auto_create_peers: bool,
    pub comment: String,
    pub interval: Duration,
    pub post_template: String,
    pub feed_limit: usize,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            agent_id: "eliza-scout".to_string(),
            agent_handle: "@scout".to_string(),
            agent_bio: "Autonomous ElizaOS agent on ClawX".to_string(),
            peers: Vec::new(),
            auto_create_peers: true,
            comment: "Signal acknowledged.".to_string(),
            interval: Duration::from_secs(5 * 60),
            post_template: "Heartbeat: ElizaOS runtime healthy at {timestamp}.".to_string(),
            feed_limit: DEFAULT_FEED_LIMIT,
        }
    }
}

/// Substitute the first `{timestamp}` with an RFC 3339 time
pub fn render_post(template: &str, now: DateTime<Utc>) -> String {
    template.replacen("{timestamp}", &now.to_rfc3339_opts(SecondsFormat::Millis, true), 1)
}

// =============================================================================
// Cursor
// =============================================================================

/// Per-actor progress persisted under the actor's state blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCursor {
    #[serde(default)]
    pub cycles: u64,
    #[serde(default)]
    pub last_cycle_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_post_id: Option<i64>,
}

impl ActorCursor {
    /// Read the cursor fields out of a state document; unknown shapes yield a fresh cursor
    pub fn from_state(state: &Value) -> Self {
        serde_json::from_value(state.clone()).unwrap_or_default()
    }

    /// Write the cursor fields into `state`, keeping any other keys
    pub fn merge_into(&self, state: &Value) -> Value {
        let mut merged = match state {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Ok(Value::Object(fields)) = serde_json::to_value(self) {
            merged.extend(fields);
        }
        Value::Object(merged)
    }

    fn advance(&mut self, now: DateTime<Utc>, newest_post_id: Option<i64>) {
        self.cycles += 1;
        self.last_cycle_at = Some(now);
        if newest_post_id.is_some() {
            self.last_seen_post_id = newest_post_id.max(self.last_seen_post_id);
        }
    }
}

// =============================================================================
// Loop
// =============================================================================

/// What one cycle managed to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub follows: usize,
    pub posts: usize,
    pub likes: usize,
    pub comments: usize,
    pub reposts: usize,
    pub views: usize,
    pub failures: usize,
}

pub struct Heartbeat<P: EngagementPolicy> {
    client: ClawxClient,
    config: HeartbeatConfig,
    policy: P,
    swarm: Vec<String>,
    /// Cursor plus the rest of the actor's state document
    cursors: HashMap<String, (ActorCursor, Value)>,
}

impl<P: EngagementPolicy> Heartbeat<P> {
    pub fn new(client: ClawxClient, config: HeartbeatConfig, policy: P) -> Self {
        Self {
            client,
            config,
            policy,
            swarm: Vec::new(),
            cursors: HashMap::new(),
        }
    }

    /// Actors taking part in cycles; empty until [`register_swarm`](Self::register_swarm)
    pub fn swarm(&self) -> &[String] {
        &self.swarm
    }

    pub fn cursor(&self, agent_id: &str) -> Option<&ActorCursor> {
        self.cursors.get(agent_id).map(|(cursor, _)| cursor)
    }

    /// Block until the API answers `/health`
    pub async fn wait_for_api(&self) -> Result<(), ClientError> {
        let health = self.client.wait_for_health().await?;
        info!(db = %health.db, uptime = health.uptime, "Claw-X API is healthy");
        Ok(())
    }

    /// Register the main agent and (optionally) its peers, then load cursors.
    /// Registration failures are fatal.
    pub async fn register_swarm(&mut self) -> Result<&[String], ClientError> {
        let main = self
            .client
            .register_agent(
                &self.config.agent_id,
                &self.config.agent_handle,
                Framework::ElizaOs,
                &self.config.agent_bio,
            )
            .await?;
        info!(agent_id = %main.id, handle = %main.handle, "Main agent registered");

        if self.config.auto_create_peers {
            for peer in &self.config.peers {
                let handle = peer_handle(peer);
                let short = handle.trim_start_matches('@');
                let bio = format!("Swarm agent {}", short);
                self.client
                    .register_agent(peer, &handle, Framework::ElizaOs, &bio)
                    .await?;
                debug!(agent_id = %peer, "Swarm agent registered");
            }
        }

        self.swarm = std::iter::once(self.config.agent_id.clone())
            .chain(self.config.peers.iter().cloned())
            .collect();

        for actor in &self.swarm {
            let entry = match self.client.get_state(actor).await {
                Ok(saved) => (ActorCursor::from_state(&saved.state), saved.state),
                Err(e) => {
                    warn!(agent_id = %actor, "Could not load cursor, starting fresh: {}", e);
                    (ActorCursor::default(), Value::Object(Map::new()))
                }
            };
            self.cursors.insert(actor.clone(), entry);
        }

        info!("Active swarm agents: {}", self.swarm.join(", "));
        Ok(&self.swarm)
    }

    /// One pass of follows, posts and engagement across the swarm
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let swarm = self.swarm.clone();

        for actor in &swarm {
            for target in &swarm {
                if actor == target {
                    continue;
                }
                match self.client.follow(actor, target).await {
                    Ok(()) => report.follows += 1,
                    Err(e) => {
                        debug!(follower = %actor, following = %target, "Follow skipped: {}", e)
                    }
                }
            }
        }

        for actor in &swarm {
            if !self.policy.should_post(actor) {
                continue;
            }
            let content = render_post(&self.config.post_template, Utc::now());
            match self.client.create_post(actor, &content).await {
                Ok(post) => {
                    report.posts += 1;
                    debug!(agent_id = %actor, post_id = post.id, "Heartbeat posted");
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(agent_id = %actor, "Heartbeat post failed: {}", e);
                }
            }
        }

        let feed = match self.client.feed(None, self.config.feed_limit).await {
            Ok(feed) => feed,
            Err(e) => {
                report.failures += 1;
                warn!("Feed fetch failed: {}", e);
                Vec::new()
            }
        };
        let newest_post_id = feed.iter().map(|p| p.id).max();

        for actor in &swarm {
            self.engage(actor, &feed, &mut report).await;
            self.save_cursor(actor, newest_post_id, &mut report).await;
        }

        report
    }

    async fn engage(&mut self, actor: &str, feed: &[FeedPost], report: &mut CycleReport) {
        let candidates: Vec<&FeedPost> = feed.iter().filter(|p| p.agent_id != actor).collect();
        let Some(target) = self.policy.choose_target(actor, &candidates) else {
            return;
        };
        let plan = self.policy.plan(actor, target);
        let post_id = target.id;

        match self.client.view(post_id, actor, None).await {
            Ok(()) => report.views += 1,
            Err(e) => {
                report.failures += 1;
                warn!(agent_id = %actor, post_id, "View failed: {}", e);
            }
        }

        if plan.like {
            match self.client.like(post_id, actor).await {
                Ok(()) => report.likes += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(agent_id = %actor, post_id, "Like failed: {}", e);
                }
            }
        }

        if plan.comment {
            match self.client.comment(post_id, actor, &self.config.comment).await {
                Ok(_) => report.comments += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(agent_id = %actor, post_id, "Comment failed: {}", e);
                }
            }
        }

        if plan.repost {
            match self.client.repost(post_id, actor).await {
                Ok(()) => report.reposts += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(agent_id = %actor, post_id, "Repost failed: {}", e);
                }
            }
        }
    }

    async fn save_cursor(
        &mut self,
        actor: &str,
        newest_post_id: Option<i64>,
        report: &mut CycleReport,
    ) {
        let (cursor, document) = self
            .cursors
            .entry(actor.to_string())
            .or_insert_with(|| (ActorCursor::default(), Value::Object(Map::new())));
        cursor.advance(Utc::now(), newest_post_id);
        let merged = cursor.merge_into(document);

        match self.client.put_state(actor, merged).await {
            Ok(saved) => *document = saved.state,
            Err(e) => {
                report.failures += 1;
                warn!(agent_id = %actor, "Cursor save failed: {}", e);
            }
        }
    }

    /// Run a cycle now and then every interval until `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Heartbeat loop stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Heartbeat loop stopping mid-cycle");
                    return;
                }
                report = self.run_cycle() => {
                    info!(
                        follows = report.follows,
                        posts = report.posts,
                        likes = report.likes,
                        comments = report.comments,
                        reposts = report.reposts,
                        views = report.views,
                        failures = report.failures,
                        "Heartbeat cycle complete"
                    );
                }
            }
        }
    }
}

// =============================================================================
// PID file
// =============================================================================

/// Holds the worker's process id on disk; removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create(path: &Path) -> io::Result<Self> {
        fs::write(path, std::process::id().to_string())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Failed to remove PID file: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_post() {
        let now = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.678Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            render_post("up at {timestamp} ({timestamp})", now),
            "up at 2026-01-02T03:04:05.678Z ({timestamp})"
        );
        assert_eq!(render_post("no placeholder", now), "no placeholder");
    }

    #[test]
    fn test_cursor_round_trip_keeps_foreign_keys() {
        let state = json!({ "mood": "curious", "cycles": 4, "last_seen_post_id": 10 });
        let mut cursor = ActorCursor::from_state(&state);
        assert_eq!(cursor.cycles, 4);
        assert_eq!(cursor.last_seen_post_id, Some(10));

        cursor.advance(Utc::now(), Some(7));
        let merged = cursor.merge_into(&state);
        assert_eq!(merged["mood"], "curious");
        assert_eq!(merged["cycles"], 5);
        // Never moves backwards
        assert_eq!(merged["last_seen_post_id"], 10);
        assert!(merged["last_cycle_at"].is_string());
    }

    #[test]
    fn test_cursor_from_unexpected_state() {
        assert_eq!(ActorCursor::from_state(&json!({ "cycles": "many" })), ActorCursor::default());
        assert_eq!(ActorCursor::from_state(&json!({})), ActorCursor::default());
    }

    #[test]
    fn test_config_from_args() {
        let args = HeartbeatArgs::try_parse_from([
            "clawx-heartbeat",
            "--api-url",
            "http://localhost:8080",
            "--agent-id",
            "eliza-main",
            "--agent-handle",
            "main",
            "--interact-with-agent-ids",
            "eliza-main,peer",
            "--heartbeat-interval-minutes",
            "0",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
        let config = args.config();
        assert_eq!(config.agent_handle, "@main");
        assert_eq!(config.peers, vec!["peer"]);
        assert_eq!(config.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_pid_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.pid");
        {
            let pid = PidFile::create(&path).unwrap();
            let contents = fs::read_to_string(pid.path()).unwrap();
            assert_eq!(contents, std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_run_returns_when_already_shut_down() {
        use crate::client::RetryPolicy;
        use crate::worker::policy::RandomPolicy;

        let client = ClawxClient::new("http://127.0.0.1:1", RetryPolicy::new(1, 1)).unwrap();
        let mut heartbeat =
            Heartbeat::new(client, HeartbeatConfig::default(), RandomPolicy::seeded(7));
        tokio_test::block_on(heartbeat.run(std::future::ready(())));
        assert!(heartbeat.swarm().is_empty());
    }
}
