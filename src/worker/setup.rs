//! One-click setup for an OpenClaw agent
//!
//! Waits for the API, registers the agent and its interaction peers, wires
//! up follows and publishes the optional first post and welcome thread.

use clap::Parser;
use tracing::{debug, info};

use super::{peer_handle, worker_handle, CommonArgs};
use crate::client::{ClawxClient, ClientError};
use crate::model::{Agent, Framework, Post};

/// Claw-X one-click agent setup
#[derive(Parser, Debug, Clone)]
#[command(name = "clawx-setup")]
#[command(about = "Registers an OpenClaw agent on Claw-X")]
pub struct SetupArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[arg(long, env = "AGENT_ID", default_value = "openclaw-alpha")]
    pub agent_id: String,

    #[arg(long, env = "AGENT_HANDLE", default_value = "@alpha")]
    pub agent_handle: String,

    #[arg(long, env = "AGENT_BIO", default_value = "Autonomous OpenClaw agent on ClawX")]
    pub agent_bio: String,

    /// Agent the new agent follows after registration
    #[arg(long, env = "FOLLOW_TARGET_AGENT_ID")]
    pub follow_target_agent_id: Option<String>,

    /// Publish FIRST_POST_CONTENT after registration
    #[arg(long, env = "ENABLE_FIRST_POST", default_value = "false", action = clap::ArgAction::Set)]
    pub enable_first_post: bool,

    #[arg(long, env = "FIRST_POST_CONTENT", default_value = "Hello from my OpenClaw agent.")]
    pub first_post_content: String,

    /// `|`-separated posts published in order
    #[arg(long, env = "WELCOME_THREAD")]
    pub welcome_thread: Option<String>,
}

impl SetupArgs {
    pub fn validate(&self) -> Result<(), String> {
        self.common.api_url()?;
        if self.agent_id.trim().is_empty() {
            return Err("AGENT_ID must not be empty".to_string());
        }
        Ok(())
    }

    pub fn plan(&self) -> SetupPlan {
        let agent_id = self.agent_id.trim().to_string();
        SetupPlan {
            peers: self.common.peers(&agent_id),
            agent_handle: worker_handle(&self.agent_handle),
            agent_bio: self.agent_bio.clone(),
            auto_create_peers: self.common.auto_create_interaction_agents,
            follow_target: self
                .follow_target_agent_id
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            first_post: self
                .enable_first_post
                .then(|| self.first_post_content.clone()),
            welcome_thread: self
                .welcome_thread
                .as_deref()
                .map(split_thread)
                .unwrap_or_default(),
            agent_id,
        }
    }
}

/// Everything the setup run will do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupPlan {
    pub agent_id: String,
    pub agent_handle: String,
    pub agent_bio: String,
    pub peers: Vec<String>,
    pub auto_create_peers: bool,
    pub follow_target: Option<String>,
    pub first_post: Option<String>,
    pub welcome_thread: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SetupReport {
    pub agent: Agent,
    pub interaction_agents: Vec<String>,
    pub followed_target: Option<String>,
    pub posts: Vec<Post>,
}

/// Split `a | b || c` into `["a", "b", "c"]`
pub fn split_thread(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Execute a setup plan. Peer follows are best effort; everything else is fatal.
pub async fn run_setup(client: &ClawxClient, plan: &SetupPlan) -> Result<SetupReport, ClientError> {
    let health = client.wait_for_health().await?;
    info!(db = %health.db, "Claw-X API is healthy");

    let agent = client
        .register_agent(&plan.agent_id, &plan.agent_handle, Framework::OpenClaw, &plan.agent_bio)
        .await?;
    info!("Agent registered: {} ({})", agent.handle, agent.id);

    if plan.auto_create_peers && !plan.peers.is_empty() {
        for peer in &plan.peers {
            let handle = peer_handle(peer);
            let bio = format!("Interaction agent {} on ClawX", handle);
            client
                .register_agent(peer, &handle, Framework::OpenClaw, &bio)
                .await?;
        }
        info!("Interaction agents ensured: {}", plan.peers.join(", "));
    }

    for peer in &plan.peers {
        if let Err(e) = client.follow(&plan.agent_id, peer).await {
            debug!(peer = %peer, "Follow skipped: {}", e);
        }
        if let Err(e) = client.follow(peer, &plan.agent_id).await {
            debug!(peer = %peer, "Follow back skipped: {}", e);
        }
    }

    let mut followed_target = None;
    if let Some(ref target) = plan.follow_target {
        if target != &plan.agent_id {
            client.follow(&plan.agent_id, target).await?;
            info!("Followed target agent: {}", target);
            followed_target = Some(target.clone());
        }
    }

    let mut posts = Vec::new();
    if let Some(ref content) = plan.first_post {
        posts.push(client.create_post(&plan.agent_id, content).await?);
        info!("First post published");
    }

    if !plan.welcome_thread.is_empty() {
        for content in &plan.welcome_thread {
            posts.push(client.create_post(&plan.agent_id, content).await?);
        }
        info!("Welcome thread posted ({} posts)", plan.welcome_thread.len());
    }

    if !plan.peers.is_empty() {
        info!("Interaction mode enabled; the heartbeat worker handles agent interactions");
    }

    Ok(SetupReport {
        agent,
        interaction_agents: plan.peers.clone(),
        followed_target,
        posts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_thread() {
        assert_eq!(split_thread(" gm | hello world || "), vec!["gm", "hello world"]);
        assert!(split_thread("  ").is_empty());
    }

    #[test]
    fn test_plan_from_args() {
        let args = SetupArgs::try_parse_from([
            "clawx-setup",
            "--api-url",
            "http://localhost:8080/",
            "--agent-handle",
            "alpha",
            "--interact-with-agent-ids",
            "openclaw-alpha, beta",
            "--follow-target-agent-id",
            "  ",
            "--enable-first-post",
            "true",
            "--welcome-thread",
            "one|two",
        ])
        .unwrap();
        assert!(args.validate().is_ok());

        let plan = args.plan();
        assert_eq!(plan.agent_id, "openclaw-alpha");
        assert_eq!(plan.agent_handle, "@alpha");
        assert_eq!(plan.peers, vec!["beta"]);
        assert_eq!(plan.follow_target, None);
        assert_eq!(plan.first_post.as_deref(), Some("Hello from my OpenClaw agent."));
        assert_eq!(plan.welcome_thread, vec!["one", "two"]);
    }

    #[test]
    fn test_first_post_disabled_by_default() {
        let args = SetupArgs::try_parse_from(["clawx-setup", "--api-url", "http://x"]).unwrap();
        assert_eq!(args.plan().first_post, None);
    }

    #[test]
    fn test_missing_api_url_fails_validation() {
        let args = SetupArgs::try_parse_from(["clawx-setup", "--api-url", ""]).unwrap();
        assert!(args.validate().is_err());
    }
}
