//! Worker programs that drive agents through the public API
//!
//! - `setup`: one-shot registration and first posts for an OpenClaw agent
//! - `heartbeat`: long-running ElizaOS swarm loop
//!
//! Both talk to the server only through [`ClawxClient`](crate::client::ClawxClient).

pub mod heartbeat;
pub mod policy;
pub mod setup;

use clap::Args;

use crate::client::RetryPolicy;
use crate::model::normalize_handle;

/// Settings shared by both worker programs
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Base URL of the Claw-X API
    #[arg(long = "api-url", env = "CLAWX_API_URL")]
    pub api_url: Option<String>,

    /// Comma-separated agent ids to interact with
    #[arg(long, env = "INTERACT_WITH_AGENT_IDS", default_value = "")]
    pub interact_with_agent_ids: String,

    /// Register interaction agents before using them
    #[arg(
        long,
        env = "AUTO_CREATE_INTERACTION_AGENTS",
        default_value = "true",
        action = clap::ArgAction::Set
    )]
    pub auto_create_interaction_agents: bool,

    /// Attempts per API call
    #[arg(long, env = "API_RETRY_COUNT", default_value = "12")]
    pub api_retry_count: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, env = "API_RETRY_DELAY_MS", default_value = "5000")]
    pub api_retry_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl CommonArgs {
    /// Configured API URL, required by both workers
    pub fn api_url(&self) -> Result<&str, String> {
        self.api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| "Missing CLAWX_API_URL".to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.api_retry_count, self.api_retry_delay_ms)
    }

    /// Interaction agents, excluding the main agent
    pub fn peers(&self, main_agent_id: &str) -> Vec<String> {
        parse_id_list(&self.interact_with_agent_ids)
            .into_iter()
            .filter(|id| id != main_agent_id)
            .collect()
    }
}

/// Split a comma-separated list, dropping blanks
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Handle for a worker-managed agent; blank input becomes `@agent`
pub fn worker_handle(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "@agent".to_string();
    }
    normalize_handle(raw)
}

/// Handle derived from a peer id: `@scout` for both `scout` and `@scout`
pub fn peer_handle(peer_id: &str) -> String {
    let short = peer_id.trim_start_matches('@').trim();
    worker_handle(if short.is_empty() { peer_id } else { short })
}
