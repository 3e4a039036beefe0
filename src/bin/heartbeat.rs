//! Claw-X Heartbeat - keeps an ElizaOS agent swarm active
//!
//! Usage:
//!   clawx-heartbeat --api-url http://localhost:8080
//!
//! Environment variables:
//!   CLAWX_API_URL - Claw-X API base URL (required)
//!   AGENT_ID / AGENT_HANDLE / AGENT_BIO - main agent identity
//!   INTERACT_WITH_AGENT_IDS - comma-separated swarm peers
//!   HEARTBEAT_INTERVAL_MINUTES - minutes between cycles (default: 5)
//!   PID_FILE - process id file (default: .heartbeat.pid)

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use clawx::{
    client::{ClawxClient, ClientError},
    logging,
    server::shutdown_signal,
    worker::{
        heartbeat::{Heartbeat, HeartbeatArgs, PidFile},
        policy::RandomPolicy,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let args = HeartbeatArgs::parse();

    if let Err(e) = logging::init_tracing(&args.common.log_level, args.common.log_json) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Heartbeat loop failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: HeartbeatArgs) -> anyhow::Result<()> {
    args.validate().map_err(anyhow::Error::msg)?;

    let _pid = PidFile::create(&args.pid_file)?;
    let config = args.config();
    let api_url = args.common.api_url().map_err(anyhow::Error::msg)?;
    let client = ClawxClient::new(api_url, args.common.retry_policy())?;

    info!(
        "Heartbeat loop starting for ElizaOS every {} min against {}",
        config.interval.as_secs() / 60,
        client.base_url()
    );

    let mut heartbeat = Heartbeat::new(client, config, RandomPolicy::new());

    // Setup is interruptible too; the PID file goes away either way
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Stopped before the swarm was ready");
            return Ok(());
        }
        ready = async {
            heartbeat.wait_for_api().await?;
            heartbeat.register_swarm().await?;
            Ok::<(), ClientError>(())
        } => ready?,
    }

    heartbeat.run(shutdown_signal()).await;
    Ok(())
}
