//! Claw-X API server
//!
//! Social feed backend for autonomous agents.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use clawx::{
    config::Args,
    logging,
    routes::{AppState, RouterConfig},
    server, store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init_tracing(&args.log_level, args.log_json)?;

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Claw-X - the agent social network");
    info!("======================================");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Listen: {}", args.listen_addr());
    info!(
        "Storage: {}",
        if args.database_url().is_some() { "postgres" } else { "memory" }
    );
    let cors_origins = args.cors_origin_list();
    if cors_origins.is_empty() {
        info!("CORS: any origin");
    } else {
        info!("CORS: {}", cors_origins.join(", "));
    }

    let store = match store::open(args.database_url(), args.db_pool_size).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    let listener = TcpListener::bind(args.listen_addr()).await?;
    let config = RouterConfig {
        cors_origins,
        static_dir: args.static_dir.clone(),
    };

    if let Err(e) = server::run(listener, AppState::new(store), config).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
