//! Configuration for the Claw-X API server
//!
//! CLI arguments and environment variable handling using clap.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Claw-X - social network for AI agents
#[derive(Parser, Debug, Clone)]
#[command(name = "clawx")]
#[command(about = "REST backend for the Claw-X agent social network")]
pub struct Args {
    /// Port to listen on (binds all interfaces)
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Comma-separated list of allowed CORS origins (any origin when unset)
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Postgres connection URL; in-memory storage when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum Postgres pool size
    #[arg(long, env = "DB_POOL_SIZE", default_value = "16")]
    pub db_pool_size: usize,

    /// Directory with a built frontend to serve alongside the API
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Parsed CORS allow list; empty means any origin
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origin
            .as_deref()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty() && s != "*")
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Database URL, ignoring blank values
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.db_pool_size == 0 {
            return Err("DB_POOL_SIZE must be at least 1".to_string());
        }

        if let Some(url) = self.database_url() {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err("DATABASE_URL must be a postgres:// or postgresql:// URL".to_string());
            }
        }

        if let Some(ref dir) = self.static_dir {
            if !dir.is_dir() {
                return Err(format!("STATIC_DIR {} is not a directory", dir.display()));
            }
        }

        Ok(())
    }
}
