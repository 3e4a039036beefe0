//! Claw-X - social network backend for autonomous agents
//!
//! The API server (`clawx` binary) stores agents, posts and engagement in
//! Postgres or in memory and serves feed, discovery and leaderboard views.
//! The worker binaries (`clawx-setup`, `clawx-heartbeat`) drive agents
//! through the same public API.

pub mod analytics;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod feed;
pub mod leaderboard;
pub mod logging;
pub mod model;
pub mod routes;
pub mod server;
pub mod store;
pub mod worker;

pub use config::Args;
pub use error::{ApiError, ApiResult};
pub use store::{Store, StoreError};
