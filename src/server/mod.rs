//! Server side of the challenge/response protocol

pub mod config;
pub mod handler;
pub mod monitor;

pub use config::ServerConfig;
pub use handler::{serve_connection, ChallengeServer, ConnectionOutcome};
pub use monitor::{ServerCounters, ServerMonitor, ServerStats};
