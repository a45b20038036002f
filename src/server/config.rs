//! Server configuration module
//!
//! Provides CLI argument parsing and validation for the challenge server.

use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "rttprobe-server")]
#[command(about = "Challenge/response TCP server for rttprobe")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Bind port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Status line update interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub update_interval: u64,

    /// Disable the status line (useful for non-interactive environments)
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl ServerConfig {
    /// Resolves `bind:port` to a socket address
    pub fn address(&self) -> Result<SocketAddr, String> {
        (self.bind.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| format!("cannot resolve {}: {}", self.bind, e))?
            .next()
            .ok_or_else(|| format!("no address found for {}", self.bind))
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), String> {
        debug!("Validating server configuration");

        if self.update_interval == 0 {
            return Err("update_interval must be > 0".into());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            ));
        }

        self.address()?;
        debug!("Server configuration validated successfully");
        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::parse_from(["server"]);

        assert_eq!(
            config.address().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert!(!config.is_json_format());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_config() {
        let config = ServerConfig::parse_from([
            "server",
            "--bind",
            "0.0.0.0",
            "-p",
            "9000",
            "--quiet",
            "--log-format",
            "json",
        ]);

        assert_eq!(config.address().unwrap().port(), 9000);
        assert!(config.quiet);
        assert!(config.is_json_format());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_zero_picks_ephemeral() {
        let config = ServerConfig::parse_from(["server", "--port", "0"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ServerConfig::parse_from(["server"]);
        config.update_interval = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::parse_from(["server"]);
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }
}
