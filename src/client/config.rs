use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use crate::client::sampling::SamplingConfig;
use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "rttprobe-client")]
#[command(about = "Adaptive TCP round-trip latency probe")]
pub struct Config {
    /// Server host to probe
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Number of concurrent client connections
    #[arg(short, long, default_value_t = 1)]
    pub clients: usize,

    /// Round trips per generation across all clients
    #[arg(long, default_value_t = DEFAULT_ROUND_BUDGET)]
    pub round_budget: u64,

    /// Critical value of the confidence interval (1.96 = 95%)
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_Z)]
    pub confidence_z: f64,

    /// Target half-width of the confidence interval in nanoseconds
    #[arg(long, default_value_t = DEFAULT_HALF_WIDTH_NS)]
    pub half_width_ns: f64,

    /// Stop once no more than this many extra rounds per client are needed
    #[arg(long, default_value_t = DEFAULT_MIN_ADDITIONAL_ROUNDS)]
    pub min_additional: u64,

    /// Reconnect attempts when the server resets a connection during handshake
    #[arg(long, default_value_t = DEFAULT_MAX_RESET_RETRIES)]
    pub max_reset_retries: u32,

    /// Give up after this many generations even if not converged
    #[arg(long)]
    pub max_generations: Option<usize>,

    /// Socket read timeout in milliseconds (blocks indefinitely when unset)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Do not send the shutdown signal to the server when done
    #[arg(long)]
    pub no_shutdown: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Config {
    /// Resolves host and port to the first matching socket address
    pub fn server_address(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ClientError::Config(format!("cannot resolve {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| ClientError::Config(format!("no address found for {}", self.host)))
    }

    /// Returns the configured read timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            client_count: self.clients,
            round_budget: self.round_budget,
            confidence_z: self.confidence_z,
            half_width_ns: self.half_width_ns,
            min_additional: self.min_additional,
            max_generations: self.max_generations,
        }
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        if self.port == 0 {
            return Err(ClientError::Config("port must be > 0".into()));
        }
        if self.timeout_ms == Some(0) {
            return Err(ClientError::Config("timeout must be > 0".into()));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ClientError::Config(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }
        self.sampling().validate()?;
        debug!("Configuration validated successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::parse_from(["client"])
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.port, 8080);
        assert_eq!(config.clients, 1);
        assert_eq!(config.round_budget, 1_000_000);
        assert_eq!(config.confidence_z, 1.96);
        assert_eq!(config.half_width_ns, 5000.0);
        assert_eq!(config.min_additional, 10);
        assert_eq!(config.timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_flags() {
        let config = Config::parse_from(["client", "-p", "9000", "-c", "8"]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.clients, 8);
        assert_eq!(config.sampling().priming_budget(), 125_000);
    }

    #[test]
    fn test_server_address_resolves_loopback() -> Result<()> {
        let address = config().server_address()?;
        assert_eq!(address, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        Ok(())
    }

    #[test]
    fn test_invalid_values() {
        let mut config = config();
        config.clients = 0;
        assert!(config.validate().is_err());

        let mut config = Config::parse_from(["client"]);
        config.timeout_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::parse_from(["client"]);
        config.log_level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_format() {
        let config = Config::parse_from(["client", "--log-format", "json"]);
        assert!(config.is_json_format());
    }
}
