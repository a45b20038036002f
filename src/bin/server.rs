use anyhow::Result;
use clap::Parser;
use rttprobe::client::init_logging_with_config;
use rttprobe::server::{ChallengeServer, ServerConfig, ServerMonitor};
use tracing::{error, info};

fn main() {
    let config = ServerConfig::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Server failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<()> {
    let addr = config.address().map_err(anyhow::Error::msg)?;

    let server = ChallengeServer::bind(addr).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            anyhow::anyhow!(
                "Failed to bind to {}: Address already in use. Try a different port or ensure no other process is using it.",
                addr
            )
        } else {
            anyhow::Error::new(e).context(format!("Failed to bind to {}", addr))
        }
    })?;

    info!(
        address = %server.local_addr()?,
        update_interval_ms = config.update_interval,
        quiet_mode = config.quiet,
        "Challenge server listening"
    );

    let monitor = ServerMonitor::new(server.counters(), config.update_interval);
    let display = if config.quiet {
        info!("Running in quiet mode (status line disabled)");
        None
    } else {
        Some(monitor.start_display())
    };

    let counters = server.counters();
    server.run()?;

    monitor.stop();
    if let Some(handle) = display {
        let _ = handle.join();
    }

    let stats = counters.snapshot();
    info!(
        connections = stats.connections,
        handshakes = stats.handshakes,
        rounds = stats.rounds,
        errors = stats.errors,
        "Shutdown complete"
    );
    Ok(())
}
