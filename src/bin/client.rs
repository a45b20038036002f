use anyhow::{Context, Result};
use clap::Parser;
use rttprobe::client::{
    init_logging_with_config, send_shutdown, Config, ProgressTracker, Reporter,
    SamplingController, ThreadedGeneration,
};
use tracing::{error, info, warn};

fn main() {
    let config = Config::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&config) {
        error!(error = %e, "Measurement failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let address = config.server_address()?;
    let sampling = config.sampling();
    let reporter = Reporter::new(sampling.confidence_z);

    info!(server = %address, clients = config.clients, "Starting latency probe");
    eprintln!(
        "priming with {} iterations across {} clients",
        sampling.priming_budget(),
        sampling.client_count
    );

    let progress = ProgressTracker::new(config.quiet)?;
    let mut runner = ThreadedGeneration::new(
        address,
        config.clients,
        config.max_reset_retries,
        config.timeout(),
        progress.clone(),
    );
    let mut controller = SamplingController::new(sampling);

    let outcome = controller.run(&mut runner, |generation| {
        progress.finish_generation(&generation.pooled);
        progress.suspend(|| reporter.print_generation(generation));
    });
    progress.finish();

    let pooled = controller.pooled();
    reporter.print_results(&pooled, outcome.as_ref().ok(), controller.distribution())?;

    if !config.no_shutdown {
        if let Err(e) = send_shutdown(address) {
            warn!(error = %e, "Failed to send shutdown signal");
        }
    }

    reporter.print_mean(&pooled)?;
    outcome.context("measurement run aborted")?;
    Ok(())
}
