use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with an explicit level and format.
///
/// `RUST_LOG`, when set, takes precedence over `level`, e.g.
/// `RUST_LOG=rttprobe=debug` for debug output from this crate only. Output always goes to
/// stderr so stdout carries only the measurement result.
pub fn init_logging_with_config(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_thread_names(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .init();
    }
}
