//! Constants used throughout the client application

/// Critical value for a two-sided 95% confidence interval
pub const DEFAULT_CONFIDENCE_Z: f64 = 1.96;

/// Target confidence-interval half-width in nanoseconds (±5 µs)
pub const DEFAULT_HALF_WIDTH_NS: f64 = 5000.0;

/// Round trips per generation across all workers; also caps every later generation
pub const DEFAULT_ROUND_BUDGET: u64 = 1_000_000;

/// Sampling stops once fewer than this many extra rounds per worker are needed
pub const DEFAULT_MIN_ADDITIONAL_ROUNDS: u64 = 10;

/// Reconnect attempts after a reset during handshake
pub const DEFAULT_MAX_RESET_RETRIES: u32 = 3;

/// Progress bar tick interval in milliseconds
pub const PROGRESS_TICK_INTERVAL_MS: u64 = 100;

/// Histogram lower bound in nanoseconds
pub const HISTOGRAM_LOW_BOUND_NS: u64 = 100;

/// Histogram upper bound in nanoseconds
pub const HISTOGRAM_HIGH_BOUND_NS: u64 = 100_000_000;

/// Histogram significant digits for precision
pub const HISTOGRAM_SIGNIFICANT_DIGITS: u8 = 3;

/// Mean latency below this is reported as excellent, in microseconds
pub const EXCELLENT_LATENCY_US: f64 = 50.0;

/// Mean latency below this is reported as acceptable, in microseconds
pub const ACCEPTABLE_LATENCY_US: f64 = 1000.0;
