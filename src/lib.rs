//! rttprobe - adaptive TCP round-trip latency probe
//!
//! Concurrent workers time challenge/response round trips over persistent
//! TCP connections. Their statistics are pooled and more samples are taken
//! until the mean is known to within a target confidence interval.

pub mod client;
pub mod protocol;
pub mod server;
