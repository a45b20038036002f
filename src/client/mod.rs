//! Client side of rttprobe: workers, statistics and the sampling controller

pub mod barrier;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod progress;
pub mod reporter;
pub mod sampling;
pub mod socket;
pub mod statistics;
pub mod worker;

pub use barrier::{BarrierTicket, StartBarrier};
pub use config::Config;
pub use constants::*;
pub use error::{ClientError, Result};
pub use logging::init_logging_with_config;
pub use progress::ProgressTracker;
pub use reporter::Reporter;
pub use sampling::{
    Decision, GenerationReport, GenerationRunner, GenerationSummary, Phase, RunSummary,
    SamplingConfig, SamplingController, ThreadedGeneration,
};
pub use socket::{send_shutdown, ProbeSocket, TcpProbeSocket};
pub use statistics::{LatencyDistribution, PooledStats, WorkerResult};
pub use worker::{handshake, measure_round, run_worker, timed_rounds, WorkerConfig, WorkerOutcome};
