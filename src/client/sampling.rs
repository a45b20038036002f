//! Sequential sampling: run generations of workers until the confidence
//! interval around the pooled mean is narrow enough.

use crate::client::barrier::{BarrierTicket, StartBarrier};
use crate::client::constants::*;
use crate::client::error::{ClientError, Result};
use crate::client::progress::ProgressTracker;
use crate::client::statistics::{LatencyDistribution, PooledStats};
use crate::client::worker::{run_worker, WorkerConfig, WorkerOutcome};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Parameters of the stopping rule
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub client_count: usize,
    /// Round trips per generation across all clients
    pub round_budget: u64,
    pub confidence_z: f64,
    /// Target confidence-interval half-width in nanoseconds
    pub half_width_ns: f64,
    /// Stop when no more than this many extra rounds per client are needed
    pub min_additional: u64,
    pub max_generations: Option<usize>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            client_count: 1,
            round_budget: DEFAULT_ROUND_BUDGET,
            confidence_z: DEFAULT_CONFIDENCE_Z,
            half_width_ns: DEFAULT_HALF_WIDTH_NS,
            min_additional: DEFAULT_MIN_ADDITIONAL_ROUNDS,
            max_generations: None,
        }
    }
}

impl SamplingConfig {
    /// Per-client budget of the first generation, and the cap for all later ones
    pub fn priming_budget(&self) -> u64 {
        self.round_budget / self.client_count.max(1) as u64
    }

    /// Total sample count needed for the interval to reach `half_width_ns`
    pub fn required_total(&self, stddev: f64) -> f64 {
        (self.confidence_z * stddev / self.half_width_ns).powi(2)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_count == 0 {
            return Err(ClientError::Config("clients must be > 0".into()));
        }
        if !(self.confidence_z > 0.0 && self.confidence_z.is_finite()) {
            return Err(ClientError::Config("confidence_z must be > 0".into()));
        }
        if !(self.half_width_ns > 0.0 && self.half_width_ns.is_finite()) {
            return Err(ClientError::Config("half_width_ns must be > 0".into()));
        }
        if self.priming_budget() <= self.min_additional {
            return Err(ClientError::Config(format!(
                "round_budget / clients ({}) must exceed min_additional ({})",
                self.priming_budget(),
                self.min_additional
            )));
        }
        if self.max_generations == Some(0) {
            return Err(ClientError::Config("max_generations must be > 0".into()));
        }
        Ok(())
    }
}

/// Where the controller is in its measurement cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Priming,
    Measuring,
    Deciding,
    Done,
}

/// Outcome of the stopping rule after a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run another generation with this many rounds per client.
    /// `capped` is set when more were needed than one generation allows.
    Continue { per_worker: u64, capped: bool },
    Done,
}

/// Reported to the caller after every generation
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    pub generation: usize,
    pub per_worker_budget: u64,
    pub pooled: PooledStats,
    pub failed_workers: usize,
    pub decision: Decision,
}

/// Everything one generation produced. `failure` is set when the generation
/// itself broke (a worker could not be spawned or joined); `outcomes` still
/// holds every worker that did finish.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub outcomes: Vec<WorkerOutcome>,
    pub failure: Option<ClientError>,
}

/// Executes one generation of workers with a given per-worker budget
pub trait GenerationRunner {
    fn run_generation(&mut self, per_worker_budget: u64) -> GenerationReport;
}

/// Final result of a sampling run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pooled: PooledStats,
    pub generations: usize,
    /// False when the run stopped at `max_generations`
    pub converged: bool,
}

pub struct SamplingController {
    config: SamplingConfig,
    pooled: PooledStats,
    distribution: Option<LatencyDistribution>,
    generations: usize,
    phase: Phase,
}

impl SamplingController {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            pooled: PooledStats::default(),
            distribution: None,
            generations: 0,
            phase: Phase::Priming,
        }
    }

    /// Statistics pooled so far, also meaningful after a failed run
    pub fn pooled(&self) -> PooledStats {
        self.pooled
    }

    pub fn distribution(&self) -> Option<&LatencyDistribution> {
        self.distribution.as_ref()
    }

    pub fn generations(&self) -> usize {
        self.generations
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply the stopping rule to the current pooled statistics
    pub fn decide(&self) -> Decision {
        let required = self.config.required_total(self.pooled.stddev);
        let additional =
            ((required - self.pooled.n as f64) / self.config.client_count as f64).ceil();
        let cap = self.config.priming_budget();

        if additional > cap as f64 {
            Decision::Continue {
                per_worker: cap,
                capped: true,
            }
        } else if additional <= self.config.min_additional as f64 {
            Decision::Done
        } else {
            Decision::Continue {
                per_worker: additional as u64,
                capped: false,
            }
        }
    }

    /// Pool outcomes in worker order, returning how many ended with an error
    fn absorb(&mut self, outcomes: Vec<WorkerOutcome>) -> usize {
        let mut failed = 0;
        for outcome in outcomes {
            if outcome.error.is_some() {
                failed += 1;
            }
            self.pooled.absorb(&outcome.result);
            if let Some(dist) = outcome.distribution {
                match &mut self.distribution {
                    Some(total) => {
                        if let Err(e) = total.merge(&dist) {
                            warn!(error = %e, "Dropping worker latency distribution");
                        }
                    }
                    None => self.distribution = Some(dist),
                }
            }
        }
        failed
    }

    /// Run generations until the stopping rule is satisfied.
    ///
    /// `on_generation` is called after each generation has been pooled. On
    /// error the statistics gathered up to that point stay available through
    /// [`SamplingController::pooled`].
    pub fn run<R, F>(&mut self, runner: &mut R, mut on_generation: F) -> Result<RunSummary>
    where
        R: GenerationRunner,
        F: FnMut(&GenerationSummary),
    {
        self.config.validate()?;
        let mut budget = self.config.priming_budget();
        info!(
            per_worker = budget,
            clients = self.config.client_count,
            "Priming"
        );

        loop {
            if let Some(max) = self.config.max_generations {
                if self.generations >= max {
                    warn!(generations = max, "Generation limit reached before convergence");
                    self.phase = Phase::Done;
                    return Ok(self.summary(false));
                }
            }

            if self.generations > 0 {
                self.phase = Phase::Measuring;
            }
            let report = runner.run_generation(budget);
            self.generations += 1;
            let failed_workers = self.absorb(report.outcomes);

            if let Some(e) = report.failure {
                error!(generation = self.generations, error = %e, "Generation failed");
                self.phase = Phase::Done;
                return Err(e);
            }

            self.phase = Phase::Deciding;
            let decision = self.decide();
            debug!(
                generation = self.generations,
                n = self.pooled.n,
                mean_ns = self.pooled.mean,
                stddev_ns = self.pooled.stddev,
                ?decision,
                "Generation complete"
            );
            on_generation(&GenerationSummary {
                generation: self.generations,
                per_worker_budget: budget,
                pooled: self.pooled,
                failed_workers,
                decision,
            });

            match decision {
                Decision::Done => {
                    self.phase = Phase::Done;
                    return Ok(self.summary(true));
                }
                Decision::Continue { per_worker, .. } => budget = per_worker,
            }
        }
    }

    fn summary(&self, converged: bool) -> RunSummary {
        RunSummary {
            pooled: self.pooled,
            generations: self.generations,
            converged,
        }
    }
}

/// Body of one worker thread
type WorkerFn = fn(usize, &WorkerConfig, BarrierTicket) -> WorkerOutcome;

/// Runs each generation as one OS thread per worker against a TCP server
pub struct ThreadedGeneration {
    server_address: SocketAddr,
    client_count: usize,
    max_reset_retries: u32,
    read_timeout: Option<Duration>,
    progress: ProgressTracker,
    generation: usize,
    worker: WorkerFn,
}

impl ThreadedGeneration {
    pub fn new(
        server_address: SocketAddr,
        client_count: usize,
        max_reset_retries: u32,
        read_timeout: Option<Duration>,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            server_address,
            client_count,
            max_reset_retries,
            read_timeout,
            progress,
            generation: 0,
            worker: run_worker,
        }
    }

    #[cfg(test)]
    fn with_worker(mut self, worker: WorkerFn) -> Self {
        self.worker = worker;
        self
    }
}

impl GenerationRunner for ThreadedGeneration {
    fn run_generation(&mut self, per_worker_budget: u64) -> GenerationReport {
        self.generation += 1;
        let config = Arc::new(WorkerConfig {
            server_address: self.server_address,
            iteration_budget: per_worker_budget,
            max_reset_retries: self.max_reset_retries,
            read_timeout: self.read_timeout,
        });
        let (barrier, tickets) = StartBarrier::generation(self.client_count);
        self.progress
            .start_generation(self.generation, self.client_count, per_worker_budget);

        let mut failure = None;
        let mut handles = Vec::with_capacity(self.client_count);
        let worker = self.worker;
        let mut tickets = tickets.into_iter();
        for (id, ticket) in tickets.by_ref().enumerate() {
            let config = Arc::clone(&config);
            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker(id, &config, ticket));
            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    error!(worker = id, error = %e, "Failed to spawn worker thread");
                    failure = Some(ClientError::Spawn(e));
                    break;
                }
            }
        }
        // unspawned workers withdraw so the spawned ones are released
        drop(tickets);

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.join() {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => {
                    error!(worker = id, "Worker thread panicked");
                    if failure.is_none() {
                        failure = Some(ClientError::WorkerPanicked { worker: id });
                    }
                }
            }
            self.progress.worker_joined();
        }
        debug_assert_eq!(barrier.pending(), 0);

        GenerationReport { outcomes, failure }
    }
}
