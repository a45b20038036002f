use crate::client::barrier::BarrierTicket;
use crate::client::error::{ClientError, Result};
use crate::client::socket::{ProbeSocket, TcpProbeSocket};
use crate::client::statistics::{LatencyDistribution, WorkerResult};
use crate::protocol::{Challenge, HANDSHAKE_ACK, HANDSHAKE_REQUEST};
use rand::Rng;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Settings shared read-only by every worker of a generation
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub server_address: SocketAddr,
    /// Maximum timed rounds for this generation
    pub iteration_budget: u64,
    pub max_reset_retries: u32,
    pub read_timeout: Option<Duration>,
}

/// What a worker hands back when it finishes, early or not
#[derive(Debug)]
pub struct WorkerOutcome {
    pub result: WorkerResult,
    pub distribution: Option<LatencyDistribution>,
    /// The condition that ended the worker before its budget ran out
    pub error: Option<ClientError>,
}

impl WorkerOutcome {
    fn new() -> Self {
        let distribution = match LatencyDistribution::new() {
            Ok(dist) => Some(dist),
            Err(e) => {
                warn!(error = %e, "Latency distribution unavailable");
                None
            }
        };
        Self {
            result: WorkerResult::default(),
            distribution,
            error: None,
        }
    }

    /// A zero-valued outcome for a worker that never reached its timed loop
    pub fn failed(error: ClientError) -> Self {
        Self {
            result: WorkerResult::default(),
            distribution: None,
            error: Some(error),
        }
    }

    fn record(&mut self, elapsed: Duration) {
        let nanos = elapsed.as_nanos() as u64;
        self.result.push(nanos as f64);
        if let Some(dist) = &mut self.distribution {
            dist.record(nanos);
        }
    }
}

/// Verify the connection: send `1`, expect `2`
pub fn handshake<S: ProbeSocket>(socket: &mut S) -> Result<()> {
    socket.send_word(HANDSHAKE_REQUEST)?;
    match socket.recv_word()? {
        HANDSHAKE_ACK => Ok(()),
        received => Err(ClientError::UnexpectedHandshake { received }),
    }
}

/// Time a single challenge/response round trip
pub fn measure_round<S: ProbeSocket>(socket: &mut S, challenge: Challenge) -> Result<Duration> {
    let start = Instant::now();
    socket.send_word(challenge.value())?;
    let response = socket.recv_word()?;
    let elapsed = start.elapsed();

    if !challenge.verify(response) {
        return Err(ClientError::ProtocolViolation {
            challenge: challenge.value(),
            response,
        });
    }
    Ok(elapsed)
}

/// Run up to `budget` timed rounds, folding each latency into `outcome`.
///
/// Stops at the first failed round; everything recorded before it is kept.
pub fn timed_rounds<S: ProbeSocket, R: Rng>(
    socket: &mut S,
    budget: u64,
    rng: &mut R,
    outcome: &mut WorkerOutcome,
) -> Result<()> {
    for _ in 0..budget {
        let challenge = Challenge::random(rng);
        let elapsed = measure_round(socket, challenge)?;
        outcome.record(elapsed);
    }
    Ok(())
}

/// Connect and handshake, reconnecting when the server resets the
/// connection while the handshake response is awaited.
fn connect_verified(config: &WorkerConfig) -> Result<TcpProbeSocket> {
    let mut resets = 0;
    loop {
        let mut socket = TcpProbeSocket::connect(config.server_address, config.read_timeout)?;
        match handshake(&mut socket) {
            Ok(()) => return Ok(socket),
            Err(e) if e.is_reset() => {
                resets += 1;
                if resets > config.max_reset_retries {
                    return Err(ClientError::ResetRetriesExhausted { attempts: resets });
                }
                warn!(attempt = resets, "Connection reset during handshake, reconnecting");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run one worker: connect, handshake, wait at the barrier, then time up to
/// `config.iteration_budget` rounds.
///
/// Never fails: every error ends only this worker and is carried in the
/// returned outcome next to whatever was measured.
pub fn run_worker(id: usize, config: &WorkerConfig, ticket: BarrierTicket) -> WorkerOutcome {
    let mut socket = match connect_verified(config) {
        Ok(socket) => socket,
        Err(e) => {
            warn!(worker = id, error = %e, "Worker failed before measurement");
            return WorkerOutcome::failed(e);
        }
    };
    debug!(worker = id, "Handshake complete");

    ticket.arrive_and_wait();

    let mut outcome = WorkerOutcome::new();
    let mut rng = rand::rng();
    if let Err(e) = timed_rounds(&mut socket, config.iteration_budget, &mut rng, &mut outcome) {
        warn!(
            worker = id,
            completed = outcome.result.n,
            error = %e,
            "Worker stopped early"
        );
        outcome.error = Some(e);
    }
    socket.close();

    debug!(
        worker = id,
        n = outcome.result.n,
        mean_ns = outcome.result.mean,
        "Worker finished"
    );
    outcome
}
