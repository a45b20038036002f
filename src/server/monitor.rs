//! Server activity counters and status line

use colored::*;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time without answered rounds before the server is shown as idle (milliseconds)
const IDLE_THRESHOLD_MS: u64 = 150;

/// Lock-free counters shared by every connection handler.
///
/// Handlers only ever do `Relaxed` increments; the status thread reads them
/// periodically.
#[derive(Debug, Default)]
pub struct ServerCounters {
    connections: AtomicU64,
    handshakes: AtomicU64,
    rounds: AtomicU64,
    errors: AtomicU64,
}

impl ServerCounters {
    #[inline]
    pub fn increment_connections(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_handshakes(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_rounds(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            connections: self.connections.load(Ordering::Relaxed),
            handshakes: self.handshakes.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub connections: u64,
    pub handshakes: u64,
    pub rounds: u64,
    pub errors: u64,
}

/// Periodically redraws a one-line status from the shared counters
pub struct ServerMonitor {
    counters: Arc<ServerCounters>,
    update_interval: Duration,
    stopped: Arc<AtomicBool>,
}

impl ServerMonitor {
    pub fn new(counters: Arc<ServerCounters>, update_interval_ms: u64) -> Self {
        Self {
            counters,
            update_interval: Duration::from_millis(update_interval_ms),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background display thread. It exits once [`ServerMonitor::stop`] is called.
    pub fn start_display(&self) -> thread::JoinHandle<()> {
        let counters = Arc::clone(&self.counters);
        let stopped = Arc::clone(&self.stopped);
        let update_interval = self.update_interval;

        thread::spawn(move || {
            let mut last_rounds = 0u64;
            let mut last_active = Instant::now();

            while !stopped.load(Ordering::Relaxed) {
                thread::sleep(update_interval);

                let stats = counters.snapshot();
                let now = Instant::now();
                if stats.rounds > last_rounds {
                    last_active = now;
                }
                let is_idle = now.duration_since(last_active)
                    >= Duration::from_millis(IDLE_THRESHOLD_MS);
                last_rounds = stats.rounds;

                Self::display_status_line(is_idle, &stats);
            }
            println!();
        })
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    fn render_indicator(is_idle: bool) -> String {
        if is_idle {
            "░".normal().to_string()
        } else {
            "█".green().bold().to_string()
        }
    }

    fn display_status_line(is_idle: bool, stats: &ServerStats) {
        let status = if is_idle { "IDLE" } else { "ACTIVE" };
        print!(
            "\r{} [{}] Connections: {} | Handshakes: {} | Rounds: {} | Errors: {}",
            Self::render_indicator(is_idle),
            status,
            stats.connections,
            stats.handshakes,
            stats.rounds,
            stats.errors
        );
        std::io::stdout().flush().ok();
    }
}
