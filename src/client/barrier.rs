//! Start-of-measurement barrier for one generation of workers

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Counts the workers of a generation that have not yet passed handshake.
///
/// Workers hold a [`BarrierTicket`] each. Arriving decrements the counter
/// and blocks until it reaches zero; a ticket dropped without arriving
/// withdraws its worker so the others are not held forever.
#[derive(Debug)]
pub struct StartBarrier {
    pending: Mutex<usize>,
    released: Condvar,
}

impl StartBarrier {
    /// Create the barrier for `workers` workers, returning exactly one ticket per worker
    pub fn generation(workers: usize) -> (Arc<StartBarrier>, Vec<BarrierTicket>) {
        let barrier = Arc::new(StartBarrier {
            pending: Mutex::new(workers),
            released: Condvar::new(),
        });
        let tickets = (0..workers)
            .map(|_| BarrierTicket {
                barrier: Arc::clone(&barrier),
                settled: false,
            })
            .collect();
        (barrier, tickets)
    }

    /// Workers that have neither arrived nor withdrawn
    pub fn pending(&self) -> usize {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count_down(&self) -> MutexGuard<'_, usize> {
        let mut pending = self.lock();
        debug_assert!(*pending > 0, "barrier counter would go negative");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.released.notify_all();
        }
        pending
    }
}

/// One worker's place at the [`StartBarrier`]
#[derive(Debug)]
pub struct BarrierTicket {
    barrier: Arc<StartBarrier>,
    settled: bool,
}

impl BarrierTicket {
    /// Mark this worker as past handshake and block until every other worker
    /// of the generation has arrived or withdrawn.
    pub fn arrive_and_wait(mut self) {
        self.settled = true;
        let pending = self.barrier.count_down();
        debug!(pending = *pending, "Arrived at start barrier");
        let _released = self
            .barrier
            .released
            .wait_while(pending, |pending| *pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl Drop for BarrierTicket {
    fn drop(&mut self) {
        if !self.settled {
            let pending = self.barrier.count_down();
            debug!(pending = *pending, "Withdrew from start barrier");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_generation_issues_one_ticket_per_worker() {
        let (barrier, tickets) = StartBarrier::generation(4);
        assert_eq!(tickets.len(), 4);
        assert_eq!(barrier.pending(), 4);
    }

    #[test]
    fn test_single_worker_passes_immediately() {
        let (barrier, mut tickets) = StartBarrier::generation(1);
        tickets.remove(0).arrive_and_wait();
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn test_no_release_before_last_arrival() {
        let (barrier, tickets) = StartBarrier::generation(3);
        let (tx, rx) = mpsc::channel();
        let delay = Duration::from_millis(150);

        let handles: Vec<_> = tickets
            .into_iter()
            .enumerate()
            .map(|(i, ticket)| {
                let tx = tx.clone();
                thread::spawn(move || {
                    if i == 2 {
                        thread::sleep(delay);
                    }
                    let arrived = Instant::now();
                    ticket.arrive_and_wait();
                    tx.send((i, arrived, Instant::now())).unwrap();
                })
            })
            .collect();
        drop(tx);
        for handle in handles {
            handle.join().unwrap();
        }

        let events: Vec<_> = rx.iter().collect();
        let last_arrival = events.iter().map(|(_, arrived, _)| *arrived).max().unwrap();
        for (i, _, released) in &events {
            assert!(*released >= last_arrival, "worker {} released early", i);
        }
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn test_dropped_ticket_withdraws() {
        let (barrier, mut tickets) = StartBarrier::generation(2);
        let survivor = tickets.remove(0);
        let waiter = thread::spawn(move || survivor.arrive_and_wait());

        thread::sleep(Duration::from_millis(50));
        assert_eq!(barrier.pending(), 1);
        drop(tickets);

        waiter.join().unwrap();
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn test_arrived_ticket_does_not_count_twice() {
        let (barrier, mut tickets) = StartBarrier::generation(2);
        let late = tickets.pop().unwrap();
        let early = tickets.pop().unwrap();

        let waiter = thread::spawn(move || early.arrive_and_wait());
        thread::sleep(Duration::from_millis(20));
        late.arrive_and_wait();
        waiter.join().unwrap();

        assert_eq!(barrier.pending(), 0);
    }
}
