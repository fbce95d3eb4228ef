use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use replicator_core::types::Priority;

const WINDOW: Duration = Duration::from_secs(60);
const TRIP_THRESHOLD: f64 = 0.25;
const RESET_THRESHOLD: f64 = 0.10;

/// Rolling 1-minute failure-rate breaker. Once the failure rate exceeds
/// `TRIP_THRESHOLD` it rejects new sub-HIGH enqueues until the rate falls
/// back under `RESET_THRESHOLD` — simple hysteresis to avoid flapping.
pub struct CircuitBreaker {
    outcomes: Mutex<VecDeque<(Instant, bool)>>,
    tripped: Mutex<bool>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            tripped: Mutex::new(false),
        }
    }

    pub fn record(&self, success: bool) {
        let mut outcomes = self.outcomes.lock().unwrap();
        let now = Instant::now();
        outcomes.push_back((now, success));
        prune(&mut outcomes, now);

        let failure_rate = failure_rate(&outcomes);
        let mut tripped = self.tripped.lock().unwrap();
        if failure_rate > TRIP_THRESHOLD {
            *tripped = true;
        } else if failure_rate < RESET_THRESHOLD {
            *tripped = false;
        }
    }

    /// `true` if a task at this priority should be rejected right now.
    pub fn rejects(&self, priority: Priority) -> bool {
        priority < Priority::High && *self.tripped.lock().unwrap()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

fn prune(outcomes: &mut VecDeque<(Instant, bool)>, now: Instant) {
    while outcomes.front().is_some_and(|(t, _)| now.duration_since(*t) > WINDOW) {
        outcomes.pop_front();
    }
}

fn failure_rate(outcomes: &VecDeque<(Instant, bool)>) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let failures = outcomes.iter().filter(|(_, ok)| !ok).count() as f64;
    failures / outcomes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_above_25_percent_failure_rate() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            breaker.record(false);
        }
        for _ in 0..7 {
            breaker.record(true);
        }
        assert!(breaker.rejects(Priority::Normal));
        assert!(!breaker.rejects(Priority::High));
    }

    #[test]
    fn resets_below_10_percent_failure_rate() {
        let breaker = CircuitBreaker::new();
        for _ in 0..5 {
            breaker.record(false);
        }
        assert!(breaker.rejects(Priority::Low));
        for _ in 0..100 {
            breaker.record(true);
        }
        assert!(!breaker.rejects(Priority::Low));
    }
}
