use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const EMA_ALPHA: f64 = 0.2;

/// Exponentially-weighted state updated on every send completion.
struct Ema {
    success_rate: f64,
    avg_latency_ms: f64,
    initialized: bool,
}

impl Ema {
    fn new() -> Self {
        Self {
            success_rate: 1.0,
            avg_latency_ms: 0.0,
            initialized: false,
        }
    }

    fn update(&mut self, success: bool, latency_ms: u64) {
        let sample_rate = if success { 1.0 } else { 0.0 };
        if !self.initialized {
            self.success_rate = sample_rate;
            self.avg_latency_ms = latency_ms as f64;
            self.initialized = true;
            return;
        }
        self.success_rate = EMA_ALPHA * sample_rate + (1.0 - EMA_ALPHA) * self.success_rate;
        self.avg_latency_ms =
            EMA_ALPHA * latency_ms as f64 + (1.0 - EMA_ALPHA) * self.avg_latency_ms;
    }
}

/// Runtime-only health and load state for one sender. Never persisted;
/// rebuilt from zero whenever the process restarts.
pub struct SenderMetrics {
    in_flight: AtomicU32,
    consecutive_failures: AtomicU32,
    rate_limited_until: Mutex<Option<Instant>>,
    last_probe_at: Mutex<Option<Instant>>,
    ema: Mutex<Ema>,
}

impl SenderMetrics {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicU32::new(0),
            consecutive_failures: AtomicU32::new(0),
            rate_limited_until: Mutex::new(None),
            last_probe_at: Mutex::new(None),
            ema: Mutex::new(Ema::new()),
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn success_rate(&self) -> f64 {
        self.ema.lock().unwrap().success_rate
    }

    pub fn avg_latency_ms(&self) -> f64 {
        self.ema.lock().unwrap().avg_latency_ms
    }

    pub fn rate_limited_until(&self) -> Option<Instant> {
        *self.rate_limited_until.lock().unwrap()
    }

    /// `true` if this sender may currently be selected.
    pub fn is_eligible(&self, enabled: bool, f_max: u32, now: Instant) -> bool {
        if !enabled {
            return false;
        }
        if let Some(until) = self.rate_limited_until() {
            if now < until {
                return false;
            }
        }
        self.consecutive_failures() < f_max
    }

    pub fn begin_attempt(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed attempt, successful or not, and update the EMAs.
    pub fn record_completion(&self, success: bool, latency_ms: u64) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.ema.lock().unwrap().update(success, latency_ms);
        if success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        } else {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// A rate-limit signal is a retryable failure that does not count
    /// toward the unhealthy threshold.
    pub fn record_rate_limited(&self, retry_after: Duration, now: Instant) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        *self.rate_limited_until.lock().unwrap() = Some(now + retry_after);
    }

    pub fn mark_probed(&self, now: Instant) {
        *self.last_probe_at.lock().unwrap() = Some(now);
    }

    /// Due for a recovery probe once this sender has crossed `f_max` and
    /// at least `probe_interval` has passed since the last attempt.
    pub fn due_for_probe(&self, f_max: u32, probe_interval: Duration, now: Instant) -> bool {
        if self.consecutive_failures() < f_max {
            return false;
        }
        match *self.last_probe_at.lock().unwrap() {
            None => true,
            Some(last) => now.duration_since(last) >= probe_interval,
        }
    }

    /// Called when a periodic health probe succeeds: clears the failure streak.
    pub fn record_probe_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for SenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_converges_toward_failure_rate() {
        let m = SenderMetrics::new();
        for _ in 0..50 {
            m.begin_attempt();
            m.record_completion(false, 100);
        }
        assert!(m.success_rate() < 0.05);
    }

    #[test]
    fn rate_limit_does_not_count_as_failure() {
        let m = SenderMetrics::new();
        let now = Instant::now();
        m.begin_attempt();
        m.record_rate_limited(Duration::from_secs(5), now);
        assert_eq!(m.consecutive_failures(), 0);
        assert!(!m.is_eligible(true, 5, now));
        assert!(m.is_eligible(true, 5, now + Duration::from_secs(6)));
    }

    #[test]
    fn unhealthy_after_f_max_failures() {
        let m = SenderMetrics::new();
        let now = Instant::now();
        for _ in 0..5 {
            m.begin_attempt();
            m.record_completion(false, 50);
        }
        assert!(!m.is_eligible(true, 5, now));
    }
}
