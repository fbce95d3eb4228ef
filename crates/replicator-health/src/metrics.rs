use std::time::{Duration, Instant};

const SUSTAIN: Duration = Duration::from_secs(60);
const ELEVATED_THRESHOLD: f64 = 0.25;
const CRITICAL_THRESHOLD: f64 = 0.50;

/// Severity assigned once a breach has held for the full sustain window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Elevated,
    Critical,
}

/// Tracks how long the aggregate error rate has continuously sat above
/// each threshold, only firing once a breach has held for `SUSTAIN`. Mirrors
/// the dispatcher's rolling-window circuit breaker but watches a derived
/// rate rather than raw outcomes, since the rate here is already an EMA
/// aggregate over registered senders.
pub struct ErrorRateWatch {
    elevated_since: Option<Instant>,
    critical_since: Option<Instant>,
}

impl ErrorRateWatch {
    pub fn new() -> Self {
        Self {
            elevated_since: None,
            critical_since: None,
        }
    }

    /// Feed the current error rate and get back the sustained severity, if
    /// any breach has held long enough.
    pub fn observe(&mut self, error_rate: f64, now: Instant) -> Option<Severity> {
        if error_rate > CRITICAL_THRESHOLD {
            let since = *self.critical_since.get_or_insert(now);
            self.elevated_since.get_or_insert(now);
            if now.duration_since(since) >= SUSTAIN {
                return Some(Severity::Critical);
            }
        } else if error_rate > ELEVATED_THRESHOLD {
            self.critical_since = None;
            let since = *self.elevated_since.get_or_insert(now);
            if now.duration_since(since) >= SUSTAIN {
                return Some(Severity::Elevated);
            }
        } else {
            self.elevated_since = None;
            self.critical_since = None;
        }
        None
    }
}

impl Default for ErrorRateWatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_elevated_only_after_sustain_window() {
        let mut watch = ErrorRateWatch::new();
        let start = Instant::now();
        assert_eq!(watch.observe(0.3, start), None);
        assert_eq!(watch.observe(0.3, start + Duration::from_secs(30)), None);
        assert_eq!(
            watch.observe(0.3, start + Duration::from_secs(61)),
            Some(Severity::Elevated)
        );
    }

    #[test]
    fn recovery_resets_the_window() {
        let mut watch = ErrorRateWatch::new();
        let start = Instant::now();
        watch.observe(0.3, start);
        assert_eq!(watch.observe(0.05, start + Duration::from_secs(10)), None);
        assert_eq!(watch.observe(0.3, start + Duration::from_secs(61)), None);
    }

    #[test]
    fn critical_overrides_elevated() {
        let mut watch = ErrorRateWatch::new();
        let start = Instant::now();
        watch.observe(0.6, start);
        assert_eq!(
            watch.observe(0.6, start + Duration::from_secs(61)),
            Some(Severity::Critical)
        );
    }
}
