use std::time::Duration;

/// Exponential backoff with additive jitter, per attempt count `a` (1-based):
/// `min(base * 2^(a-1) + jitter, cap)`, with `jitter` uniform in `[0, base)`.
#[must_use]
pub fn compute(attempts: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.as_secs_f64() * 2f64.powi(attempts.saturating_sub(1) as i32);
    let jitter = rand::random::<f64>() * base.as_secs_f64();
    Duration::from_secs_f64((exp + jitter).min(cap.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_monotonically_nondecreasing_in_expectation() {
        let base = Duration::from_millis(300);
        let cap = Duration::from_secs(60);
        let first = compute(1, base, cap).as_secs_f64();
        let third = compute(3, base, cap).as_secs_f64();
        // third attempt's exponential floor (1.2s) exceeds first's jitter ceiling (0.6s).
        assert!(third > first);
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        let base = Duration::from_millis(300);
        let cap = Duration::from_secs(60);
        for attempt in 1..20 {
            assert!(compute(attempt, base, cap) <= cap);
        }
    }
}
