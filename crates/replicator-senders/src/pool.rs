use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use replicator_core::types::{SenderBinding, SenderId};
use replicator_store::SenderRecord;

use crate::error::{Result, SenderPoolError};
use crate::metrics::SenderMetrics;
use crate::sender::Sender;

const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Result of a dispatch-time selection attempt.
pub enum Selection {
    Use(SenderId),
    Requeue { delay: Duration },
}

/// Tracks runtime health/load metrics for every sender and decides which
/// one should carry the next task.
///
/// `f_max` mirrors `SenderPoolConfig::f_max`. Metrics are created lazily the
/// first time a sender id is seen, so the pool never needs an explicit
/// registration step to start tracking health.
pub struct SenderPool {
    metrics: DashMap<SenderId, SenderMetrics>,
    senders: DashMap<SenderId, Arc<dyn Sender>>,
    f_max: u32,
}

impl SenderPool {
    pub fn new(f_max: u32) -> Self {
        Self {
            metrics: DashMap::new(),
            senders: DashMap::new(),
            f_max,
        }
    }

    /// Attach a live sender implementation, used for the periodic unhealthy
    /// recovery probe and for dispatch. Replaces any prior registration for
    /// the same id.
    pub fn register(&self, sender: Arc<dyn Sender>) {
        self.senders.insert(SenderId(sender.id()), sender);
    }

    /// Fetch a previously registered sender implementation, if any.
    pub fn get(&self, id: SenderId) -> Option<Arc<dyn Sender>> {
        self.senders.get(&id).map(|s| s.clone())
    }

    pub fn unregister(&self, id: SenderId) {
        self.senders.remove(&id);
        self.metrics.remove(&id);
    }

    fn metrics_entry(&self, id: SenderId) -> dashmap::mapref::one::RefMut<'_, SenderId, SenderMetrics> {
        self.metrics.entry(id).or_insert_with(SenderMetrics::new)
    }

    /// Selection for one dispatch task among `candidates` (the pair's
    /// enabled senders), honoring a specific binding first.
    pub fn select(
        &self,
        candidates: &[SenderRecord],
        binding: SenderBinding,
        now: Instant,
        global_retry_backoff: Duration,
    ) -> Selection {
        if let SenderBinding::Specific(id) = binding {
            if let Some(record) = candidates.iter().find(|s| s.id == id) {
                let metrics = self.metrics_entry(id);
                if metrics.is_eligible(record.enabled, self.f_max, now) {
                    return Selection::Use(id);
                }
            }
        }

        let eligible: Vec<&SenderRecord> = candidates
            .iter()
            .filter(|s| {
                self.metrics_entry(s.id).is_eligible(s.enabled, self.f_max, now)
            })
            .collect();

        if let Some(best) = self.best_of(&eligible) {
            return Selection::Use(best);
        }

        let min_rate_limit_wait = candidates
            .iter()
            .filter_map(|s| self.metrics_entry(s.id).rate_limited_until())
            .map(|until| until.saturating_duration_since(now))
            .min()
            .unwrap_or(Duration::ZERO);

        Selection::Requeue {
            delay: min_rate_limit_wait.max(global_retry_backoff),
        }
    }

    fn best_of(&self, eligible: &[&SenderRecord]) -> Option<SenderId> {
        eligible
            .iter()
            .map(|s| {
                let m = self.metrics_entry(s.id);
                (s.id, m.in_flight(), m.success_rate(), m.consecutive_failures())
            })
            .min_by(|a, b| {
                a.1.cmp(&b.1)
                    .then(b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal))
                    .then(a.3.cmp(&b.3))
            })
            .map(|(id, ..)| id)
    }

    pub fn begin_attempt(&self, id: SenderId) {
        self.metrics_entry(id).begin_attempt();
    }

    pub fn record_completion(&self, id: SenderId, success: bool, latency_ms: u64) {
        self.metrics_entry(id).record_completion(success, latency_ms);
    }

    pub fn record_rate_limited(&self, id: SenderId, retry_after: Duration, now: Instant) {
        self.metrics_entry(id).record_rate_limited(retry_after, now);
    }

    pub fn in_flight(&self, id: SenderId) -> u32 {
        self.metrics_entry(id).in_flight()
    }

    pub fn consecutive_failures(&self, id: SenderId) -> u32 {
        self.metrics_entry(id).consecutive_failures()
    }

    pub fn success_rate(&self, id: SenderId) -> f64 {
        self.metrics_entry(id).success_rate()
    }

    /// Snapshot of every registered sender implementation, used by the
    /// health sweeper to try each one when no specific binding applies.
    pub fn registered(&self) -> Vec<Arc<dyn Sender>> {
        self.senders.iter().map(|e| e.value().clone()).collect()
    }

    /// Probe every sender whose failure streak makes it due, clearing the
    /// streak on success. Intended to be driven by a `tokio::time::interval`
    /// loop ticking at `PROBE_INTERVAL`, but exposed standalone for tests.
    pub async fn run_health_probe_once(&self, now: Instant) {
        let due: Vec<SenderId> = self
            .metrics
            .iter()
            .filter(|e| e.value().due_for_probe(self.f_max, PROBE_INTERVAL, now))
            .map(|e| *e.key())
            .collect();

        for id in due {
            let sender = match self.senders.get(&id) {
                Some(s) => s.clone(),
                None => continue,
            };
            self.metrics_entry(id).mark_probed(now);
            if sender.probe().await {
                info!(sender_id = id.0, "unhealthy sender recovered via probe");
                self.metrics_entry(id).record_probe_success();
            } else {
                warn!(sender_id = id.0, "health probe failed, sender remains unhealthy");
            }
        }
    }

    /// Run the probe loop until `shutdown` fires, ticking every 30 s.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(PROBE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_health_probe_once(Instant::now()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    pub fn eligibility_snapshot(&self, senders: &[SenderRecord], now: Instant) -> Result<()> {
        let any_eligible = senders
            .iter()
            .any(|s| self.metrics_entry(s.id).is_eligible(s.enabled, self.f_max, now));
        if any_eligible {
            Ok(())
        } else {
            Err(SenderPoolError::NoneEligible { retry_after_ms: 0 })
        }
    }
}
