use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use replicator_core::types::SenderId;
use replicator_dispatch::Dispatcher;
use replicator_senders::SenderPool;
use replicator_store::Store;

use crate::error::Result;
use crate::metrics::{ErrorRateWatch, Severity};

const TICK: Duration = Duration::from_secs(1);
const QUEUE_PRESSURE_THRESHOLD: f64 = 0.80;

/// One polled reading of system health, suitable for the admin `health`
/// and `status` surfaces.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub queue_depth_by_priority: [usize; 4],
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub error_rate: f64,
    pub has_eligible_sender: bool,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    ErrorRate(Severity),
    QueueNearCapacity { depth: usize, capacity: usize },
    NoEligibleSenders,
}

/// Periodically samples the dispatcher queue and sender pool, derives an
/// aggregate error rate, and raises alerts once a breach has sustained.
/// Owns no delivery path of its own; `run` is meant to be spawned alongside
/// the dispatcher's worker pool and the sender pool's probe loop.
pub struct HealthMonitor {
    store: Arc<Store>,
    sender_pool: Arc<SenderPool>,
    dispatcher: Arc<Dispatcher>,
    queue_capacity: usize,
    error_watch: Mutex<ErrorRateWatch>,
}

impl HealthMonitor {
    pub fn new(store: Arc<Store>, sender_pool: Arc<SenderPool>, dispatcher: Arc<Dispatcher>, queue_capacity: usize) -> Self {
        Self {
            store,
            sender_pool,
            dispatcher,
            queue_capacity,
            error_watch: Mutex::new(ErrorRateWatch::new()),
        }
    }

    /// Aggregate error rate across enabled senders: one minus the mean of
    /// their individual success-rate EMAs. Senders with no completed
    /// attempts yet read as perfectly healthy.
    fn aggregate_error_rate(&self) -> Result<f64> {
        let senders = self.store.list_senders()?;
        let enabled: Vec<_> = senders.iter().filter(|s| s.enabled).collect();
        if enabled.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = enabled.iter().map(|s| 1.0 - self.sender_pool.success_rate(s.id)).sum();
        Ok(total / enabled.len() as f64)
    }

    async fn sample(&self, now: Instant) -> Result<HealthSnapshot> {
        let depth_by_priority = self.dispatcher.depth_by_priority().await;
        let queue_depth: usize = depth_by_priority.iter().sum();
        let error_rate = self.aggregate_error_rate()?;

        let senders = self.store.list_senders()?;
        let registered: std::collections::HashSet<SenderId> =
            self.sender_pool.registered().iter().map(|s| SenderId(s.id())).collect();
        let enabled: Vec<_> = senders.into_iter().filter(|s| s.enabled && registered.contains(&s.id)).collect();
        let has_eligible_sender = !enabled.is_empty() && self.sender_pool.eligibility_snapshot(&enabled, now).is_ok();

        let mut alerts = Vec::new();
        if let Some(severity) = self.error_watch.lock().await.observe(error_rate, now) {
            alerts.push(Alert::ErrorRate(severity));
        }
        if self.queue_capacity > 0 && queue_depth as f64 / self.queue_capacity as f64 > QUEUE_PRESSURE_THRESHOLD {
            alerts.push(Alert::QueueNearCapacity { depth: queue_depth, capacity: self.queue_capacity });
        }
        if !has_eligible_sender {
            alerts.push(Alert::NoEligibleSenders);
        }

        Ok(HealthSnapshot {
            queue_depth_by_priority: depth_by_priority,
            queue_depth,
            queue_capacity: self.queue_capacity,
            error_rate,
            has_eligible_sender,
            alerts,
        })
    }

    /// One-shot snapshot for the admin `health`/`status` commands.
    pub async fn snapshot(&self) -> Result<HealthSnapshot> {
        self.sample(Instant::now()).await
    }

    /// Drive the 1 s sampling loop until `shutdown` fires, logging each
    /// alert as it is raised.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sample(Instant::now()).await {
                        Ok(snapshot) => {
                            for alert in &snapshot.alerts {
                                match alert {
                                    Alert::ErrorRate(Severity::Critical) => {
                                        warn!(error_rate = snapshot.error_rate, "critical error rate sustained")
                                    }
                                    Alert::ErrorRate(Severity::Elevated) => {
                                        info!(error_rate = snapshot.error_rate, "elevated error rate sustained")
                                    }
                                    Alert::QueueNearCapacity { depth, capacity } => {
                                        warn!(depth, capacity, "dispatch queue near capacity")
                                    }
                                    Alert::NoEligibleSenders => warn!("no eligible sender available"),
                                }
                            }
                        }
                        Err(err) => warn!(%err, "health sample failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("health monitor stopped");
    }
}
