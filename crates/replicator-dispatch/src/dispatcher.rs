use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use replicator_core::config::DispatcherConfig;
use replicator_core::types::{Priority, SendOutcome, SenderBinding};
use replicator_senders::{Selection, SenderPool};

use crate::backoff;
use crate::circuit::CircuitBreaker;
use crate::error::{DispatchError, Result};
use crate::queue::PriorityQueue;
use crate::types::{ActionResult, DispatchTask, TaskAction, TaskResult};

/// Fixed-size worker pool draining a single bounded priority queue.
pub struct Dispatcher {
    queue: PriorityQueue,
    circuit: CircuitBreaker,
    sender_pool: Arc<SenderPool>,
    config: DispatcherConfig,
    sequence: AtomicU64,
    accepting: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(sender_pool: Arc<SenderPool>, config: DispatcherConfig) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            queue: PriorityQueue::new(config.queue_capacity),
            circuit: CircuitBreaker::new(),
            sender_pool,
            config,
            sequence: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.len().await
    }

    pub async fn depth_by_priority(&self) -> [usize; 4] {
        self.queue.depth_by_priority().await
    }

    /// Submit a task for dispatch. Rejected if shutting down, the queue is
    /// full, or the circuit breaker has tripped for this priority.
    pub async fn submit(
        &self,
        pair_id: replicator_core::types::PairId,
        priority: Priority,
        action: TaskAction,
        binding: SenderBinding,
        candidates: Vec<replicator_store::SenderRecord>,
    ) -> Result<tokio::sync::oneshot::Receiver<TaskResult>> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(DispatchError::ShuttingDown);
        }
        if self.circuit.rejects(priority) {
            return Err(DispatchError::Backpressure);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let task = DispatchTask {
            pair_id,
            priority,
            action,
            binding,
            candidates,
            attempts: 0,
            earliest_send_at: tokio::time::Instant::now(),
            on_complete: Some(tx),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };

        self.queue
            .push(task)
            .await
            .map_err(|_| DispatchError::QueueOverflow(self.config.queue_capacity))?;
        Ok(rx)
    }

    /// Spawn the fixed worker pool. Returns immediately; workers run until
    /// `shutdown` completes its drain.
    pub fn spawn_workers(self: &Arc<Self>) {
        for worker_id in 0..self.config.max_workers {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                dispatcher.worker_loop(worker_id).await;
            });
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if let Some(task) = self.queue.pop_ready().await {
                self.handle_task(task).await;
                continue;
            }

            tokio::select! {
                _ = self.queue.wait_for_work() => {}
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!(worker_id, "dispatch worker stopped");
    }

    async fn handle_task(&self, mut task: DispatchTask) {
        let now = tokio::time::Instant::now();
        let selection = self.sender_pool.select(
            &task.candidates,
            task.binding,
            std::time::Instant::now(),
            Duration::from_secs_f64(self.config.retry_base_seconds),
        );

        let sender_id = match selection {
            Selection::Use(id) => id,
            Selection::Requeue { delay } => {
                task.earliest_send_at = now + delay;
                self.queue.requeue(task).await;
                return;
            }
        };

        self.sender_pool.begin_attempt(sender_id);
        let started = std::time::Instant::now();
        let outcome = self.execute(sender_id, &task.action).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                self.sender_pool.record_completion(sender_id, true, latency_ms);
                self.circuit.record(true);
                let task_result = match result {
                    ActionResult::Sent(dest_msg_id) => TaskResult::Sent { dest_msg_id, sender_id },
                    ActionResult::Edited => TaskResult::Edited,
                    ActionResult::Deleted => TaskResult::Deleted,
                };
                self.complete(task, task_result);
            }
            Err(SendOutcome::Permanent(reason)) => {
                self.sender_pool.record_completion(sender_id, false, latency_ms);
                self.circuit.record(false);
                self.complete(task, TaskResult::Failed(reason));
            }
            Err(SendOutcome::RateLimited { retry_after_ms }) => {
                self.sender_pool.record_rate_limited(
                    sender_id,
                    Duration::from_millis(retry_after_ms),
                    std::time::Instant::now(),
                );
                self.circuit.record(false);
                self.retry_or_fail(task, Duration::from_millis(retry_after_ms)).await;
            }
            Err(SendOutcome::Transient(reason)) => {
                self.sender_pool.record_completion(sender_id, false, latency_ms);
                self.circuit.record(false);
                let base = Duration::from_secs_f64(self.config.retry_base_seconds);
                let cap = Duration::from_secs_f64(self.config.retry_cap_seconds);
                let backoff = backoff::compute(task.attempts + 1, base, cap);
                warn!(reason, "transient send failure, scheduling retry");
                self.retry_or_fail(task, backoff).await;
            }
        }
    }

    async fn execute(
        &self,
        sender_id: replicator_core::types::SenderId,
        action: &TaskAction,
    ) -> std::result::Result<ActionResult, SendOutcome> {
        let Some(sender) = self.sender_pool.get(sender_id) else {
            return Err(SendOutcome::Transient(format!("sender {sender_id} not registered")));
        };
        match action {
            TaskAction::Send { chat_id, text, entities, reply_to_id } => sender
                .send(*chat_id, text, entities, *reply_to_id)
                .await
                .map(ActionResult::Sent),
            TaskAction::SendMedia { chat_id, caption, bytes, mime, entities, reply_to_id } => sender
                .send_media(*chat_id, caption, bytes, mime, entities, *reply_to_id)
                .await
                .map(ActionResult::Sent),
            TaskAction::Edit { chat_id, msg_id, text, entities } => sender
                .edit(*chat_id, *msg_id, text, entities)
                .await
                .map(|()| ActionResult::Edited),
            TaskAction::Delete { chat_id, msg_id } => sender
                .delete(*chat_id, *msg_id)
                .await
                .map(|()| ActionResult::Deleted),
        }
    }

    async fn retry_or_fail(&self, mut task: DispatchTask, delay: Duration) {
        task.attempts += 1;
        if task.attempts >= self.config.max_attempts {
            self.complete(task, TaskResult::Failed("max attempts exceeded".to_string()));
            return;
        }
        task.earliest_send_at = tokio::time::Instant::now() + delay;
        self.queue.requeue(task).await;
    }

    fn complete(&self, mut task: DispatchTask, result: TaskResult) {
        if let Some(tx) = task.on_complete.take() {
            let _ = tx.send(result);
        }
    }

    /// Drop every queued task right now, completing each with `Cancelled`.
    /// Does not affect tasks already claimed by a worker.
    pub async fn clear_queue(&self) -> usize {
        let drained = self.queue.drain_all().await;
        let count = drained.len();
        for task in drained {
            self.complete(task, TaskResult::Cancelled);
        }
        count
    }

    /// Stop accepting new tasks, drain the queue for up to `drain_seconds`,
    /// then abandon whatever remains with a `Cancelled` outcome.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        let drain_deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.drain_seconds);

        while tokio::time::Instant::now() < drain_deadline && self.queue.len().await > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let _ = self.shutdown_tx.send(true);

        for task in self.queue.drain_all().await {
            self.complete(task, TaskResult::Cancelled);
        }
        info!("dispatcher shutdown complete");
    }
}
