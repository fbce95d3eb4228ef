use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

use replicator_core::types::Priority;

use crate::types::DispatchTask;

fn priority_index(p: Priority) -> usize {
    match p {
        Priority::Urgent => 0,
        Priority::High => 1,
        Priority::Normal => 2,
        Priority::Low => 3,
    }
}

/// Four FIFO buckets, one per `Priority`, drained highest-first. Bounded by
/// total task count across all buckets.
pub struct PriorityQueue {
    buckets: Mutex<[VecDeque<DispatchTask>; 4]>,
    capacity: usize,
    notify: Notify,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: Mutex::new([
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ]),
            capacity,
            notify: Notify::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.iter().map(VecDeque::len).sum()
    }

    pub async fn depth_by_priority(&self) -> [usize; 4] {
        let buckets = self.buckets.lock().await;
        [
            buckets[0].len(),
            buckets[1].len(),
            buckets[2].len(),
            buckets[3].len(),
        ]
    }

    /// Push a task, rejecting if the queue is already at capacity.
    pub async fn push(&self, task: DispatchTask) -> Result<(), DispatchTask> {
        let mut buckets = self.buckets.lock().await;
        let total: usize = buckets.iter().map(VecDeque::len).sum();
        if total >= self.capacity {
            return Err(task);
        }
        buckets[priority_index(task.priority)].push_back(task);
        drop(buckets);
        self.notify.notify_one();
        Ok(())
    }

    /// Re-push a task that is being retried or requeued, bypassing the
    /// capacity check since the task already occupied a slot.
    pub async fn requeue(&self, task: DispatchTask) {
        let mut buckets = self.buckets.lock().await;
        buckets[priority_index(task.priority)].push_back(task);
        drop(buckets);
        self.notify.notify_one();
    }

    /// Pop the highest-priority task whose `earliest_send_at <= now`, if any.
    pub async fn pop_ready(&self) -> Option<DispatchTask> {
        let now = tokio::time::Instant::now();
        let mut buckets = self.buckets.lock().await;
        for bucket in buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|t| t.earliest_send_at <= now) {
                return bucket.remove(pos);
            }
        }
        None
    }

    pub async fn drain_all(&self) -> Vec<DispatchTask> {
        let mut buckets = self.buckets.lock().await;
        buckets.iter_mut().flat_map(|b| b.drain(..)).collect()
    }

    pub async fn wait_for_work(&self) {
        self.notify.notified().await;
    }
}
