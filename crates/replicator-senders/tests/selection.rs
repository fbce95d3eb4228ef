use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use replicator_core::types::{SenderBinding, SenderId};
use replicator_senders::{Selection, Sender, SenderPool};
use replicator_store::SenderRecord;

fn sender_record(id: i64, enabled: bool) -> SenderRecord {
    SenderRecord {
        id: SenderId(id),
        display_handle: format!("sender-{id}"),
        credential: "secret".to_string(),
        enabled,
        usage_count: 0,
        last_used_at: None,
    }
}

#[test]
fn prefers_least_loaded_sender() {
    let pool = SenderPool::new(5);
    let now = Instant::now();
    let a = sender_record(1, true);
    let b = sender_record(2, true);

    pool.begin_attempt(a.id);
    pool.begin_attempt(a.id);
    pool.begin_attempt(b.id);

    match pool.select(&[a.clone(), b.clone()], SenderBinding::Pool, now, Duration::from_millis(300)) {
        Selection::Use(id) => assert_eq!(id, b.id),
        Selection::Requeue { .. } => panic!("expected a usable sender"),
    }
}

#[test]
fn ties_break_on_success_rate_then_failures() {
    let pool = SenderPool::new(5);
    let now = Instant::now();
    let a = sender_record(1, true);
    let b = sender_record(2, true);

    // Equal in_flight (zero); give `b` a better success rate.
    pool.begin_attempt(b.id);
    pool.record_completion(b.id, true, 20);

    match pool.select(&[a.clone(), b.clone()], SenderBinding::Pool, now, Duration::from_millis(300)) {
        Selection::Use(id) => assert_eq!(id, b.id),
        Selection::Requeue { .. } => panic!("expected a usable sender"),
    }
}

#[test]
fn specific_binding_is_honored_when_eligible() {
    let pool = SenderPool::new(5);
    let now = Instant::now();
    let a = sender_record(1, true);
    let b = sender_record(2, true);

    // Make `a` look worse on every metric; binding should still pick it.
    pool.begin_attempt(a.id);
    pool.begin_attempt(a.id);

    match pool.select(
        &[a.clone(), b.clone()],
        SenderBinding::Specific(a.id),
        now,
        Duration::from_millis(300),
    ) {
        Selection::Use(id) => assert_eq!(id, a.id),
        Selection::Requeue { .. } => panic!("expected the bound sender"),
    }
}

#[test]
fn rate_limited_sender_is_requeued_with_platform_delay() {
    let pool = SenderPool::new(5);
    let now = Instant::now();
    let a = sender_record(1, true);

    pool.begin_attempt(a.id);
    pool.record_rate_limited(a.id, Duration::from_secs(10), now);

    match pool.select(&[a.clone()], SenderBinding::Pool, now, Duration::from_millis(300)) {
        Selection::Requeue { delay } => assert!(delay >= Duration::from_secs(10)),
        Selection::Use(_) => panic!("sender should still be rate-limited"),
    }
}

#[test]
fn sender_marked_unhealthy_after_f_max_failures() {
    let pool = SenderPool::new(3);
    let now = Instant::now();
    let a = sender_record(1, true);

    for _ in 0..3 {
        pool.begin_attempt(a.id);
        pool.record_completion(a.id, false, 10);
    }

    match pool.select(&[a.clone()], SenderBinding::Pool, now, Duration::from_millis(300)) {
        Selection::Requeue { delay } => assert_eq!(delay, Duration::from_millis(300)),
        Selection::Use(_) => panic!("sender crossed F_max and should be excluded"),
    }
}

struct AlwaysHealthy;

#[async_trait]
impl Sender for AlwaysHealthy {
    fn id(&self) -> i64 {
        7
    }
    async fn send(
        &self,
        _chat_id: i64,
        _text: &str,
        _entities: &[replicator_core::types::Entity],
        _reply_to_id: Option<i64>,
    ) -> Result<i64, replicator_core::types::SendOutcome> {
        unimplemented!()
    }
    async fn edit(
        &self,
        _chat_id: i64,
        _msg_id: i64,
        _text: &str,
        _entities: &[replicator_core::types::Entity],
    ) -> Result<(), replicator_core::types::SendOutcome> {
        unimplemented!()
    }
    async fn delete(&self, _chat_id: i64, _msg_id: i64) -> Result<(), replicator_core::types::SendOutcome> {
        unimplemented!()
    }
    async fn probe(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn probe_recovers_unhealthy_sender() {
    let pool = SenderPool::new(2);
    let id = SenderId(7);
    pool.register(Arc::new(AlwaysHealthy));

    for _ in 0..2 {
        pool.begin_attempt(id);
        pool.record_completion(id, false, 5);
    }
    assert_eq!(pool.consecutive_failures(id), 2);

    let probe_time = Instant::now() + Duration::from_secs(31);
    pool.run_health_probe_once(probe_time).await;

    assert_eq!(pool.consecutive_failures(id), 0);
}
