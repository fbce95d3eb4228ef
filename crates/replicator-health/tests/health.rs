use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use replicator_core::config::DispatcherConfig;
use replicator_core::types::{Entity, PairStatus, SendOutcome, SenderBinding};
use replicator_dispatch::Dispatcher;
use replicator_health::{Alert, HealthMonitor, SubscriptionSweeper};
use replicator_senders::{Sender, SenderPool};
use replicator_store::{FilterPolicy, Pair, PairStats, Store, Subscription};

fn new_pair(store: &Store, source_chat: i64, dest_chat: i64) -> Pair {
    let mut pair = Pair {
        id: replicator_core::types::PairId(0),
        source_chat,
        destination_chat: dest_chat,
        name: "pair".to_string(),
        status: PairStatus::Active,
        sender_binding: SenderBinding::Pool,
        filters: FilterPolicy::default(),
        stats: PairStats::default(),
        created_at: String::new(),
        updated_at: String::new(),
    };
    store.upsert_pair(&mut pair).unwrap();
    pair
}

#[tokio::test]
async fn reports_no_eligible_senders_when_pool_is_empty() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let sender_pool = Arc::new(SenderPool::new(5));
    let dispatcher = Dispatcher::new(
        sender_pool.clone(),
        DispatcherConfig {
            max_workers: 1,
            queue_capacity: 10,
            ..Default::default()
        },
    );
    store.add_sender("handle", "cred").unwrap();

    let monitor = HealthMonitor::new(store, sender_pool, dispatcher, 10);
    let snapshot = monitor.snapshot().await.unwrap();

    assert!(!snapshot.has_eligible_sender);
    assert!(snapshot.alerts.contains(&Alert::NoEligibleSenders));
}

#[tokio::test]
async fn error_rate_alert_requires_sustained_breach() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let sender_pool = Arc::new(SenderPool::new(5));
    let dispatcher = Dispatcher::new(
        sender_pool.clone(),
        DispatcherConfig {
            max_workers: 1,
            queue_capacity: 10,
            ..Default::default()
        },
    );
    let record = store.add_sender("flaky", "cred").unwrap();
    for _ in 0..10 {
        sender_pool.begin_attempt(record.id);
        sender_pool.record_completion(record.id, false, 5);
    }

    let monitor = HealthMonitor::new(store, sender_pool, dispatcher, 10);
    let first = monitor.snapshot().await.unwrap();
    assert!(!first.alerts.iter().any(|a| matches!(a, Alert::ErrorRate(_))));
}

struct Kicker {
    kicked: Arc<AtomicUsize>,
}

#[async_trait]
impl Sender for Kicker {
    fn id(&self) -> i64 {
        1
    }
    async fn send(&self, _chat_id: i64, _text: &str, _entities: &[Entity], _reply_to_id: Option<i64>) -> Result<i64, SendOutcome> {
        unimplemented!()
    }
    async fn edit(&self, _chat_id: i64, _msg_id: i64, _text: &str, _entities: &[Entity]) -> Result<(), SendOutcome> {
        unimplemented!()
    }
    async fn delete(&self, _chat_id: i64, _msg_id: i64) -> Result<(), SendOutcome> {
        unimplemented!()
    }
    async fn kick_user(&self, _chat_id: i64, _user_id: &str) -> Result<(), SendOutcome> {
        self.kicked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn probe(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn sweep_removes_expired_subscription_from_every_active_destination() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    new_pair(&store, 100, 200);
    new_pair(&store, 101, 201);

    let expired_at = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    store
        .add_subscription(&Subscription {
            user_id: "user-1".to_string(),
            expires_at: expired_at,
            added_by: "admin".to_string(),
            notes: None,
        })
        .unwrap();

    let kicked = Arc::new(AtomicUsize::new(0));
    let sender_pool = Arc::new(SenderPool::new(5));
    sender_pool.register(Arc::new(Kicker { kicked: kicked.clone() }));

    let sweeper = SubscriptionSweeper::new(store.clone(), sender_pool);
    let removed = sweeper.sweep_once().await.unwrap();

    assert_eq!(removed, 1);
    assert_eq!(kicked.load(Ordering::SeqCst), 2);
    assert!(store.list_subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn sweep_is_a_no_op_when_nothing_has_expired() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    new_pair(&store, 100, 200);
    store
        .add_subscription(&Subscription {
            user_id: "user-1".to_string(),
            expires_at: (Utc::now() + ChronoDuration::hours(1)).to_rfc3339(),
            added_by: "admin".to_string(),
            notes: None,
        })
        .unwrap();

    let sender_pool = Arc::new(SenderPool::new(5));
    let sweeper = SubscriptionSweeper::new(store.clone(), sender_pool);
    let removed = sweeper.sweep_once().await.unwrap();

    assert_eq!(removed, 0);
    assert_eq!(store.list_subscriptions().unwrap().len(), 1);
}
