use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use replicator_core::config::DispatcherConfig;
use replicator_core::types::{Entity, PairId, Priority, SendOutcome, SenderBinding, SenderId};
use replicator_dispatch::{Dispatcher, TaskAction, TaskResult};
use replicator_senders::{Sender, SenderPool};
use replicator_store::SenderRecord;

struct RecordingSender {
    id: i64,
    order: Arc<Mutex<Vec<i64>>>,
}

#[async_trait]
impl Sender for RecordingSender {
    fn id(&self) -> i64 {
        self.id
    }
    async fn send(&self, chat_id: i64, _text: &str, _entities: &[Entity], _reply_to_id: Option<i64>) -> Result<i64, SendOutcome> {
        self.order.lock().unwrap().push(chat_id);
        Err(SendOutcome::Permanent("test sink, not actually delivered".to_string()))
    }
    async fn edit(&self, _chat_id: i64, _msg_id: i64, _text: &str, _entities: &[Entity]) -> Result<(), SendOutcome> {
        unimplemented!()
    }
    async fn delete(&self, _chat_id: i64, _msg_id: i64) -> Result<(), SendOutcome> {
        unimplemented!()
    }
    async fn probe(&self) -> bool {
        true
    }
}

fn test_config() -> DispatcherConfig {
    DispatcherConfig {
        max_workers: 1,
        queue_capacity: 16,
        retry_base_seconds: 0.05,
        retry_cap_seconds: 1.0,
        max_attempts: 2,
        drain_seconds: 1,
    }
}

fn sender_record(id: i64) -> SenderRecord {
    SenderRecord {
        id: SenderId(id),
        display_handle: "test".to_string(),
        credential: "x".to_string(),
        enabled: true,
        usage_count: 0,
        last_used_at: None,
    }
}

#[tokio::test]
async fn higher_priority_task_is_drained_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let pool = Arc::new(SenderPool::new(5));
    pool.register(Arc::new(RecordingSender { id: 1, order: order.clone() }));

    let dispatcher = Dispatcher::new(pool, test_config());

    let candidates = vec![sender_record(1)];
    let low_rx = dispatcher
        .submit(
            PairId(1),
            Priority::Low,
            TaskAction::Send { chat_id: 100, text: "low".into(), entities: Vec::new(), reply_to_id: None },
            SenderBinding::Pool,
            candidates.clone(),
        )
        .await
        .unwrap();
    let urgent_rx = dispatcher
        .submit(
            PairId(1),
            Priority::Urgent,
            TaskAction::Send { chat_id: 200, text: "urgent".into(), entities: Vec::new(), reply_to_id: None },
            SenderBinding::Pool,
            candidates,
        )
        .await
        .unwrap();

    dispatcher.spawn_workers();

    let _ = tokio::time::timeout(Duration::from_secs(2), urgent_rx).await;
    let _ = tokio::time::timeout(Duration::from_secs(2), low_rx).await;

    let observed = order.lock().unwrap().clone();
    assert_eq!(observed.first(), Some(&200), "urgent task should be handled before low priority");
}

#[tokio::test]
async fn submit_rejects_once_queue_is_full() {
    let pool = Arc::new(SenderPool::new(5));
    let config = DispatcherConfig {
        queue_capacity: 1,
        ..test_config()
    };
    let dispatcher = Dispatcher::new(pool, config);
    let candidates = vec![sender_record(1)];

    let _first = dispatcher
        .submit(
            PairId(1),
            Priority::Normal,
            TaskAction::Send { chat_id: 1, text: "a".into(), entities: Vec::new(), reply_to_id: None },
            SenderBinding::Pool,
            candidates.clone(),
        )
        .await
        .unwrap();

    let second = dispatcher
        .submit(
            PairId(1),
            Priority::Normal,
            TaskAction::Send { chat_id: 2, text: "b".into(), entities: Vec::new(), reply_to_id: None },
            SenderBinding::Pool,
            candidates,
        )
        .await;

    assert!(second.is_err());
}

#[tokio::test]
async fn transient_failure_is_retried_then_fails_permanently() {
    struct AlwaysTransient;
    #[async_trait]
    impl Sender for AlwaysTransient {
        fn id(&self) -> i64 {
            9
        }
        async fn send(&self, _chat_id: i64, _text: &str, _entities: &[Entity], _reply_to_id: Option<i64>) -> Result<i64, SendOutcome> {
            Err(SendOutcome::Transient("simulated network blip".to_string()))
        }
        async fn edit(&self, _chat_id: i64, _msg_id: i64, _text: &str, _entities: &[Entity]) -> Result<(), SendOutcome> {
            unimplemented!()
        }
        async fn delete(&self, _chat_id: i64, _msg_id: i64) -> Result<(), SendOutcome> {
            unimplemented!()
        }
        async fn probe(&self) -> bool {
            true
        }
    }

    let pool = Arc::new(SenderPool::new(5));
    pool.register(Arc::new(AlwaysTransient));
    let dispatcher = Dispatcher::new(pool, test_config());
    dispatcher.spawn_workers();

    let rx = dispatcher
        .submit(
            PairId(1),
            Priority::Normal,
            TaskAction::Send { chat_id: 1, text: "a".into(), entities: Vec::new(), reply_to_id: None },
            SenderBinding::Pool,
            vec![sender_record(9)],
        )
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
    assert!(matches!(result, TaskResult::Failed(_)));
}
