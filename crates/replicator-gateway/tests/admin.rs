use std::sync::Arc;

use replicator_core::config::{DispatcherConfig, ImageGuardConfig};
use replicator_dispatch::Dispatcher;
use replicator_health::{HealthMonitor, SubscriptionSweeper};
use replicator_pipeline::Pipeline;
use replicator_senders::SenderPool;
use replicator_store::Store;

#[path = "../src/admin.rs"]
mod admin;
#[path = "../src/error.rs"]
mod error;

use admin::{AdminApi, PairField};
use replicator_core::types::PairStatus;
use replicator_filter::FilterOutcome;

fn harness() -> AdminApi {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let sender_pool = Arc::new(SenderPool::new(5));
    let dispatcher = Dispatcher::new(sender_pool.clone(), DispatcherConfig::default());
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        sender_pool.clone(),
        dispatcher.clone(),
        "/nonexistent/font.ttf".to_string(),
    ));
    let health_monitor = Arc::new(HealthMonitor::new(
        store.clone(),
        sender_pool.clone(),
        dispatcher.clone(),
        100,
    ));
    let sweeper = Arc::new(SubscriptionSweeper::new(store.clone(), sender_pool.clone()));
    AdminApi::new(store, pipeline, dispatcher, sender_pool, sweeper, health_monitor, ImageGuardConfig::default())
}

#[test]
fn add_pair_then_list_and_edit() {
    let api = harness();
    let pair = api.add_pair(1, 2, "demo", None).unwrap();
    assert_eq!(api.list_pairs().unwrap().len(), 1);

    let renamed = api.edit_pair(pair.id, PairField::Name("renamed".to_string())).unwrap();
    assert_eq!(renamed.name, "renamed");

    let paused = api.edit_pair(pair.id, PairField::Status(PairStatus::Inactive)).unwrap();
    assert_eq!(paused.status, PairStatus::Inactive);
}

#[test]
fn block_word_then_test_filter_drops_it() {
    let api = harness();
    let pair = api.add_pair(1, 2, "demo", None).unwrap();
    api.block_word("spam", None).unwrap();

    let outcome = api.test_filter(pair.id, "buy cheap spam now").unwrap();
    assert!(matches!(outcome, FilterOutcome::Drop(_)));
    assert!(api.list_blocked(None).unwrap().contains(&"spam".to_string()));
}

#[test]
fn subscription_renew_extends_from_current_expiry() {
    let api = harness();
    let sub = api.add_sub("user-1", 1, "admin").unwrap();
    let renewed = api.renew_sub("user-1", 5).unwrap();
    assert!(renewed.expires_at > sub.expires_at);
}

#[test]
fn pause_and_resume_flip_status() {
    let api = harness();
    assert!(!api.status().unwrap().paused);
    api.pause();
    assert!(api.status().unwrap().paused);
    api.resume();
    assert!(!api.status().unwrap().paused);
}

#[test]
fn backup_writes_a_readable_snapshot() {
    let api = harness();
    api.add_pair(1, 2, "demo", None).unwrap();
    let dir = std::env::temp_dir().join(format!("replicator-gateway-test-{}", std::process::id()));
    let dest = dir.join("backup.db");
    api.backup(dest.to_str().unwrap()).unwrap();
    assert!(dest.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cleanup_reports_zero_when_nothing_is_old_enough() {
    let api = harness();
    assert_eq!(api.cleanup(30).unwrap(), 0);
}
