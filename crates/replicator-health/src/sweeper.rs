use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use replicator_core::types::ChatId;
use replicator_core::types::PairStatus;
use replicator_senders::SenderPool;
use replicator_store::Store;

use crate::error::Result;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const INTER_CHAT_DELAY: Duration = Duration::from_millis(200);

/// Hourly job that revokes access once a timed subscription lapses: for
/// every expired user it kicks them from every distinct destination chat
/// reachable through an active pair, then drops the subscription row.
pub struct SubscriptionSweeper {
    store: Arc<Store>,
    sender_pool: Arc<SenderPool>,
}

impl SubscriptionSweeper {
    pub fn new(store: Arc<Store>, sender_pool: Arc<SenderPool>) -> Self {
        Self { store, sender_pool }
    }

    fn active_destination_chats(&self) -> Result<Vec<ChatId>> {
        let pairs = self.store.list_pairs()?;
        let chats: BTreeSet<ChatId> = pairs
            .into_iter()
            .filter(|p| p.status == PairStatus::Active)
            .map(|p| p.destination_chat)
            .collect();
        Ok(chats.into_iter().collect())
    }

    /// Kick `user_id` from `chat_id` using the first registered sender
    /// willing to carry it out. No sender implements membership management
    /// by default, so a sweep against an empty pool is a no-op that still
    /// logs a warning.
    async fn kick_from_chat(&self, chat_id: ChatId, user_id: &str) {
        for sender in self.sender_pool.registered() {
            match sender.kick_user(chat_id, user_id).await {
                Ok(()) => return,
                Err(_) => continue,
            }
        }
        warn!(chat_id, user_id, "no sender could remove subscriber from chat");
    }

    async fn unban_from_chat(&self, chat_id: ChatId, user_id: &str) {
        for sender in self.sender_pool.registered() {
            match sender.unban_user(chat_id, user_id).await {
                Ok(()) => return,
                Err(_) => continue,
            }
        }
        warn!(chat_id, user_id, "no sender could lift the ban for this user");
    }

    /// Remove `user_id` from every distinct destination chat reachable
    /// through an active pair, rate-limited to one chat every 200 ms.
    /// Shared by the sweep pass and the admin `kick_all` operation.
    pub async fn kick_everywhere(&self, user_id: &str) -> Result<()> {
        let chats = self.active_destination_chats()?;
        for (i, chat_id) in chats.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(INTER_CHAT_DELAY).await;
            }
            self.kick_from_chat(*chat_id, user_id).await;
        }
        Ok(())
    }

    /// Lift a prior kick/ban for `user_id` across every active destination
    /// chat. Backs the admin `unban_all` operation.
    pub async fn unban_everywhere(&self, user_id: &str) -> Result<()> {
        let chats = self.active_destination_chats()?;
        for (i, chat_id) in chats.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(INTER_CHAT_DELAY).await;
            }
            self.unban_from_chat(*chat_id, user_id).await;
        }
        Ok(())
    }

    /// Run a single sweep pass: remove every expired user from every active
    /// destination chat, then delete their subscription. Exposed standalone
    /// for tests; `run` drives this on an hourly tick.
    pub async fn sweep_once(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let expired = self.store.expired(&now)?;
        if expired.is_empty() {
            return Ok(0);
        }

        for sub in &expired {
            self.kick_everywhere(&sub.user_id).await?;
            self.store.remove_subscription(&sub.user_id)?;
            info!(user_id = %sub.user_id, "expired subscription removed");
        }
        Ok(expired.len())
    }

    /// Drive the hourly sweep loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(0) => {}
                        Ok(n) => info!(count = n, "subscription sweep removed expired users"),
                        Err(err) => warn!(%err, "subscription sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("subscription sweeper stopped");
    }
}
