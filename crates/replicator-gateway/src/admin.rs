use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::info;

use replicator_core::config::ImageGuardConfig;
use replicator_core::types::{PairId, PairStatus, SenderBinding, SenderId};
use replicator_dispatch::Dispatcher;
use replicator_filter::{self, FilterOutcome, InboundMessage, WordBlockList};
use replicator_health::{HealthMonitor, HealthSnapshot, SubscriptionSweeper};
use replicator_pipeline::Pipeline;
use replicator_senders::SenderPool;
use replicator_store::{BlockedImage, FilterPolicy, Pair, PairStats, SenderRecord, Store, Subscription};

use crate::error::{GatewayError, Result};

/// Field an `editPair` call may update. Mirrors the handful of mutable pair
/// attributes; filter sub-fields go through their own dedicated setters.
#[derive(Debug, Clone)]
pub enum PairField {
    Name(String),
    Status(PairStatus),
    SenderBinding(SenderBinding),
}

#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub paused: bool,
    pub pair_count: usize,
    pub sender_count: usize,
}

/// The admin command surface (spec §6): a thin, transport-agnostic API
/// over `Store`, `FilterEngine`, `Pipeline`, and `Dispatcher`. Whatever
/// binds this to Discord/Telegram/HTTP commands lives outside this crate's
/// responsibility; these are the plain Rust operations that surface does
/// not need to reimplement.
pub struct AdminApi {
    store: Arc<Store>,
    pipeline: Arc<Pipeline>,
    dispatcher: Arc<Dispatcher>,
    sender_pool: Arc<SenderPool>,
    sweeper: Arc<SubscriptionSweeper>,
    health_monitor: Arc<HealthMonitor>,
    images: ImageGuardConfig,
}

impl AdminApi {
    pub fn new(
        store: Arc<Store>,
        pipeline: Arc<Pipeline>,
        dispatcher: Arc<Dispatcher>,
        sender_pool: Arc<SenderPool>,
        sweeper: Arc<SubscriptionSweeper>,
        health_monitor: Arc<HealthMonitor>,
        images: ImageGuardConfig,
    ) -> Self {
        Self { store, pipeline, dispatcher, sender_pool, sweeper, health_monitor, images }
    }

    // ---- pairs ----------------------------------------------------------

    pub fn add_pair(&self, source_chat: i64, destination_chat: i64, name: &str, sender: Option<SenderId>) -> Result<Pair> {
        let mut pair = Pair {
            id: PairId(0),
            source_chat,
            destination_chat,
            name: name.to_string(),
            status: PairStatus::Active,
            sender_binding: sender.map(SenderBinding::Specific).unwrap_or(SenderBinding::Pool),
            filters: FilterPolicy::default(),
            stats: PairStats::default(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        self.store.upsert_pair(&mut pair)?;
        info!(pair_id = pair.id.0, source_chat, destination_chat, "pair created");
        Ok(pair)
    }

    pub fn delete_pair(&self, id: PairId) -> Result<()> {
        self.store.delete_pair(id)?;
        Ok(())
    }

    pub fn edit_pair(&self, id: PairId, field: PairField) -> Result<Pair> {
        let mut pair = self.store.get_pair_by_id(id)?;
        match field {
            PairField::Name(name) => pair.name = name,
            PairField::Status(status) => pair.status = status,
            PairField::SenderBinding(binding) => pair.sender_binding = binding,
        }
        self.store.upsert_pair(&mut pair)?;
        Ok(pair)
    }

    pub fn list_pairs(&self) -> Result<Vec<Pair>> {
        Ok(self.store.list_pairs()?)
    }

    pub fn pair_info(&self, id: PairId) -> Result<Pair> {
        Ok(self.store.get_pair_by_id(id)?)
    }

    // ---- senders ----------------------------------------------------

    pub fn add_sender(&self, display_handle: &str, credential: &str) -> Result<SenderRecord> {
        Ok(self.store.add_sender(display_handle, credential)?)
    }

    pub fn list_senders(&self, include_disabled: bool) -> Result<Vec<SenderRecord>> {
        let all = self.store.list_senders()?;
        Ok(if include_disabled { all } else { all.into_iter().filter(|s| s.enabled).collect() })
    }

    pub fn toggle_sender(&self, id: SenderId) -> Result<SenderRecord> {
        let current = self
            .store
            .list_senders()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| GatewayError::InvalidRequest(format!("sender {} not found", id.0)))?;
        self.store.toggle_sender(id, !current.enabled)?;
        if current.enabled {
            self.sender_pool.unregister(id);
        }
        Ok(SenderRecord { enabled: !current.enabled, ..current })
    }

    pub fn delete_sender(&self, id: SenderId) -> Result<()> {
        self.store.delete_sender(id)?;
        self.sender_pool.unregister(id);
        Ok(())
    }

    // ---- filters ----------------------------------------------------

    pub fn block_word(&self, word: &str, pair: Option<PairId>) -> Result<()> {
        Ok(self.store.add_blocked_word(word, pair)?)
    }

    pub fn unblock_word(&self, word: &str, pair: Option<PairId>) -> Result<()> {
        Ok(self.store.remove_blocked_word(word, pair)?)
    }

    pub fn list_blocked(&self, pair: Option<PairId>) -> Result<Vec<String>> {
        match pair {
            None => Ok(self.store.global_blocked_words()?),
            Some(id) => {
                let (_, pair_scoped) = self.store.blocked_words_for(id)?;
                Ok(pair_scoped)
            }
        }
    }

    pub fn block_image(&self, bytes: &[u8], pair: Option<PairId>, note: Option<String>) -> Result<u64> {
        let img = image::load_from_memory(bytes).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        let phash = replicator_imageguard::phash_of(&img);
        self.store.block_image(phash, pair, self.images.similarity_threshold, note)?;
        Ok(phash)
    }

    pub fn unblock_image(&self, phash: u64, pair: Option<PairId>) -> Result<()> {
        Ok(self.store.unblock_image(phash, pair)?)
    }

    pub fn list_blocked_images(&self, pair: Option<PairId>) -> Vec<BlockedImage> {
        let all = self.store.list_blocked_images();
        match pair {
            None => all.into_iter().filter(BlockedImage::is_global).collect(),
            Some(id) => all.into_iter().filter(|b| b.pair_id == Some(id) || b.is_global()).collect(),
        }
    }

    pub fn set_mentions(&self, pair: PairId, enabled: bool, placeholder: Option<String>) -> Result<Pair> {
        let mut p = self.store.get_pair_by_id(pair)?;
        p.filters.remove_mentions = enabled;
        if let Some(ph) = placeholder {
            p.filters.mention_placeholder = ph;
        }
        self.store.upsert_pair(&mut p)?;
        Ok(p)
    }

    pub fn set_header_pattern(&self, pair: PairId, pattern: Option<String>) -> Result<Pair> {
        let mut p = self.store.get_pair_by_id(pair)?;
        p.filters.header_pattern = pattern;
        self.store.upsert_pair(&mut p)?;
        Ok(p)
    }

    pub fn set_footer_pattern(&self, pair: PairId, pattern: Option<String>) -> Result<Pair> {
        let mut p = self.store.get_pair_by_id(pair)?;
        p.filters.footer_pattern = pattern;
        self.store.upsert_pair(&mut p)?;
        Ok(p)
    }

    pub fn set_watermark(&self, pair: PairId, enabled: bool, text: Option<String>) -> Result<Pair> {
        let mut p = self.store.get_pair_by_id(pair)?;
        p.filters.watermark_enabled = enabled;
        if let Some(t) = text {
            p.filters.watermark_text = t;
        }
        self.store.upsert_pair(&mut p)?;
        Ok(p)
    }

    pub fn test_filter(&self, pair: PairId, text: &str) -> Result<FilterOutcome> {
        let p = self.store.get_pair_by_id(pair)?;
        let (global, pair_scoped) = self.store.blocked_words_for(pair)?;
        let mut pair_words = p.filters.blocked_words.clone();
        pair_words.extend(pair_scoped);
        let words = WordBlockList { global: &global, pair_specific: &pair_words };
        let inbound = InboundMessage {
            text: text.to_string(),
            entities: Vec::new(),
            media_tag: replicator_core::types::MediaTag::Text,
        };
        Ok(replicator_filter::apply(&inbound, &p.filters, words))
    }

    // ---- ops ----------------------------------------------------------

    pub fn pause(&self) {
        self.pipeline.pause();
    }

    pub fn resume(&self) {
        self.pipeline.resume();
    }

    pub fn status(&self) -> Result<GatewayStatus> {
        Ok(GatewayStatus {
            paused: self.pipeline.is_paused(),
            pair_count: self.store.list_pairs()?.len(),
            sender_count: self.store.list_senders()?.len(),
        })
    }

    pub fn stats(&self) -> Result<Vec<(PairId, PairStats)>> {
        Ok(self.store.list_pairs()?.into_iter().map(|p| (p.id, p.stats)).collect())
    }

    pub async fn health(&self) -> Result<HealthSnapshot> {
        Ok(self.health_monitor.snapshot().await?)
    }

    pub async fn queue(&self) -> [usize; 4] {
        self.dispatcher.depth_by_priority().await
    }

    pub async fn clear_queue(&self) -> usize {
        self.dispatcher.clear_queue().await
    }

    pub fn backup(&self, dest_path: &str) -> Result<()> {
        self.store.backup_to(dest_path)?;
        info!(dest_path, "backup complete");
        Ok(())
    }

    pub fn cleanup(&self, older_than_days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - ChronoDuration::days(older_than_days)).to_rfc3339();
        Ok(self.store.cleanup_mappings_older_than(&cutoff)?)
    }

    // ---- access ----------------------------------------------------

    pub fn add_sub(&self, user: &str, days: i64, added_by: &str) -> Result<Subscription> {
        let sub = Subscription {
            user_id: user.to_string(),
            expires_at: (Utc::now() + ChronoDuration::days(days)).to_rfc3339(),
            added_by: added_by.to_string(),
            notes: None,
        };
        self.store.add_subscription(&sub)?;
        Ok(sub)
    }

    pub fn renew_sub(&self, user: &str, days: i64) -> Result<Subscription> {
        let existing = self.store.get_subscription(user)?;
        let base = chrono::DateTime::parse_from_rfc3339(&existing.expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let base = base.max(Utc::now());
        let renewed = Subscription {
            expires_at: (base + ChronoDuration::days(days)).to_rfc3339(),
            ..existing
        };
        self.store.add_subscription(&renewed)?;
        Ok(renewed)
    }

    pub fn list_subs(&self) -> Result<Vec<Subscription>> {
        Ok(self.store.list_subscriptions()?)
    }

    pub async fn kick_all(&self, user: &str) -> Result<()> {
        self.sweeper.kick_everywhere(user).await?;
        Ok(())
    }

    pub async fn unban_all(&self, user: &str) -> Result<()> {
        self.sweeper.unban_everywhere(user).await?;
        Ok(())
    }
}
