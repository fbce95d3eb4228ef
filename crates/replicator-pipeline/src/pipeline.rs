use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use replicator_core::types::{MappingKind, MediaTag, Priority, SenderBinding};
use replicator_dispatch::{Dispatcher, TaskAction, TaskResult};
use replicator_filter::{self, DropReason, FilterOutcome, InboundMessage, WordBlockList};
use replicator_senders::SenderPool;
use replicator_store::{Mapping, StatKind, Store};

use crate::error::Result;
use crate::listener::SourceMessage;
use crate::locks::MappingLocks;

/// Central orchestrator: wires Store, FilterEngine, ImageGuard, SenderPool,
/// and Dispatcher behind the three `SourceListener` callbacks. Holds no
/// mutable state of its own beyond the mapping-serialization locks.
pub struct Pipeline {
    store: Arc<Store>,
    sender_pool: Arc<SenderPool>,
    dispatcher: Arc<Dispatcher>,
    locks: MappingLocks,
    watermark_font_path: String,
    paused: AtomicBool,
}

impl Pipeline {
    pub fn new(
        store: Arc<Store>,
        sender_pool: Arc<SenderPool>,
        dispatcher: Arc<Dispatcher>,
        watermark_font_path: String,
    ) -> Self {
        Self {
            store,
            sender_pool,
            dispatcher,
            locks: MappingLocks::new(),
            watermark_font_path,
            paused: AtomicBool::new(false),
        }
    }

    /// Stop fanning out new inbound messages; edits/deletes for already
    /// mapped copies still run so in-flight state stays consistent.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// NEW(msg): fan out to every active pair sourced from `msg.chat_id`.
    pub async fn handle_new(&self, msg: SourceMessage) -> Result<()> {
        if self.is_paused() {
            return Ok(());
        }
        let pair_ids = self.store.pairs_by_source_chat(msg.chat_id);
        for pair_id in pair_ids {
            let pair = match self.store.get_pair_by_id(pair_id) {
                Ok(p) => p,
                Err(e) => {
                    warn!(pair_id = pair_id.0, error = %e, "pair vanished mid-fanout, skipping");
                    continue;
                }
            };

            if self.store.get_mapping(pair_id, msg.id).is_ok() {
                continue;
            }

            let media_tag = msg.media.as_ref().map(|m| m.tag).unwrap_or(MediaTag::Text);
            let inbound = InboundMessage {
                text: msg.text.clone(),
                entities: msg.entities.clone(),
                media_tag,
            };
            let (global_words, pair_scoped) = self.store.blocked_words_for(pair_id).unwrap_or_default();
            let mut pair_words = pair.filters.blocked_words.clone();
            pair_words.extend(pair_scoped);
            let words = WordBlockList { global: &global_words, pair_specific: &pair_words };

            let (text, entities) = match replicator_filter::apply(&inbound, &pair.filters, words) {
                FilterOutcome::Drop(reason) => {
                    let kind = match reason {
                        DropReason::GlobalWordBlock(_) | DropReason::PairWordBlock(_) => StatKind::WordsBlocked,
                        _ => StatKind::OtherDropped,
                    };
                    let _ = self.store.bump_stat(pair_id, kind);
                    continue;
                }
                FilterOutcome::Keep { text, entities } => (text, entities),
            };

            let mut media_bytes: Option<Vec<u8>> = None;
            let mut mime: Option<String> = None;
            if let Some(media) = &msg.media {
                if matches!(media.tag, MediaTag::Photo) {
                    if let Some(fetcher) = &media.bytes_fetcher {
                        match fetcher.fetch().await {
                            Ok(bytes) => match image::load_from_memory(&bytes) {
                                Ok(img) => {
                                    let blocked = self.store.lookup_blocked(
                                        replicator_imageguard::phash_of(&img),
                                        pair_id,
                                    );
                                    if blocked.is_some() {
                                        let _ = self.store.bump_stat(pair_id, StatKind::ImagesBlocked);
                                        continue;
                                    }
                                    let rendered = if pair.filters.watermark_enabled {
                                        replicator_imageguard::watermark_if_configured(
                                            &img,
                                            &pair.filters.watermark_text,
                                            &self.watermark_font_path,
                                        )
                                    } else {
                                        img
                                    };
                                    match replicator_imageguard::encode_jpeg(&rendered) {
                                        Ok(bytes) => {
                                            media_bytes = Some(bytes);
                                            mime = Some("image/jpeg".to_string());
                                        }
                                        Err(e) => warn!(error = %e, "jpeg encode failed, sending as text"),
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "failed to decode image, sending as text");
                                }
                            },
                            Err(e) => warn!(error = %e, "failed to fetch media bytes, sending as text"),
                        }
                    }
                }
            }

            let reply_to_dest_id = if pair.filters.preserve_replies {
                msg.reply_to_id
                    .and_then(|source_reply_id| self.store.get_mapping(pair_id, source_reply_id).ok())
                    .map(|m| m.dest_msg_id)
            } else {
                None
            };

            let action = match &media_bytes {
                Some(bytes) => TaskAction::SendMedia {
                    chat_id: pair.destination_chat,
                    caption: text,
                    bytes: bytes.clone(),
                    mime: mime.clone().unwrap_or_else(|| "application/octet-stream".to_string()),
                    entities: entities.clone(),
                    reply_to_id: reply_to_dest_id,
                },
                None => TaskAction::Send {
                    chat_id: pair.destination_chat,
                    text,
                    entities: entities.clone(),
                    reply_to_id: reply_to_dest_id,
                },
            };
            let has_media = media_bytes.is_some();

            let candidates = self.store.list_senders().unwrap_or_default();
            let candidates: Vec<_> = candidates.into_iter().filter(|s| s.enabled).collect();

            let rx = match self
                .dispatcher
                .submit(pair_id, Priority::Normal, action, pair.sender_binding, candidates)
                .await
            {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(pair_id = pair_id.0, error = %e, "dispatch submit failed");
                    let _ = self.store.bump_stat(pair_id, StatKind::OtherDropped);
                    continue;
                }
            };

            let store = Arc::clone(&self.store);
            let source_msg_id = msg.id;
            let source_chat = msg.chat_id;
            let dest_chat = pair.destination_chat;
            tokio::spawn(async move {
                match rx.await {
                    Ok(TaskResult::Sent { dest_msg_id, sender_id }) => {
                        let mapping = Mapping {
                            source_msg_id,
                            dest_msg_id,
                            pair_id,
                            sender_id: Some(sender_id),
                            source_chat,
                            dest_chat,
                            kind: if has_media { MappingKind::Media } else { MappingKind::Text },
                            has_media,
                            reply_to_source_id: msg.reply_to_id,
                            reply_to_dest_id,
                            created_at: String::new(),
                            updated_at: String::new(),
                        };
                        if let Err(e) = store.save_mapping(&mapping) {
                            warn!(error = %e, "save_mapping failed after successful send, copy already lives on the platform");
                        } else {
                            let _ = store.bump_stat(pair_id, StatKind::Sent);
                        }
                    }
                    Ok(TaskResult::Failed(reason)) => {
                        warn!(pair_id = pair_id.0, reason, "send failed permanently");
                        let _ = store.bump_stat(pair_id, StatKind::SendErrors);
                    }
                    Ok(TaskResult::Cancelled) => {
                        info!(pair_id = pair_id.0, "send cancelled by shutdown");
                    }
                    Ok(_) => {}
                    Err(_) => {
                        warn!(pair_id = pair_id.0, "dispatch task dropped without a result");
                    }
                }
            });
        }
        Ok(())
    }

    /// EDIT(msg): re-run the filter for each synced mapping; a fresh Drop
    /// leaves the existing copy untouched.
    pub async fn handle_edit(&self, msg: SourceMessage) -> Result<()> {
        let pair_ids = self.store.pairs_by_source_chat(msg.chat_id);
        for pair_id in pair_ids {
            let _guard = self.locks.lock(pair_id, msg.id).await;

            let pair = match self.store.get_pair_by_id(pair_id) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if !pair.filters.sync_edits {
                continue;
            }
            let mapping = match self.store.get_mapping(pair_id, msg.id) {
                Ok(m) => m,
                Err(_) => continue,
            };

            let media_tag = msg.media.as_ref().map(|m| m.tag).unwrap_or(MediaTag::Text);
            let inbound = InboundMessage { text: msg.text.clone(), entities: msg.entities.clone(), media_tag };
            let (global_words, pair_scoped) = self.store.blocked_words_for(pair_id).unwrap_or_default();
            let mut pair_words = pair.filters.blocked_words.clone();
            pair_words.extend(pair_scoped);
            let words = WordBlockList { global: &global_words, pair_specific: &pair_words };

            let (text, entities) = match replicator_filter::apply(&inbound, &pair.filters, words) {
                FilterOutcome::Drop(_) => continue,
                FilterOutcome::Keep { text, entities } => (text, entities),
            };

            let action = TaskAction::Edit { chat_id: mapping.dest_chat, msg_id: mapping.dest_msg_id, text, entities };
            let candidates = self.store.list_senders().unwrap_or_default();
            let candidates: Vec<_> = candidates.into_iter().filter(|s| s.enabled).collect();

            // Prefer the sender that made the original copy; `Dispatcher::submit`
            // falls back to the pool on its own if that sender is no longer
            // eligible, so this is a preference, not a hard requirement.
            let binding = mapping.sender_id.map(SenderBinding::Specific).unwrap_or(pair.sender_binding);

            if let Ok(rx) = self
                .dispatcher
                .submit(pair_id, Priority::High, action, binding, candidates)
                .await
            {
                let _ = rx.await;
            }
        }
        Ok(())
    }

    /// DELETE(chat_id, msg_ids): for every synced mapping, issue a delete
    /// task then drop the mapping regardless of delivery outcome.
    pub async fn handle_delete(&self, chat_id: replicator_core::types::ChatId, msg_ids: Vec<replicator_core::types::MsgId>) -> Result<()> {
        let pair_ids = self.store.pairs_by_source_chat(chat_id);
        for source_msg_id in msg_ids {
            for pair_id in &pair_ids {
                let pair_id = *pair_id;
                let _guard = self.locks.lock(pair_id, source_msg_id).await;

                let pair = match self.store.get_pair_by_id(pair_id) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if !pair.filters.sync_deletes {
                    continue;
                }
                let mapping = match self.store.get_mapping(pair_id, source_msg_id) {
                    Ok(m) => m,
                    Err(_) => continue,
                };

                let action = TaskAction::Delete { chat_id: mapping.dest_chat, msg_id: mapping.dest_msg_id };
                let candidates = self.store.list_senders().unwrap_or_default();
                let candidates: Vec<_> = candidates.into_iter().filter(|s| s.enabled).collect();

                if let Ok(rx) = self
                    .dispatcher
                    .submit(pair_id, Priority::High, action, pair.sender_binding, candidates)
                    .await
                {
                    let _ = rx.await;
                }
                let _ = self.store.delete_mapping(pair_id, source_msg_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replicator_core::config::DispatcherConfig;
    use replicator_core::types::{PairId, PairStatus, SenderBinding};
    use replicator_store::{FilterPolicy, Pair, PairStats};

    fn test_pair(source_chat: i64, destination_chat: i64) -> Pair {
        Pair {
            id: PairId(0),
            source_chat,
            destination_chat,
            name: "test".to_string(),
            status: PairStatus::Active,
            sender_binding: SenderBinding::Pool,
            filters: FilterPolicy::default(),
            stats: PairStats::default(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig { max_workers: 1, queue_capacity: 16, retry_base_seconds: 0.05, retry_cap_seconds: 1.0, max_attempts: 1, drain_seconds: 1 }
    }

    #[tokio::test]
    async fn new_message_with_no_filters_is_dispatched() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut pair = test_pair(100, 200);
        store.upsert_pair(&mut pair).unwrap();
        store.add_sender("primary", "cred").unwrap();

        let pool = Arc::new(SenderPool::new(5));
        let dispatcher = Dispatcher::new(pool.clone(), test_config());
        dispatcher.spawn_workers();

        let pipeline = Pipeline::new(store.clone(), pool, dispatcher, "/nonexistent/font.ttf".to_string());

        let msg = SourceMessage {
            id: 1,
            chat_id: 100,
            author_id: None,
            text: "hello".to_string(),
            entities: Vec::new(),
            media: None,
            reply_to_id: None,
            timestamp: 0,
        };
        pipeline.handle_new(msg).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let refreshed = store.get_pair_by_id(pair.id).unwrap();
        assert_eq!(refreshed.stats.words_blocked, 0);
    }

    #[tokio::test]
    async fn word_blocked_message_bumps_counter_and_does_not_dispatch() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut pair = test_pair(100, 200);
        pair.filters.blocked_words = vec!["spam".to_string()];
        store.upsert_pair(&mut pair).unwrap();

        let pool = Arc::new(SenderPool::new(5));
        let dispatcher = Dispatcher::new(pool.clone(), test_config());
        dispatcher.spawn_workers();
        let pipeline = Pipeline::new(store.clone(), pool, dispatcher, "/nonexistent/font.ttf".to_string());

        let msg = SourceMessage {
            id: 1,
            chat_id: 100,
            author_id: None,
            text: "buy spam now".to_string(),
            entities: Vec::new(),
            media: None,
            reply_to_id: None,
            timestamp: 0,
        };
        pipeline.handle_new(msg).await.unwrap();

        let refreshed = store.get_pair_by_id(pair.id).unwrap();
        assert_eq!(refreshed.stats.words_blocked, 1);
    }

    #[tokio::test]
    async fn duplicate_new_for_an_already_mapped_message_is_not_redispatched() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut pair = test_pair(100, 200);
        store.upsert_pair(&mut pair).unwrap();
        store.add_sender("primary", "cred").unwrap();

        let pool = Arc::new(SenderPool::new(5));
        let dispatcher = Dispatcher::new(pool.clone(), test_config());
        dispatcher.spawn_workers();
        let pipeline = Pipeline::new(store.clone(), pool, dispatcher.clone(), "/nonexistent/font.ttf".to_string());

        store
            .save_mapping(&Mapping {
                source_msg_id: 1,
                dest_msg_id: 999,
                pair_id: pair.id,
                sender_id: None,
                source_chat: 100,
                dest_chat: 200,
                kind: MappingKind::Text,
                has_media: false,
                reply_to_source_id: None,
                reply_to_dest_id: None,
                created_at: String::new(),
                updated_at: String::new(),
            })
            .unwrap();

        let msg = SourceMessage {
            id: 1,
            chat_id: 100,
            author_id: None,
            text: "hello again".to_string(),
            entities: Vec::new(),
            media: None,
            reply_to_id: None,
            timestamp: 0,
        };
        pipeline.handle_new(msg).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(dispatcher.queue_depth().await, 0, "a message with an existing mapping must not be re-sent");
    }
}
