use async_trait::async_trait;

use replicator_core::types::{ChatId, Entity, MediaTag, MsgId};

/// Fetches the raw bytes of an inbound media attachment on demand, so the
/// listener never has to buffer media it might not end up needing.
#[async_trait]
pub trait MediaBytesFetcher: Send + Sync {
    async fn fetch(&self) -> std::io::Result<Vec<u8>>;
}

pub struct Media {
    pub tag: MediaTag,
    pub bytes_fetcher: Option<std::sync::Arc<dyn MediaBytesFetcher>>,
    pub mime: Option<String>,
}

/// One observed source-chat message, as delivered by the listener.
pub struct SourceMessage {
    pub id: MsgId,
    pub chat_id: ChatId,
    pub author_id: Option<String>,
    pub text: String,
    pub entities: Vec<Entity>,
    pub media: Option<Media>,
    pub reply_to_id: Option<MsgId>,
    pub timestamp: i64,
}

/// Consumed interface to the platform's inbound event stream. The listener
/// is a single producer; handlers must not block it for long.
#[async_trait]
pub trait SourceListener: Send + Sync {
    async fn on_new(&self, msg: SourceMessage);
    async fn on_edit(&self, msg: SourceMessage);
    async fn on_delete(&self, chat_id: ChatId, msg_ids: Vec<MsgId>);
}
