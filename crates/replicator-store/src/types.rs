use serde::{Deserialize, Serialize};

use replicator_core::types::{ChatId, MappingKind, MediaTag, MsgId, PairId, PairStatus, SenderBinding, SenderId};

/// Filter policy carried by a pair, stored as a JSON blob in the `pair` row.
/// Unknown keys surviving from a legacy record are ignored on deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPolicy {
    #[serde(default)]
    pub blocked_words: Vec<String>,
    #[serde(default)]
    pub remove_mentions: bool,
    #[serde(default)]
    pub mention_placeholder: String,
    #[serde(default)]
    pub header_pattern: Option<String>,
    #[serde(default)]
    pub footer_pattern: Option<String>,
    #[serde(default)]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_allowed_media")]
    pub allowed_media_types: Vec<MediaTag>,
    #[serde(default = "bool_true")]
    pub sync_edits: bool,
    #[serde(default = "bool_true")]
    pub sync_deletes: bool,
    #[serde(default = "bool_true")]
    pub preserve_replies: bool,
    #[serde(default)]
    pub watermark_enabled: bool,
    #[serde(default)]
    pub watermark_text: String,
}

fn default_max_length() -> usize {
    4096
}
fn bool_true() -> bool {
    true
}
fn default_allowed_media() -> Vec<MediaTag> {
    vec![
        MediaTag::Text,
        MediaTag::Photo,
        MediaTag::Video,
        MediaTag::Document,
        MediaTag::Audio,
        MediaTag::Voice,
        MediaTag::Sticker,
        MediaTag::Webpage,
        MediaTag::Unknown,
    ]
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            blocked_words: Vec::new(),
            remove_mentions: false,
            mention_placeholder: String::new(),
            header_pattern: None,
            footer_pattern: None,
            min_length: 0,
            max_length: default_max_length(),
            allowed_media_types: default_allowed_media(),
            sync_edits: true,
            sync_deletes: true,
            preserve_replies: true,
            watermark_enabled: false,
            watermark_text: String::new(),
        }
    }
}

/// Per-pair counters, persisted alongside the pair row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairStats {
    pub sent: u64,
    pub words_blocked: u64,
    pub images_blocked: u64,
    pub other_dropped: u64,
    pub send_errors: u64,
}

/// A replication binding between a source chat and a destination chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub id: PairId,
    pub source_chat: ChatId,
    pub destination_chat: ChatId,
    pub name: String,
    pub status: PairStatus,
    pub sender_binding: SenderBinding,
    pub filters: FilterPolicy,
    pub stats: PairStats,
    pub created_at: String,
    pub updated_at: String,
}

/// Which `PairStats` counter a pipeline event bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Sent,
    WordsBlocked,
    ImagesBlocked,
    OtherDropped,
    SendErrors,
}

/// Record of one successful copy, linking a source message to its copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub source_msg_id: MsgId,
    pub dest_msg_id: MsgId,
    pub pair_id: PairId,
    pub sender_id: Option<SenderId>,
    pub source_chat: ChatId,
    pub dest_chat: ChatId,
    pub kind: MappingKind,
    pub has_media: bool,
    pub reply_to_source_id: Option<MsgId>,
    pub reply_to_dest_id: Option<MsgId>,
    pub created_at: String,
    pub updated_at: String,
}

/// A sending identity's persisted fields. Runtime health metrics live in
/// `replicator-senders`, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderRecord {
    pub id: SenderId,
    pub display_handle: String,
    pub credential: String,
    pub enabled: bool,
    pub usage_count: u64,
    pub last_used_at: Option<String>,
}

/// Perceptual-hash block-list entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedImage {
    pub phash: u64,
    pub pair_id: Option<PairId>,
    pub threshold: u32,
    pub usage_count: u64,
    pub note: Option<String>,
    pub created_at: String,
}

impl BlockedImage {
    pub fn is_global(&self) -> bool {
        self.pair_id.is_none()
    }
}

/// Timed-access record for a user in destination chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    pub expires_at: String,
    pub added_by: String,
    pub notes: Option<String>,
}
