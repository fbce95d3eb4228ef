use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform chat identifier (source or destination conversation).
pub type ChatId = i64;

/// Platform message identifier, scoped to a chat.
pub type MsgId = i64;

/// Primary key of a replication pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairId(pub i64);

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a sending identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderId(pub i64);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media kind carried by a message, used for the filter engine's media-type gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaTag {
    Text,
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    Webpage,
    Unknown,
}

impl fmt::Display for MediaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaTag::Text => "text",
            MediaTag::Photo => "photo",
            MediaTag::Video => "video",
            MediaTag::Document => "document",
            MediaTag::Audio => "audio",
            MediaTag::Voice => "voice",
            MediaTag::Sticker => "sticker",
            MediaTag::Webpage => "webpage",
            MediaTag::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MediaTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MediaTag::Text),
            "photo" => Ok(MediaTag::Photo),
            "video" => Ok(MediaTag::Video),
            "document" => Ok(MediaTag::Document),
            "audio" => Ok(MediaTag::Audio),
            "voice" => Ok(MediaTag::Voice),
            "sticker" => Ok(MediaTag::Sticker),
            "webpage" => Ok(MediaTag::Webpage),
            "unknown" => Ok(MediaTag::Unknown),
            other => Err(format!("unknown media tag: {other}")),
        }
    }
}

/// A flat formatting range attached to message text (bold/italic/link/...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub kind: String,
    pub attrs: Option<serde_json::Value>,
}

/// Outcome classification for a send/edit/delete attempt against the platform.
///
/// `Transient` and `RateLimited` are retryable, `Permanent` never is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SendOutcome {
    Transient(String),
    RateLimited { retry_after_ms: u64 },
    Permanent(String),
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendOutcome::Transient(msg) => write!(f, "transient: {msg}"),
            SendOutcome::RateLimited { retry_after_ms } => {
                write!(f, "rate-limited (retry after {retry_after_ms}ms)")
            }
            SendOutcome::Permanent(msg) => write!(f, "permanent: {msg}"),
        }
    }
}

/// Dispatch priority. Ordering matters: derive(Ord) ranks `Urgent` highest
/// because variant declaration order is the derive order and binary-heap
/// selection wants "biggest first" to mean "most urgent first".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

/// What kind of payload a successful copy carried — used in `Mapping::kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    Text,
    Media,
    Mixed,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MappingKind::Text => "text",
            MappingKind::Media => "media",
            MappingKind::Mixed => "mixed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MappingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MappingKind::Text),
            "media" => Ok(MappingKind::Media),
            "mixed" => Ok(MappingKind::Mixed),
            other => Err(format!("unknown mapping kind: {other}")),
        }
    }
}

/// Pair lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    Active,
    Inactive,
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairStatus::Active => "active",
            PairStatus::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PairStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PairStatus::Active),
            "inactive" => Ok(PairStatus::Inactive),
            other => Err(format!("unknown pair status: {other}")),
        }
    }
}

/// Which sender a pair is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderBinding {
    Pool,
    Specific(SenderId),
}
