use replicator_core::types::{Entity, MediaTag};
use replicator_store::FilterPolicy;

/// An inbound message as seen by the filter engine. Only the fields the
/// engine actually reads — the pipeline owns the full wire representation.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: String,
    pub entities: Vec<Entity>,
    pub media_tag: MediaTag,
}

/// Why a message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    GlobalWordBlock(String),
    PairWordBlock(String),
    MediaType,
    LengthTooShort,
    LengthTooLong,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::GlobalWordBlock(w) => write!(f, "blocked word (global): {w}"),
            DropReason::PairWordBlock(w) => write!(f, "blocked word (pair): {w}"),
            DropReason::MediaType => write!(f, "media type not allowed"),
            DropReason::LengthTooShort => write!(f, "text below minimum length"),
            DropReason::LengthTooLong => write!(f, "text above maximum length"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Drop(DropReason),
    Keep { text: String, entities: Vec<Entity> },
}

/// Words to test against a message, split by scope so the caller (and the
/// `test_filter` admin operation) can tell a global block from a pair one.
pub struct WordBlockList<'a> {
    pub global: &'a [String],
    pub pair_specific: &'a [String],
}
