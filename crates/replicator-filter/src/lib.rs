//! Pure message-filtering engine: word blocks, media-type gating,
//! header/footer stripping, mention removal, and entity re-indexing.

pub mod engine;
pub mod types;

pub use engine::apply;
pub use types::{DropReason, FilterOutcome, InboundMessage, WordBlockList};

#[cfg(test)]
mod tests {
    use super::*;
    use replicator_core::types::MediaTag;
    use replicator_store::FilterPolicy;

    fn msg(text: &str) -> InboundMessage {
        InboundMessage {
            text: text.to_string(),
            entities: Vec::new(),
            media_tag: MediaTag::Text,
        }
    }

    fn no_words<'a>() -> WordBlockList<'a> {
        WordBlockList { global: &[], pair_specific: &[] }
    }

    #[test]
    fn word_block_respects_boundaries() {
        let global = vec!["cat".to_string()];
        let policy = FilterPolicy::default();

        let blocked = apply(&msg("I have a cat"), &policy, WordBlockList { global: &global, pair_specific: &[] });
        assert!(matches!(blocked, FilterOutcome::Drop(DropReason::GlobalWordBlock(_))));

        let not_blocked = apply(&msg("that's a category"), &policy, WordBlockList { global: &global, pair_specific: &[] });
        assert!(matches!(not_blocked, FilterOutcome::Keep { .. }));
    }

    #[test]
    fn word_block_is_case_insensitive() {
        let global = vec!["spam".to_string()];
        let policy = FilterPolicy::default();
        let outcome = apply(&msg("SPAM here"), &policy, WordBlockList { global: &global, pair_specific: &[] });
        assert!(matches!(outcome, FilterOutcome::Drop(_)));
    }

    #[test]
    fn structure_is_preserved_without_header_or_footer() {
        let policy = FilterPolicy::default();
        let text = "line one\nline two\nline three";
        let outcome = apply(&msg(text), &policy, no_words());
        match outcome {
            FilterOutcome::Keep { text: out, .. } => {
                assert_eq!(out.matches('\n').count(), text.matches('\n').count());
            }
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn header_and_footer_are_stripped() {
        let mut policy = FilterPolicy::default();
        policy.header_pattern = Some(r"^🔥\s*VIP\s*ENTRY\b.*$".to_string());
        policy.footer_pattern = Some(r"^🔚\s*END\b.*$".to_string());

        let text = "🔥 VIP ENTRY Premium\nBUY EURUSD\nTP 1.1000\n🔚 END";
        let outcome = apply(&msg(text), &policy, no_words());
        match outcome {
            FilterOutcome::Keep { text: out, .. } => {
                assert_eq!(out, "BUY EURUSD\nTP 1.1000");
            }
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn mention_removal_keeps_comma_and_avoids_double_space() {
        let mut policy = FilterPolicy::default();
        policy.remove_mentions = true;
        policy.mention_placeholder = String::new();

        let outcome = apply(&msg("Hi @alice, welcome"), &policy, no_words());
        match outcome {
            FilterOutcome::Keep { text, .. } => assert_eq!(text, "Hi, welcome"),
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn email_like_mentions_are_preserved() {
        let mut policy = FilterPolicy::default();
        policy.remove_mentions = true;

        let outcome = apply(&msg("contact me at name@handle for details"), &policy, no_words());
        match outcome {
            FilterOutcome::Keep { text, .. } => assert!(text.contains("name@handle")),
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn media_type_gate_drops_disallowed_kinds() {
        let mut policy = FilterPolicy::default();
        policy.allowed_media_types = vec![MediaTag::Text];
        let mut photo = msg("a photo");
        photo.media_tag = MediaTag::Photo;

        let outcome = apply(&photo, &policy, no_words());
        assert!(matches!(outcome, FilterOutcome::Drop(DropReason::MediaType)));
    }

    #[test]
    fn length_gate_enforces_bounds() {
        let mut policy = FilterPolicy::default();
        policy.min_length = 5;
        policy.max_length = 10;

        assert!(matches!(
            apply(&msg("hi"), &policy, no_words()),
            FilterOutcome::Drop(DropReason::LengthTooShort)
        ));
        assert!(matches!(
            apply(&msg("this is way too long"), &policy, no_words()),
            FilterOutcome::Drop(DropReason::LengthTooLong)
        ));
    }
}
