use replicator_core::types::MediaTag;
use replicator_filter::{apply, DropReason, FilterOutcome, InboundMessage, WordBlockList};
use replicator_store::FilterPolicy;

fn msg(text: &str) -> InboundMessage {
    InboundMessage {
        text: text.to_string(),
        entities: Vec::new(),
        media_tag: MediaTag::Text,
    }
}

#[test]
fn scenario_word_block() {
    let policy = FilterPolicy::default();
    let pair_words = vec!["spam".to_string()];
    let words = WordBlockList { global: &[], pair_specific: &pair_words };

    let dropped = apply(&msg("buy spam now"), &policy, WordBlockList { global: &[], pair_specific: &pair_words });
    assert!(matches!(dropped, FilterOutcome::Drop(DropReason::PairWordBlock(_))));

    let kept = apply(&msg("spammer"), &policy, words);
    assert!(matches!(kept, FilterOutcome::Keep { .. }));
}

#[test]
fn scenario_header_and_footer_strip() {
    let mut policy = FilterPolicy::default();
    policy.header_pattern = Some(r"^\u{1F525}\s*VIP\s*ENTRY\b.*$".to_string());
    policy.footer_pattern = Some(r"^\u{1F51A}\s*END\b.*$".to_string());

    let text = "\u{1F525} VIP ENTRY Premium\nBUY EURUSD\nTP 1.1000\n\u{1F51A} END";
    let outcome = apply(&msg(text), &policy, WordBlockList { global: &[], pair_specific: &[] });
    match outcome {
        FilterOutcome::Keep { text, .. } => assert_eq!(text, "BUY EURUSD\nTP 1.1000"),
        other => panic!("expected Keep, got {other:?}"),
    }
}

#[test]
fn scenario_mention_strip_empty_placeholder() {
    let mut policy = FilterPolicy::default();
    policy.remove_mentions = true;
    policy.mention_placeholder = String::new();

    let outcome = apply(&msg("Hi @alice, welcome"), &policy, WordBlockList { global: &[], pair_specific: &[] });
    match outcome {
        FilterOutcome::Keep { text, .. } => assert_eq!(text, "Hi, welcome"),
        other => panic!("expected Keep, got {other:?}"),
    }
}
