use regex::{Regex, RegexBuilder};
use replicator_core::types::Entity;
use tracing::warn;

use crate::types::{DropReason, FilterOutcome, InboundMessage, WordBlockList};
use replicator_store::FilterPolicy;

const CONNECTIVE_PUNCTUATION: [char; 7] = [',', '.', '!', '?', ':', ';', ')'];

/// Apply the full filter pipeline to a single inbound message. Pure
/// function: no I/O, no shared state, safe to call from any thread.
pub fn apply(msg: &InboundMessage, policy: &FilterPolicy, words: WordBlockList<'_>) -> FilterOutcome {
    if let Some(word) = first_blocked_match(msg.text.as_str(), words.global) {
        return FilterOutcome::Drop(DropReason::GlobalWordBlock(word));
    }
    if let Some(word) = first_blocked_match(msg.text.as_str(), words.pair_specific) {
        return FilterOutcome::Drop(DropReason::PairWordBlock(word));
    }
    if !policy.allowed_media_types.contains(&msg.media_tag) {
        return FilterOutcome::Drop(DropReason::MediaType);
    }

    let mut text = msg.text.clone();
    let mut entities = msg.entities.clone();

    if let Some(pattern) = &policy.header_pattern {
        if let Some(re) = compile_line_pattern(pattern, "header") {
            let (t, e) = strip_header(&text, &entities, &re);
            text = t;
            entities = e;
        }
    }
    if let Some(pattern) = &policy.footer_pattern {
        if let Some(re) = compile_line_pattern(pattern, "footer") {
            let (t, e) = strip_footer(&text, &entities, &re);
            text = t;
            entities = e;
        }
    }
    if policy.remove_mentions {
        let (t, e) = strip_mentions(&text, &entities, &policy.mention_placeholder);
        text = t;
        entities = e;
    }
    let (t, e) = collapse_spaces(&text, &entities);
    text = t;
    entities = e;

    let len = text.chars().count();
    if len < policy.min_length {
        return FilterOutcome::Drop(DropReason::LengthTooShort);
    }
    if len > policy.max_length {
        return FilterOutcome::Drop(DropReason::LengthTooLong);
    }

    FilterOutcome::Keep { text, entities }
}

fn first_blocked_match(text: &str, words: &[String]) -> Option<String> {
    for word in words {
        let pattern = format!(r"\b{}\b", regex::escape(word));
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => {
                if re.is_match(text) {
                    return Some(word.clone());
                }
            }
            Err(e) => warn!(word, error = %e, "failed to compile blocked-word pattern, skipping"),
        }
    }
    None
}

fn compile_line_pattern(pattern: &str, kind: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, kind, error = %e, "failed to compile pattern, leaving text untouched");
            None
        }
    }
}

/// Apply a single text replacement, re-indexing entities: entities fully
/// before the edit are untouched, entities fully after are shifted, and
/// entities overlapping the edit are clipped to their surviving portion
/// (dropped entirely if nothing survives).
fn apply_edit(text: &str, entities: &[Entity], start: usize, end: usize, replacement: &str) -> (String, Vec<Entity>) {
    let mut new_text = String::with_capacity(text.len());
    new_text.push_str(&text[..start]);
    new_text.push_str(replacement);
    new_text.push_str(&text[end..]);

    let delta: isize = replacement.len() as isize - (end as isize - start as isize);
    let repl_end = start + replacement.len();

    let mut new_entities = Vec::with_capacity(entities.len());
    for e in entities {
        if e.end <= start {
            new_entities.push(e.clone());
        } else if e.start >= end {
            let ns = (e.start as isize + delta) as usize;
            let ne = (e.end as isize + delta) as usize;
            new_entities.push(Entity { start: ns, end: ne, ..e.clone() });
        } else {
            let new_start = if e.start < start { e.start } else { repl_end };
            let new_end = if e.end > end {
                (e.end as isize + delta) as usize
            } else {
                repl_end
            };
            if new_end > new_start {
                new_entities.push(Entity { start: new_start, end: new_end, ..e.clone() });
            }
        }
    }
    (new_text, new_entities)
}

/// Apply several non-overlapping edits, given in ascending original-text
/// order, folding the cumulative offset shift between them.
fn apply_edits(text: &str, entities: &[Entity], edits: &[(usize, usize, String)]) -> (String, Vec<Entity>) {
    let mut current_text = text.to_string();
    let mut current_entities = entities.to_vec();
    let mut shift: isize = 0;
    for (start, end, replacement) in edits {
        let s = (*start as isize + shift) as usize;
        let e = (*end as isize + shift) as usize;
        let (t, ents) = apply_edit(&current_text, &current_entities, s, e, replacement);
        shift += replacement.len() as isize - (*end as isize - *start as isize);
        current_text = t;
        current_entities = ents;
    }
    (current_text, current_entities)
}

/// Remove leading lines matching `pattern`, each together with its trailing
/// newline, stopping at the first non-matching line.
fn strip_header(text: &str, entities: &[Entity], pattern: &Regex) -> (String, Vec<Entity>) {
    let mut consumed = 0usize;
    loop {
        let rest = &text[consumed..];
        let (line, consumed_len, is_last) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], idx + 1, false),
            None => (rest, rest.len(), true),
        };
        if !pattern.is_match(line) {
            break;
        }
        consumed += consumed_len;
        if is_last {
            break;
        }
    }
    if consumed == 0 {
        return (text.to_string(), entities.to_vec());
    }
    apply_edit(text, entities, 0, consumed, "")
}

/// Remove trailing lines matching `pattern`, each together with its leading
/// newline, stopping at the first non-matching line (scanning backward).
fn strip_footer(text: &str, entities: &[Entity], pattern: &Regex) -> (String, Vec<Entity>) {
    let mut removed_from = text.len();
    loop {
        let line_start = text[..removed_from].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let line = &text[line_start..removed_from];
        if !pattern.is_match(line) {
            break;
        }
        if line_start == 0 {
            removed_from = 0;
            break;
        }
        removed_from = line_start - 1;
    }
    if removed_from == text.len() {
        return (text.to_string(), entities.to_vec());
    }
    apply_edit(text, entities, removed_from, text.len(), "")
}

fn mention_regex() -> Regex {
    Regex::new(r"@[A-Za-z0-9_]{3,32}").expect("static mention pattern is valid")
}

fn strip_mentions(text: &str, entities: &[Entity], placeholder: &str) -> (String, Vec<Entity>) {
    let re = mention_regex();
    let mut edits = Vec::new();

    for m in re.find_iter(text) {
        let prev_char = text[..m.start()].chars().last();
        if let Some(c) = prev_char {
            if c.is_alphanumeric() || c == '.' {
                continue; // email-like occurrence, leave untouched
            }
        }

        if !placeholder.is_empty() {
            edits.push((m.start(), m.end(), placeholder.to_string()));
            continue;
        }

        let next_char = text[m.end()..].chars().next();
        let (mut start, mut end) = (m.start(), m.end());
        if prev_char == Some('(') && next_char == Some(')') {
            start -= 1;
            end += 1;
        } else if prev_char == Some(' ') && next_char.map(|c| CONNECTIVE_PUNCTUATION.contains(&c)).unwrap_or(false) {
            start -= 1;
        }
        edits.push((start, end, String::new()));
    }

    apply_edits(text, entities, &edits)
}

fn collapse_spaces(text: &str, entities: &[Entity]) -> (String, Vec<Entity>) {
    let re = Regex::new(" {2,}").expect("static space-run pattern is valid");
    let edits: Vec<(usize, usize, String)> = re
        .find_iter(text)
        .map(|m| (m.start(), m.end(), " ".to_string()))
        .collect();
    if edits.is_empty() {
        return (text.to_string(), entities.to_vec());
    }
    apply_edits(text, entities, &edits)
}
