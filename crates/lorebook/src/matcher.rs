//! Knowledge-entry activation and ordering.
//!
//! Evaluation order per entry: enabled → decorator parse → `dont_activate`
//! → activation windows → candidacy (constant / forced / key match) →
//! exclude-key veto → macro expansion. Matched entries are sorted by
//! priority descending, ties by insertion order ascending, so output is
//! stable for a fixed entry set and context regardless of storage
//! iteration order.

use regex_lite::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use promptloom_core::knowledge::{KnowledgeBase, KnowledgeEntry};
use promptloom_core::message::Message;
use promptloom_macros::{MacroContext, MacroProcessor};

use crate::decorator::{Decorators, parse_decorators};

/// Everything an activation pass matches against.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// Message-derived scan text (recent messages plus the raw user prompt)
    pub scan_text: &'a str,

    /// Hidden scan keys extracted from macros; always in scope, even when
    /// an entry restricts its scan depth
    pub hidden_keys: &'a [String],

    /// The full processed message list, most recent last
    pub messages: &'a [Message],

    /// Assistant turns so far; drives the activation-window decorators
    pub assistant_message_count: usize,

    /// Context used to macro-expand matched entry content
    pub macro_context: &'a MacroContext,
}

/// A knowledge entry that activated, with its parsed decorators and
/// macro-expanded payload. Ephemeral per evaluation — except that constant
/// matches are persisted inside the compiled static context blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedEntry {
    pub entry: KnowledgeEntry,
    pub decorators: Decorators,
    /// Effective content: decorator block removed, macros expanded
    pub content: String,
}

/// Evaluate every entry in the base. See [`find_matches_in`].
pub fn find_matches(
    base: &KnowledgeBase,
    ctx: &ScanContext<'_>,
    macros: &MacroProcessor,
) -> Vec<MatchedEntry> {
    find_matches_in(base.entries.iter(), ctx, macros)
}

/// Evaluate a subset of entries (the compiler matches constant and dynamic
/// entries in separate phases) and return the ordered matches.
pub fn find_matches_in<'e>(
    entries: impl IntoIterator<Item = &'e KnowledgeEntry>,
    ctx: &ScanContext<'_>,
    macros: &MacroProcessor,
) -> Vec<MatchedEntry> {
    let mut matches: Vec<MatchedEntry> = entries
        .into_iter()
        .filter_map(|entry| evaluate(entry, ctx, macros))
        .collect();

    // Priority descending, insertion order ascending. Entries without an
    // explicit priority sort as 0.
    matches.sort_by_key(|m| {
        (
            std::cmp::Reverse(m.entry.effective_priority()),
            m.entry.insertion_order,
        )
    });

    debug!(count = matches.len(), "Lorebook pass complete");
    matches
}

fn evaluate(
    entry: &KnowledgeEntry,
    ctx: &ScanContext<'_>,
    macros: &MacroProcessor,
) -> Option<MatchedEntry> {
    if !entry.enabled {
        return None;
    }

    let (decorators, payload) = parse_decorators(&entry.content);

    if decorators.dont_activate {
        return None;
    }
    if !activation_window_open(&decorators, ctx.assistant_message_count) {
        return None;
    }

    let scan = entry_scan_text(ctx, decorators.scan_depth);

    let activated = if entry.constant || decorators.activate {
        true
    } else {
        match keys_match(entry, &decorators, &scan) {
            Some(hit) => hit,
            // Regex failure degrades the entry to "never matches"
            None => return None,
        }
    };
    if !activated {
        return None;
    }

    // Exclude keys veto after key-match, and apply even to constant and
    // force-activated entries.
    if !decorators.exclude_keys.is_empty() {
        match any_key_in(&decorators.exclude_keys, entry, &scan) {
            Some(true) | None => return None,
            Some(false) => {}
        }
    }

    Some(MatchedEntry {
        entry: entry.clone(),
        decorators,
        content: macros.process(payload, ctx.macro_context),
    })
}

/// `@@activate_only_after N` and `@@activate_only_every N` against the
/// assistant-turn count.
///
/// The `every` check intentionally fires both when the count is a positive
/// multiple of N and when it exactly equals N, matching long-standing
/// behavior that entries with a non-positive N rely on.
fn activation_window_open(decorators: &Decorators, assistant_count: usize) -> bool {
    let count = assistant_count as i64;

    if let Some(after) = decorators.activate_only_after {
        if count < after {
            return false;
        }
    }

    if let Some(every) = decorators.activate_only_every {
        let open = if every > 0 {
            (count % every == 0 && count > 0) || count == every
        } else {
            count == every
        };
        if !open {
            return false;
        }
    }

    true
}

/// The text this entry scans: the message-derived portion (optionally
/// restricted to the N most recent messages) with hidden keys appended.
fn entry_scan_text(ctx: &ScanContext<'_>, scan_depth: Option<usize>) -> String {
    let mut scan = match scan_depth {
        Some(depth) => {
            let start = ctx.messages.len().saturating_sub(depth);
            ctx.messages[start..]
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
        None => ctx.scan_text.to_string(),
    };
    for key in ctx.hidden_keys {
        scan.push('\n');
        scan.push_str(key);
    }
    scan
}

/// Whether any trigger key (entry keys ∪ additional keys) hits the scan
/// text. `None` signals a regex compile failure — the entry is skipped.
fn keys_match(entry: &KnowledgeEntry, decorators: &Decorators, scan: &str) -> Option<bool> {
    let keys = entry
        .keys
        .iter()
        .chain(decorators.additional_keys.iter())
        .map(String::as_str)
        .filter(|k| !k.is_empty());

    let mut any = false;
    for key in keys {
        match key_hits(key, entry, scan) {
            Some(true) => any = true,
            Some(false) => {}
            None => return None,
        }
    }
    Some(any)
}

/// Whether any of `keys` hits the scan text, using the entry's matching
/// settings. Same `None`-on-regex-failure contract as [`keys_match`].
fn any_key_in(keys: &[String], entry: &KnowledgeEntry, scan: &str) -> Option<bool> {
    for key in keys.iter().filter(|k| !k.is_empty()) {
        match key_hits(key, entry, scan) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => return None,
        }
    }
    Some(false)
}

fn key_hits(key: &str, entry: &KnowledgeEntry, scan: &str) -> Option<bool> {
    if entry.use_regex {
        match RegexBuilder::new(key)
            .case_insensitive(!entry.case_sensitive)
            .build()
        {
            Ok(re) => Some(re.is_match(scan)),
            Err(e) => {
                warn!(pattern = key, error = %e, "Skipping entry with invalid key pattern");
                None
            }
        }
    } else if entry.case_sensitive {
        Some(scan.contains(key))
    } else {
        Some(scan.to_lowercase().contains(&key.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_core::message::Role;

    fn entry(keys: &[&str], content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            content: content.into(),
            enabled: true,
            ..Default::default()
        }
    }

    fn scan_ctx<'a>(scan_text: &'a str, macro_ctx: &'a MacroContext) -> ScanContext<'a> {
        ScanContext {
            scan_text,
            hidden_keys: &[],
            messages: &[],
            assistant_message_count: 0,
            macro_context: macro_ctx,
        }
    }

    fn run(entries: Vec<KnowledgeEntry>, scan_text: &str) -> Vec<MatchedEntry> {
        let base = KnowledgeBase { entries };
        let mctx = MacroContext::new("Aria", "Sam");
        let macros = MacroProcessor::new();
        find_matches(&base, &scan_ctx(scan_text, &mctx), &macros)
    }

    #[test]
    fn case_insensitive_substring_match_by_default() {
        let matches = run(
            vec![entry(&["dragon"], "@@role system\nDragons are ancient.")],
            "I saw a DRAGON fly",
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].decorators.role, Some(Role::System));
        assert_eq!(matches[0].content, "Dragons are ancient.");
    }

    #[test]
    fn case_sensitive_when_requested() {
        let mut e = entry(&["Dragon"], "x");
        e.case_sensitive = true;
        assert!(run(vec![e.clone()], "a dragon flew").is_empty());
        assert_eq!(run(vec![e], "a Dragon flew").len(), 1);
    }

    #[test]
    fn disabled_entries_never_match() {
        let mut constant = entry(&[], "always on");
        constant.constant = true;
        constant.enabled = false;

        let mut forced = entry(&[], "@@activate\nforced");
        forced.enabled = false;

        assert!(run(vec![constant, forced], "anything").is_empty());
    }

    #[test]
    fn constant_bypasses_key_matching() {
        let mut e = entry(&[], "no keys needed");
        e.constant = true;
        assert_eq!(run(vec![e], "unrelated text").len(), 1);
    }

    #[test]
    fn empty_key_list_without_constant_never_matches() {
        assert!(run(vec![entry(&[], "orphan")], "anything").is_empty());
    }

    #[test]
    fn empty_string_key_is_never_a_match() {
        assert!(run(vec![entry(&[""], "x")], "anything").is_empty());
    }

    #[test]
    fn activate_decorator_bypasses_keys() {
        let matches = run(vec![entry(&["missing"], "@@activate\nforced in")], "nothing relevant");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].content, "forced in");
    }

    #[test]
    fn dont_activate_is_unconditional() {
        let mut e = entry(&["dragon"], "@@dont_activate\nnever");
        e.constant = true;
        assert!(run(vec![e], "a dragon appears").is_empty());
    }

    #[test]
    fn regex_keys_match() {
        let mut e = entry(&[r"drag+on s?labs?"], "found");
        e.use_regex = true;
        assert_eq!(run(vec![e], "the DRAGGGON SLAB glows").len(), 1);
    }

    #[test]
    fn invalid_regex_skips_only_that_entry() {
        let mut bad = entry(&[r"dragon("], "broken");
        bad.use_regex = true;
        let good = entry(&["dragon"], "fine");

        let matches = run(vec![bad, good], "a dragon");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].content, "fine");
    }

    #[test]
    fn additional_keys_are_unioned() {
        let matches = run(
            vec![entry(&["dragon"], "@@additional_keys wyrm\nscaly")],
            "the great WYRM stirs",
        );
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn exclude_keys_veto_even_forced_entries() {
        let matches = run(
            vec![entry(&[], "@@activate\n@@exclude_keys hatchling\nadult dragons")],
            "just a hatchling here",
        );
        assert!(matches.is_empty());
    }

    #[test]
    fn exclude_keys_do_not_veto_without_a_hit() {
        let matches = run(
            vec![entry(&["dragon"], "@@exclude_keys hatchling\nadult dragons")],
            "a dragon roars",
        );
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn activate_only_after_boundary() {
        let base = KnowledgeBase {
            entries: vec![entry(&["dragon"], "@@activate_only_after 3\nlate lore")],
        };
        let mctx = MacroContext::new("Aria", "Sam");
        let macros = MacroProcessor::new();

        let mut ctx = scan_ctx("a dragon", &mctx);
        ctx.assistant_message_count = 2;
        assert!(find_matches(&base, &ctx, &macros).is_empty());

        ctx.assistant_message_count = 3;
        assert_eq!(find_matches(&base, &ctx, &macros).len(), 1);
    }

    #[test]
    fn activate_only_every_fires_on_multiples_and_exact_n() {
        let open = |count: usize, n: i64| {
            let dec = Decorators {
                activate_only_every: Some(n),
                ..Default::default()
            };
            activation_window_open(&dec, count)
        };

        assert!(!open(0, 3));
        assert!(!open(2, 3));
        assert!(open(3, 3));
        assert!(open(6, 3));
        assert!(!open(7, 3));
        // Non-positive N never opens — except the literal count == N case,
        // which for N = 0 is the conversation start.
        assert!(open(0, 0));
        assert!(!open(1, 0));
        assert!(!open(4, -2));
    }

    #[test]
    fn ordering_by_priority_then_insertion() {
        let mut low = entry(&["k"], "low");
        low.priority = Some(1);
        low.insertion_order = 9;

        let mut high = entry(&["k"], "high");
        high.priority = Some(10);
        high.insertion_order = 5;

        let mut tie_a = entry(&["k"], "tie-a");
        tie_a.insertion_order = 1;

        let mut tie_b = entry(&["k"], "tie-b");
        tie_b.insertion_order = 2;

        // Deliberately shuffled input order
        let matches = run(vec![tie_b, low, high, tie_a], "k");
        let contents: Vec<&str> = matches.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["high", "low", "tie-a", "tie-b"]);
    }

    #[test]
    fn scan_depth_restricts_messages_but_not_hidden_keys() {
        let messages = vec![
            Message::user("the dragon was mentioned long ago"),
            Message::assistant("indeed"),
            Message::user("let's talk about the weather"),
        ];
        let hidden = vec!["griffin".to_string()];
        let mctx = MacroContext::new("Aria", "Sam");
        let macros = MacroProcessor::new();
        let ctx = ScanContext {
            scan_text: "the dragon was mentioned long ago\nindeed\nlet's talk about the weather",
            hidden_keys: &hidden,
            messages: &messages,
            assistant_message_count: 1,
            macro_context: &mctx,
        };

        // Restricted to the last 2 messages: "dragon" is out of range...
        let depth_limited = KnowledgeBase {
            entries: vec![entry(&["dragon"], "@@scan_depth 2\nout of range")],
        };
        assert!(find_matches(&depth_limited, &ctx, &macros).is_empty());

        // ...but a hidden key still hits despite the same restriction.
        let hidden_scoped = KnowledgeBase {
            entries: vec![entry(&["griffin"], "@@scan_depth 2\nstill in scope")],
        };
        assert_eq!(find_matches(&hidden_scoped, &ctx, &macros).len(), 1);
    }

    #[test]
    fn matched_content_is_macro_expanded() {
        let matches = run(
            vec![entry(&["dragon"], "{{char}} knows the dragon lore.")],
            "a dragon",
        );
        assert_eq!(matches[0].content, "Aria knows the dragon lore.");
    }
}
