//! The macro processor — fixed-order global substitution passes.
//!
//! Order matters: hidden keys and comments are stripped before the name
//! substitutions so their bodies never leak into visible text, and the
//! value-producing macros (`random`, `pick`, `roll`, `reverse`) run last so
//! they see the output of the earlier passes. Each pass rewrites every
//! occurrence in the text.
//!
//! All body patterns are non-greedy up to the next closing delimiter;
//! malformed macros (unmatched delimiters) are left as literal text.

use regex_lite::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::randomness::{Randomness, ThreadRandomness};

const HIDDEN_KEY_PATTERN: &str = r"(?s)\{\{hidden_key:(.*?)\}\}";
const COMMENT_PATTERN: &str = r"(?s)\{\{//(.*?)\}\}";
const RANDOM_PATTERN: &str = r"(?s)\{\{random:(.*?)\}\}";
const PICK_PATTERN: &str = r"(?s)\{\{pick:(.*?)\}\}";
const ROLL_PATTERN: &str = r"\{\{roll:(.*?)\}\}";
const REVERSE_PATTERN: &str = r"(?s)\{\{reverse:(.*?)\}\}";

/// Names and seed the processor substitutes with.
#[derive(Debug, Clone, Default)]
pub struct MacroContext {
    /// Replacement for `{{char}}` (the persona's resolved display name)
    pub character_name: String,

    /// Replacement for `{{user}}`
    pub user_name: String,

    /// Seed for the deterministic `pick` macro. `None` behaves like an
    /// empty seed: still deterministic, just shared across conversations.
    pub conversation_id: Option<String>,
}

impl MacroContext {
    pub fn new(character_name: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            character_name: character_name.into(),
            user_name: user_name.into(),
            conversation_id: None,
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}

/// Expands and removes `{{...}}` macros in arbitrary text.
///
/// Stateless apart from its randomness source — build one and reuse it.
pub struct MacroProcessor {
    randomness: Box<dyn Randomness>,
    hidden_key_re: Regex,
    comment_re: Regex,
    random_re: Regex,
    pick_re: Regex,
    roll_re: Regex,
    reverse_re: Regex,
}

impl MacroProcessor {
    /// Processor with the default thread-local randomness.
    pub fn new() -> Self {
        Self::with_randomness(Box::new(ThreadRandomness))
    }

    /// Processor with an injected randomness source (seeded in tests).
    pub fn with_randomness(randomness: Box<dyn Randomness>) -> Self {
        Self {
            randomness,
            hidden_key_re: compile(HIDDEN_KEY_PATTERN),
            comment_re: compile(COMMENT_PATTERN),
            random_re: compile(RANDOM_PATTERN),
            pick_re: compile(PICK_PATTERN),
            roll_re: compile(ROLL_PATTERN),
            reverse_re: compile(REVERSE_PATTERN),
        }
    }

    /// Apply every macro pass to `text`. Never fails; unknown or malformed
    /// macros pass through unchanged.
    pub fn process(&self, text: &str, ctx: &MacroContext) -> String {
        let text = self.hidden_key_re.replace_all(text, "");
        let text = self.comment_re.replace_all(&text, "");
        let text = text.replace("{{char}}", &ctx.character_name);
        let text = text.replace("{{user}}", &ctx.user_name);
        let text = self.expand_random(&text);
        let text = self.expand_pick(&text, ctx);
        let text = self.expand_roll(&text);
        self.expand_reverse(&text)
    }

    /// `{{random:a,b,c}}` — one uniformly random option per occurrence.
    fn expand_random(&self, text: &str) -> String {
        self.random_re
            .replace_all(text, |caps: &Captures<'_>| {
                let options = split_options(&caps[1]);
                options[self.randomness.index(options.len())].to_string()
            })
            .into_owned()
    }

    /// `{{pick:a,b,c}}` — a stable choice per conversation and occurrence.
    ///
    /// The seed is the conversation id concatenated with the exact matched
    /// macro text, hashed with SHA-256 and reduced modulo the option count.
    /// The same occurrence in the same conversation therefore resolves the
    /// same way on every call, on every platform.
    fn expand_pick(&self, text: &str, ctx: &MacroContext) -> String {
        let conversation_seed = ctx.conversation_id.as_deref().unwrap_or("");
        self.pick_re
            .replace_all(text, |caps: &Captures<'_>| {
                let options = split_options(&caps[1]);
                let seed = format!("{}{}", conversation_seed, &caps[0]);
                let index = (stable_hash(&seed) % options.len() as u64) as usize;
                options[index].to_string()
            })
            .into_owned()
    }

    /// `{{roll:N}}` / `{{roll:dN}}` — uniform integer in `[1, N]`.
    /// Malformed or non-positive N leaves the occurrence untouched.
    fn expand_roll(&self, text: &str) -> String {
        self.roll_re
            .replace_all(text, |caps: &Captures<'_>| {
                let body = caps[1].trim();
                let digits = body
                    .strip_prefix('d')
                    .or_else(|| body.strip_prefix('D'))
                    .unwrap_or(body);
                match digits.parse::<u64>() {
                    Ok(sides) if sides >= 1 => self.randomness.roll(sides).to_string(),
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// `{{reverse:text}}` — the body reversed character-wise.
    fn expand_reverse(&self, text: &str) -> String {
        self.reverse_re
            .replace_all(text, |caps: &Captures<'_>| {
                caps[1].chars().rev().collect::<String>()
            })
            .into_owned()
    }
}

impl Default for MacroProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the inner text of every `{{hidden_key:...}}` marker, in order of
/// appearance, without mutating the input. Used to widen the lorebook scan
/// text without polluting visible output.
pub fn extract_hidden_keys(text: &str) -> Vec<String> {
    if !text.contains("{{hidden_key:") {
        return Vec::new();
    }
    compile(HIDDEN_KEY_PATTERN)
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in macro pattern is valid")
}

fn split_options(body: &str) -> Vec<&str> {
    body.split(',').map(str::trim).collect()
}

/// Stable, platform-independent string hash: the first eight bytes of the
/// SHA-256 digest, big-endian.
fn stable_hash(s: &str) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}
