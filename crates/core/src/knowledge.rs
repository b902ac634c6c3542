//! Knowledge base — conditionally-injected content blocks (lorebook).
//!
//! Entries are matched against a scan context by the lorebook crate. The
//! entry *content* may start with a block of `@@name value` decorator lines
//! controlling activation and placement; decorators are parsed at match
//! time, never stored separately.

use serde::{Deserialize, Serialize};

/// An ordered collection of knowledge entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    /// Entries injected unconditionally (subject only to enabled/decorator
    /// gates). These form the cacheable static portion of the prompt.
    pub fn constant_entries(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.iter().filter(|e| e.constant)
    }

    /// Entries requiring key matches against the per-turn scan text.
    pub fn dynamic_entries(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.iter().filter(|e| !e.constant)
    }
}

/// A single conditional content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Trigger keys: literal substrings, or regex patterns when
    /// `use_regex` is set.
    #[serde(default)]
    pub keys: Vec<String>,

    /// Raw content. May begin with a `@@name value` decorator block; the
    /// text after that block is the effective payload.
    pub content: String,

    /// Disabled entries never match, even if constant or force-activated.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Constant entries bypass key matching.
    #[serde(default)]
    pub constant: bool,

    /// Treat each key as a regex pattern instead of a literal substring.
    #[serde(default)]
    pub use_regex: bool,

    /// Match keys case-sensitively (default is case-insensitive).
    #[serde(default)]
    pub case_sensitive: bool,

    /// Higher priority sorts earlier in the final output. Absent = 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    /// Tie-break within equal priority: lower sorts earlier.
    #[serde(default)]
    pub insertion_order: i64,

    /// Unrecognized extension fields, preserved verbatim for
    /// forward-compatibility with richer entry formats.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for KnowledgeEntry {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            content: String::new(),
            enabled: true,
            constant: false,
            use_regex: false,
            case_sensitive: false,
            priority: None,
            insertion_order: 0,
            extensions: serde_json::Map::new(),
        }
    }
}

impl KnowledgeEntry {
    /// Effective sort priority (absent = 0).
    pub fn effective_priority(&self) -> i64 {
        self.priority.unwrap_or(0)
    }
}
