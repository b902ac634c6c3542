//! The cacheable per-conversation snapshot of a persona.
//!
//! Computed once when a conversation is initialized (or lazily on the first
//! prompt build), persisted by the external storage layer as an opaque
//! string blob, and handed back in on later turns to skip recomputation.
//! Invalidated whenever the persona or the chosen greeting index changes —
//! that policy belongs to the caller; this type only makes the snapshot
//! serializable and self-contained.

use serde::{Deserialize, Serialize};

use promptloom_core::error::Result;
use promptloom_lorebook::MatchedEntry;

/// Macro-expanded persona fields plus the matched constant knowledge
/// entries. Self-contained: a later prompt build can reconstruct every
/// render field from this snapshot alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledStaticContext {
    /// Resolved display name (nickname when present)
    pub character_name: String,

    /// The user name the macros were expanded against
    pub user_name: String,

    /// Macro-expanded system instruction text
    pub system_prompt: String,

    /// Macro-expanded description
    pub description: String,

    /// Macro-expanded personality
    pub personality: String,

    /// Macro-expanded scenario
    pub scenario: String,

    /// The selected, macro-expanded greeting
    pub greeting: String,

    /// Which greeting was selected (None / 0 = primary)
    pub greeting_index: Option<usize>,

    /// Matches for every constant knowledge entry, in final order
    pub constant_entries: Vec<MatchedEntry>,
}

impl CompiledStaticContext {
    /// Serialize for the external store. The blob format is private to
    /// this crate; callers treat it as opaque.
    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rehydrate a snapshot previously produced by [`Self::to_blob`].
    pub fn from_blob(blob: &str) -> Result<Self> {
        Ok(serde_json::from_str(blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_preserves_fields() {
        let ctx = CompiledStaticContext {
            character_name: "Ari".into(),
            user_name: "Sam".into(),
            system_prompt: "Stay in character.".into(),
            description: "Ari helps Sam".into(),
            personality: String::new(),
            scenario: String::new(),
            greeting: "Hi Sam!".into(),
            greeting_index: None,
            constant_entries: Vec::new(),
        };

        let blob = ctx.to_blob().unwrap();
        let back = CompiledStaticContext::from_blob(&blob).unwrap();
        assert_eq!(back.character_name, "Ari");
        assert_eq!(back.description, "Ari helps Sam");
        assert_eq!(back.greeting, "Hi Sam!");
    }

    #[test]
    fn corrupt_blob_is_a_serialization_error() {
        let err = CompiledStaticContext::from_blob("{not json").unwrap_err();
        assert!(err.to_string().contains("Serialization"));
    }
}
