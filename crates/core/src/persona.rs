//! Persona — the character definition driving prompt content.
//!
//! A persona is immutable per version and owned by the calling application;
//! the pipeline only reads it. All free-text fields may embed `{{...}}`
//! macros, which are resolved once per conversation when the static context
//! is compiled.

use serde::{Deserialize, Serialize};

use crate::knowledge::KnowledgeBase;

/// A character definition: identity, descriptive text, greetings, and an
/// optional knowledge base of conditionally-injected entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persona {
    /// Display name
    pub name: String,

    /// Optional nickname, preferred for the `{{char}}` self-reference macro
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Long-form character description
    #[serde(default)]
    pub description: String,

    /// Personality summary
    #[serde(default)]
    pub personality: String,

    /// Scenario / setting text
    #[serde(default)]
    pub scenario: String,

    /// System instruction text sent ahead of all persona sections
    #[serde(default)]
    pub system_prompt: String,

    /// Primary greeting (the character's opening message)
    #[serde(default)]
    pub first_message: String,

    /// Alternate greetings, selectable by index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_greetings: Vec<String>,

    /// Conditional knowledge entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<KnowledgeBase>,
}

impl Persona {
    /// The name used for `{{char}}` resolution: the nickname when present
    /// and non-empty, otherwise the display name.
    pub fn display_name(&self) -> &str {
        match &self.nickname {
            Some(nick) if !nick.trim().is_empty() => nick,
            _ => &self.name,
        }
    }

    /// Select a greeting by index.
    ///
    /// Index 0 (or `None`) is the primary greeting; index `i > 0` selects
    /// alternate greeting `i - 1`. An out-of-range index falls back to the
    /// primary greeting.
    pub fn greeting(&self, index: Option<usize>) -> &str {
        match index {
            None | Some(0) => &self.first_message,
            Some(i) => self
                .alternate_greetings
                .get(i - 1)
                .map(String::as_str)
                .unwrap_or(&self.first_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> Persona {
        Persona {
            name: "Aria".into(),
            nickname: Some("Ari".into()),
            first_message: "Hi!".into(),
            alternate_greetings: vec!["Yo!".into(), "Greetings.".into()],
            ..Default::default()
        }
    }

    #[test]
    fn display_name_prefers_nickname() {
        assert_eq!(persona().display_name(), "Ari");
    }

    #[test]
    fn blank_nickname_falls_back_to_name() {
        let mut p = persona();
        p.nickname = Some("   ".into());
        assert_eq!(p.display_name(), "Aria");
        p.nickname = None;
        assert_eq!(p.display_name(), "Aria");
    }

    #[test]
    fn greeting_selection() {
        let p = persona();
        assert_eq!(p.greeting(None), "Hi!");
        assert_eq!(p.greeting(Some(0)), "Hi!");
        assert_eq!(p.greeting(Some(1)), "Yo!");
        assert_eq!(p.greeting(Some(2)), "Greetings.");
        // Out of range falls back to the primary greeting
        assert_eq!(p.greeting(Some(9)), "Hi!");
    }

    #[test]
    fn persona_deserializes_with_minimal_fields() {
        let p: Persona = serde_json::from_str(r#"{"name": "Mira"}"#).unwrap();
        assert_eq!(p.name, "Mira");
        assert!(p.nickname.is_none());
        assert!(p.knowledge_base.is_none());
        assert_eq!(p.display_name(), "Mira");
    }
}
