//! The structured context a template renders from.
//!
//! Everything here is pre-resolved: macros are already expanded, the
//! system-prompt override is already applied, and matched knowledge entries
//! arrive in their final order. Templates only do lookup, conditionals, and
//! iteration over this data.

use serde::Serialize;

use promptloom_core::message::{Message, Role};

/// Render input for a single prompt build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderContext {
    /// The persona's resolved display name
    pub character_name: String,

    /// The user's display name
    pub user_name: String,

    /// System instruction text (override already resolved; may be empty)
    pub system_prompt: String,

    /// Persona description (may be empty; templates omit empty sections)
    pub description: String,

    /// Persona personality summary
    pub personality: String,

    /// Scenario text
    pub scenario: String,

    /// Matched knowledge entries, in final injection order
    pub entries: Vec<EntryBlock>,

    /// Full message history in chronological order
    pub messages: Vec<MessageBlock>,
}

/// A matched knowledge entry, routed to a role-tagged block.
#[derive(Debug, Clone, Serialize)]
pub struct EntryBlock {
    /// Lowercase role name; entries without a role decorator render as
    /// `system`
    pub role: String,

    /// Macro-expanded effective content
    pub content: String,
}

impl EntryBlock {
    pub fn new(role: Option<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.unwrap_or(Role::System).as_str().to_string(),
            content: content.into(),
        }
    }
}

/// A single history message, with the fields templates branch on.
#[derive(Debug, Clone, Serialize)]
pub struct MessageBlock {
    /// Lowercase role name
    pub role: String,

    /// Display name for turn-delimited formats: the user name for user
    /// turns, the character name otherwise
    pub speaker: String,

    pub content: String,

    /// Convenience flag for instruction-style templates
    pub is_user: bool,
}

impl MessageBlock {
    pub fn from_message(message: &Message, character_name: &str, user_name: &str) -> Self {
        let speaker = match message.role {
            Role::User => user_name,
            _ => character_name,
        };
        Self {
            role: message.role.as_str().to_string(),
            speaker: speaker.to_string(),
            content: message.content.clone(),
            is_user: message.role == Role::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_block_defaults_to_system_role() {
        let block = EntryBlock::new(None, "lore");
        assert_eq!(block.role, "system");
        let block = EntryBlock::new(Some(Role::Assistant), "aside");
        assert_eq!(block.role, "assistant");
    }

    #[test]
    fn message_block_assigns_speakers() {
        let user = MessageBlock::from_message(&Message::user("hi"), "Aria", "Sam");
        assert_eq!(user.speaker, "Sam");
        assert!(user.is_user);

        let reply = MessageBlock::from_message(&Message::assistant("hello"), "Aria", "Sam");
        assert_eq!(reply.speaker, "Aria");
        assert!(!reply.is_user);
    }
}
