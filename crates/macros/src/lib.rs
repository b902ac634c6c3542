//! Macro expansion for persona and lorebook content.
//!
//! Persona text is semi-trusted user data that may embed `{{...}}` macros:
//!
//! | Macro | Effect |
//! |-------|--------|
//! | `{{char}}` | character display name |
//! | `{{user}}` | user display name |
//! | `{{random:a,b,c}}` | uniformly random option per occurrence |
//! | `{{pick:a,b,c}}` | option chosen deterministically per conversation |
//! | `{{roll:N}}` / `{{roll:dN}}` | random integer in `[1, N]` |
//! | `{{// text}}` | removed from output |
//! | `{{hidden_key:text}}` | removed from output, exposed for lorebook scans |
//! | `{{reverse:text}}` | text reversed character-wise |
//!
//! Processing never fails: unknown or malformed macros pass through as
//! literal text.

pub mod processor;
pub mod randomness;

pub use processor::{MacroContext, MacroProcessor, extract_hidden_keys};
pub use randomness::{Randomness, SeededRandomness, ThreadRandomness};
