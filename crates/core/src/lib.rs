//! # Promptloom Core
//!
//! Domain types and error definitions for the Promptloom prompt-compilation
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The pipeline crates (macros, lorebook, template, compiler) all depend
//! inward on this crate and never on each other's internals. Everything here
//! is a plain value object: personas and knowledge bases are owned by the
//! calling application and only read by the pipeline.

pub mod error;
pub mod knowledge;
pub mod message;
pub mod persona;

// Re-export key types at crate root for ergonomics
pub use error::{CompileError, Error, Result, TemplateError};
pub use knowledge::{KnowledgeBase, KnowledgeEntry};
pub use message::{Conversation, ConversationId, Message, Role};
pub use persona::Persona;
