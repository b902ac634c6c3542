//! The prompt compiler — sole integration point for the chat-serving layer.
//!
//! Compilation happens in two cacheable phases:
//!
//! 1. **Static** ([`PromptCompiler::compile_static_context`]): once per
//!    conversation, the persona's text fields are macro-expanded and its
//!    constant knowledge entries matched. The result is a serializable
//!    snapshot the caller may persist as an opaque blob.
//! 2. **Dynamic** ([`PromptCompiler::build_prompt`]): every turn, stored
//!    history and the incoming prompt are macro-expanded, the lorebook is
//!    scanned, constant and dynamic entries merged, and the whole context
//!    rendered through the requested template.
//!
//! Sub-component failures are absorbed at their boundary (macro expansion
//! never fails; lorebook entries degrade individually), so the only errors
//! a caller sees are argument validation, configuration, and template
//! failures.

pub mod builder;
pub mod static_context;

pub use builder::{BuildPromptOptions, PromptCompiler};
pub use static_context::CompiledStaticContext;
