//! Template rendering — the final text-assembly stage.
//!
//! A [`TemplateRegistry`] maps names to compiled Handlebars templates and
//! renders a [`RenderContext`] into the literal prompt string the model
//! consumes. Three output formats ship built in (`chatml`, `instruct`,
//! `turns`); callers add new formats by registering a template string —
//! templates are data, not code, and the engine never changes per format.

pub mod builtin;
pub mod context;
pub mod registry;

pub use context::{EntryBlock, MessageBlock, RenderContext};
pub use registry::{DEFAULT_TEMPLATE, TemplateRegistry};
