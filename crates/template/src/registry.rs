//! The named template registry.
//!
//! Wraps a Handlebars engine with HTML escaping disabled (prompt text is
//! not HTML). Built-ins are registered at construction; callers register
//! additional formats at startup. All failures surface as typed
//! [`TemplateError`]s carrying the template name — engine internals are
//! never leaked raw.

use handlebars::{Handlebars, no_escape};
use tracing::debug;

use promptloom_core::error::TemplateError;

use crate::builtin;
use crate::context::RenderContext;

/// The template used when a caller does not request one by name.
pub const DEFAULT_TEMPLATE: &str = "chatml";

/// Maps template names to compiled templates and renders contexts with them.
pub struct TemplateRegistry {
    engine: Handlebars<'static>,
}

impl TemplateRegistry {
    /// Registry with the built-in formats (`chatml`, `instruct`, `turns`)
    /// pre-registered.
    pub fn new() -> Self {
        let mut engine = Handlebars::new();
        engine.register_escape_fn(no_escape);
        for (name, source) in [
            ("chatml", builtin::CHATML),
            ("instruct", builtin::INSTRUCT),
            ("turns", builtin::TURNS),
        ] {
            engine
                .register_template_string(name, source)
                .expect("built-in template compiles");
        }
        Self { engine }
    }

    /// Compile and store a named template.
    ///
    /// Re-registering an existing name replaces it, so callers can override
    /// the built-ins. Invalid template syntax surfaces the parse error.
    pub fn register(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.engine
            .register_template_string(name, source)
            .map_err(|e| TemplateError::Registration {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        debug!(template = name, "Registered template");
        Ok(())
    }

    /// Whether a template with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.engine.has_template(name)
    }

    /// Render a context with the named template.
    pub fn render(&self, name: &str, ctx: &RenderContext) -> Result<String, TemplateError> {
        if !self.engine.has_template(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        self.engine
            .render(name, ctx)
            .map_err(|e| TemplateError::Render {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
