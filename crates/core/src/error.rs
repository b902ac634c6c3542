//! Error types for the Promptloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Malformed *content* (unmatched macro delimiters, unknown decorators,
//! invalid per-entry regex) is never an error — those conditions are
//! absorbed inside the pipeline. Only caller-side configuration problems
//! and template failures surface here.

use thiserror::Error;

/// The top-level error type for all Promptloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    // --- Compilation errors ---
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by the template registry and renderer.
///
/// Every variant carries the offending template name so callers can log
/// and display the failure without further interpretation.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template '{name}' failed to compile: {reason}")]
    Registration { name: String, reason: String },

    #[error("Template '{name}' failed to render: {reason}")]
    Render { name: String, reason: String },
}

/// Failures raised by the prompt compiler's argument validation.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_error_carries_name() {
        let err = Error::Template(TemplateError::NotFound("chatml-v2".into()));
        assert!(err.to_string().contains("chatml-v2"));
    }

    #[test]
    fn render_error_carries_name_and_reason() {
        let err = Error::Template(TemplateError::Render {
            name: "instruct".into(),
            reason: "helper `missing` not registered".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("instruct"));
        assert!(msg.contains("helper"));
    }

    #[test]
    fn invalid_arguments_displays() {
        let err = Error::Compile(CompileError::InvalidArguments(
            "either a compiled static context or a persona is required".into(),
        ));
        assert!(err.to_string().contains("persona"));
    }
}
