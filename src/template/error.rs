// ABOUTME: Error types for template compilation and rendering
// ABOUTME: Separates parse-time failures from render-time and function failures

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template syntax error: {0}")]
    SyntaxError(String),

    #[error("Unknown template function: {0}")]
    UnknownFunction(String),

    #[error("Function '{name}' expects {expected} argument(s), got {actual}")]
    ArityError {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("Function '{name}' failed: {reason}")]
    FunctionError { name: String, reason: String },

    #[error("Handlebars error: {0}")]
    HandlebarsError(#[from] handlebars::RenderError),

    #[error("Handlebars template error: {0}")]
    HandlebarsTemplateError(#[from] handlebars::TemplateError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TemplateError {
    /// Whether the error was raised while compiling rather than rendering
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            TemplateError::SyntaxError(_)
                | TemplateError::UnknownFunction(_)
                | TemplateError::ArityError { .. }
                | TemplateError::HandlebarsTemplateError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
