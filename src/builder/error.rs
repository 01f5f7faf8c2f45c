// ABOUTME: Error types for builder configuration, compilation, rendering and decoding
// ABOUTME: Each variant maps to one failure stage of a build

use thiserror::Error;

use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Invalid builder configuration: {0}")]
    ConfigError(String),

    #[error("Failed to compile template: {0}")]
    CompileError(#[source] TemplateError),

    #[error("Failed to render template: {0}")]
    RenderError(#[source] TemplateError),

    #[error("Failed to decode rendered document: {0}")]
    DecodeError(#[from] serde_yaml::Error),

    #[error("Failed to decode rendered document: output contains no document")]
    EmptyDocument,

    #[error("Build failed: {0}")]
    BuildError(String),

    #[error("Failed to read builder spec: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuilderError>;
