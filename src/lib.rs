// ABOUTME: Main library module for the filter-builder pipeline stage
// ABOUTME: Exports the builder, template engine, pipeline context and CLI

pub mod builder;
pub mod cli;
pub mod pipeline;
pub mod template;

// Re-export commonly used types
pub use builder::{Builder, BuilderError, BuilderSpec, RequestBuilder, ResponseBuilder};
pub use pipeline::{Context, HttpRequest, HttpResponse, PipelineContext};
pub use template::{FuncRegistry, TemplateEngine, TemplateError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
