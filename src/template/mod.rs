// ABOUTME: Template engine module for the builder stage
// ABOUTME: Provides delimiter handling, function registry, snapshots and rendering

pub mod context;
pub mod engine;
pub mod error;
pub mod functions;
pub mod helpers;
pub mod syntax;

pub use context::{ExecutionSnapshot, SharedData, TemplateValue};
pub use engine::{CompiledTemplate, TemplateEngine};
pub use error::{Result, TemplateError};
pub use functions::{Arity, FuncRegistry, FuncResult, TemplateFunction};
pub use syntax::Delimiters;
