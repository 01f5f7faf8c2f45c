// ABOUTME: Template engine that compiles builder templates with handlebars
// ABOUTME: Installs the function registry, enforces strict parsing and renders execution snapshots

use handlebars::Handlebars;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::context::ExecutionSnapshot;
use super::error::{Result, TemplateError};
use super::functions::{Arity, FuncRegistry, FuncResult};
use super::helpers;
use super::syntax::{self, Delimiters, Segment, LITERAL_BACKSLASH_HELPER, LITERAL_LBRACE_HELPER};

const TEMPLATE_NAME: &str = "builder";

/// Compiles template sources against a fixed function registry
#[derive(Clone, Debug)]
pub struct TemplateEngine {
    functions: FuncRegistry,
}

impl TemplateEngine {
    /// Create a new template engine with the standard function library
    pub fn new() -> Self {
        Self {
            functions: helpers::standard_functions(),
        }
    }

    /// Merge extra functions into the namespace; they win over standard ones
    pub fn with_functions(mut self, extra: &FuncRegistry) -> Self {
        self.functions.merge(extra);
        self
    }

    /// Register a custom function
    pub fn register_function<F>(&mut self, name: &str, arity: Arity, func: F) -> &mut Self
    where
        F: Fn(&[JsonValue]) -> FuncResult + Send + Sync + 'static,
    {
        self.functions.register(name, arity, func);
        self
    }

    pub fn functions(&self) -> &FuncRegistry {
        &self.functions
    }

    /// Parse and validate a template, failing fast on syntax errors, unknown
    /// functions and wrong argument counts.
    pub fn compile(&self, source: &str, delimiters: &Delimiters) -> Result<CompiledTemplate> {
        let segments = syntax::split(source, delimiters)?;
        for segment in &segments {
            if let Segment::Expression { inner, line } = segment {
                let inner = syntax::normalize_paths(inner);
                syntax::check_expression(&inner, *line, &self.functions)?;
            }
        }

        let native = syntax::to_native(&segments, delimiters);

        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.set_dev_mode(false);

        // Output is a YAML document, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        self.functions.install(&mut handlebars);
        literal_functions().install(&mut handlebars);

        handlebars.register_template_string(TEMPLATE_NAME, &native)?;

        debug!(
            "Compiled template ({} bytes, delimiters {} {})",
            source.len(),
            delimiters.left(),
            delimiters.right()
        );

        Ok(CompiledTemplate {
            handlebars,
            native,
            delimiters: delimiters.clone(),
        })
    }

    /// Compile and render in one step
    pub fn render_template(
        &self,
        source: &str,
        delimiters: &Delimiters,
        context: &JsonValue,
    ) -> Result<String> {
        self.compile(source, delimiters)?.render_json(context)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_functions() -> FuncRegistry {
    let mut registry = FuncRegistry::new();
    registry
        .register(LITERAL_LBRACE_HELPER, Arity::Exact(0), |_| Ok(json!("{")))
        .register(LITERAL_BACKSLASH_HELPER, Arity::Exact(0), |_| Ok(json!("\\")));
    registry
}

/// A parsed template ready to render. Immutable once built.
pub struct CompiledTemplate {
    handlebars: Handlebars<'static>,
    native: String,
    delimiters: Delimiters,
}

impl CompiledTemplate {
    /// Render against a pipeline snapshot
    pub fn render(&self, snapshot: &ExecutionSnapshot<'_>) -> Result<String> {
        self.handlebars
            .render(TEMPLATE_NAME, snapshot)
            .map_err(TemplateError::HandlebarsError)
    }

    /// Render against arbitrary JSON data
    pub fn render_json(&self, context: &JsonValue) -> Result<String> {
        self.handlebars
            .render(TEMPLATE_NAME, context)
            .map_err(TemplateError::HandlebarsError)
    }

    /// Source in native `{{ }}` syntax after delimiter translation
    pub fn native_source(&self) -> &str {
        &self.native
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("native", &self.native)
            .field("delimiters", &self.delimiters)
            .finish()
    }
}
