// ABOUTME: The builder stage: renders a compiled template against a pipeline context
// ABOUTME: and decodes the first YAML document into a caller-supplied destination

use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::decode::decode;
use super::error::{BuilderError, Result};
use super::extra::extra_functions;
use super::spec::BuilderSpec;
use crate::pipeline::PipelineContext;
use crate::template::{CompiledTemplate, ExecutionSnapshot, TemplateEngine};

/// A spec together with what was compiled from it.
///
/// Holding one keeps its mode and template fixed across a reload.
#[derive(Debug)]
pub struct Published {
    spec: BuilderSpec,
    template: Option<CompiledTemplate>,
}

impl Published {
    pub fn source_namespace(&self) -> Option<&str> {
        self.spec.source()
    }

    /// Render the template against `ctx` without decoding.
    ///
    /// Returns `None` in source-namespace mode.
    pub fn render<C>(&self, ctx: &C) -> Result<Option<String>>
    where
        C: PipelineContext + ?Sized,
    {
        let Some(template) = self.template.as_ref() else {
            return Ok(None);
        };

        let snapshot = ExecutionSnapshot::capture(ctx);
        let rendered = template
            .render(&snapshot)
            .map_err(BuilderError::RenderError)?;

        debug!("Rendered builder template ({} bytes)", rendered.len());
        Ok(Some(rendered))
    }

    /// Render and decode into `destination`; a no-op in source-namespace mode
    pub fn build<T, C>(&self, ctx: &C, destination: &mut T) -> Result<()>
    where
        T: DeserializeOwned,
        C: PipelineContext + ?Sized,
    {
        match self.render(ctx)? {
            Some(rendered) => decode(&rendered, destination),
            None => Ok(()),
        }
    }
}

/// Renders structured values from pipeline state.
///
/// The published template is replaced as a whole on [`Builder::reload`]; a
/// build in flight keeps rendering with the handle it started with.
#[derive(Debug)]
pub struct Builder {
    engine: TemplateEngine,
    current: RwLock<Arc<Published>>,
}

/// Standard library plus the builder functions
pub fn default_engine() -> TemplateEngine {
    TemplateEngine::new().with_functions(&extra_functions())
}

impl Builder {
    /// Validate and compile `spec` with the default function namespace
    pub fn new(spec: BuilderSpec) -> Result<Self> {
        Self::with_engine(spec, default_engine())
    }

    /// Validate and compile `spec` with a caller-supplied engine
    pub fn with_engine(spec: BuilderSpec, engine: TemplateEngine) -> Result<Self> {
        let published = prepare(&engine, spec)?;
        Ok(Self {
            engine,
            current: RwLock::new(Arc::new(published)),
        })
    }

    /// Replace the configuration. On failure the previous template keeps serving.
    pub fn reload(&self, spec: BuilderSpec) -> Result<()> {
        let published = match prepare(&self.engine, spec) {
            Ok(published) => published,
            Err(e) => {
                warn!("Builder reload rejected, keeping previous template: {}", e);
                return Err(e);
            }
        };

        let mode = if published.template.is_some() {
            "template"
        } else {
            "source namespace"
        };

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::new(published);

        info!("Builder reloaded ({} mode)", mode);
        Ok(())
    }

    /// The currently published configuration and template
    pub fn published(&self) -> Arc<Published> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&current)
    }

    /// Configuration currently in effect
    pub fn spec(&self) -> BuilderSpec {
        self.published().spec.clone()
    }

    pub fn source_namespace(&self) -> Option<String> {
        self.published().spec.source().map(str::to_string)
    }

    /// Render the template against `ctx` without decoding.
    ///
    /// Returns `None` in source-namespace mode.
    pub fn render<C>(&self, ctx: &C) -> Result<Option<String>>
    where
        C: PipelineContext + ?Sized,
    {
        self.published().render(ctx)
    }

    /// Render and decode into `destination`.
    ///
    /// In source-namespace mode nothing is rendered and `destination` is left
    /// as it was. On any failure the caller must discard `destination`.
    pub fn build<T, C>(&self, ctx: &C, destination: &mut T) -> Result<()>
    where
        T: DeserializeOwned,
        C: PipelineContext + ?Sized,
    {
        self.published().build(ctx, destination)
    }

    /// Builders expose no runtime status
    pub fn status(&self) -> Option<serde_json::Value> {
        None
    }

    /// Nothing to release
    pub fn close(&self) {}
}

fn prepare(engine: &TemplateEngine, spec: BuilderSpec) -> Result<Published> {
    spec.validate()?;

    let template = if spec.source().is_some() {
        None
    } else {
        let compiled = engine
            .compile(&spec.template, &spec.delimiters())
            .map_err(BuilderError::CompileError)?;
        Some(compiled)
    };

    Ok(Published { spec, template })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Context, HttpRequest};
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Named {
        name: String,
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Upstream {
        name: String,
        port: u16,
        tags: Vec<String>,
    }

    fn context_with_get() -> Context {
        let mut ctx = Context::new();
        ctx.set_request("req1", HttpRequest::new("GET", "http://example.com/users"));
        ctx
    }

    #[test]
    fn test_build_method_into_record() {
        let builder = Builder::new(BuilderSpec::from_template("name: {{requests.req1.Method}}")).unwrap();

        assert_eq!(
            builder.render(&context_with_get()).unwrap().as_deref(),
            Some("name: GET")
        );

        let mut named = Named::default();
        builder.build(&context_with_get(), &mut named).unwrap();
        assert_eq!(named, Named { name: "GET".to_string() });
    }

    #[test]
    fn test_dot_rooted_template_builds_method() {
        let builder = Builder::new(BuilderSpec::from_template("name: {{.requests.req1.Method}}")).unwrap();

        let mut named = Named::default();
        builder.build(&context_with_get(), &mut named).unwrap();
        assert_eq!(named, Named { name: "GET".to_string() });
    }

    #[test]
    fn test_build_typed_record_matches_manual_construction() {
        let template = "name: {{data.service}}\nport: {{data.port}}\ntags:\n{{#each data.tags}}  - {{this}}\n{{/each}}";
        let builder = Builder::new(BuilderSpec::from_template(template)).unwrap();

        let mut ctx = Context::new();
        ctx.set_data("service", "users");
        ctx.set_data("port", 8080i64);
        ctx.set_data("tags", vec!["blue", "canary"]);

        let mut upstream = Upstream::default();
        builder.build(&ctx, &mut upstream).unwrap();

        assert_eq!(
            upstream,
            Upstream {
                name: "users".to_string(),
                port: 8080,
                tags: vec!["blue".to_string(), "canary".to_string()],
            }
        );
    }

    #[test]
    fn test_delimiters_render_identically() {
        let braces = Builder::new(BuilderSpec::from_template(
            "method: {{lower requests.req1.Method}}",
        ))
        .unwrap();
        let brackets = Builder::new(
            BuilderSpec::from_template("method: [[lower requests.req1.Method]]")
                .with_delimiters("[[", "]]"),
        )
        .unwrap();

        let ctx = context_with_get();
        assert_eq!(braces.render(&ctx).unwrap(), brackets.render(&ctx).unwrap());
    }

    #[test]
    fn test_literal_braces_under_custom_delimiters() {
        let builder = Builder::new(
            BuilderSpec::from_template("body: '{\"method\": \"[[requests.req1.Method]]\"}'")
                .with_delimiters("[[", "]]"),
        )
        .unwrap();

        let mut doc: BTreeMap<String, String> = BTreeMap::new();
        builder.build(&context_with_get(), &mut doc).unwrap();
        assert_eq!(doc["body"], r#"{"method": "GET"}"#);
    }

    #[test]
    fn test_data_is_read_at_call_time() {
        let builder = Builder::new(BuilderSpec::from_template("name: {{data.foo}}")).unwrap();
        let mut ctx = Context::new();

        ctx.set_data("foo", "first");
        let mut named = Named::default();
        builder.build(&ctx, &mut named).unwrap();
        assert_eq!(named.name, "first");

        ctx.set_data("foo", "second");
        builder.build(&ctx, &mut named).unwrap();
        assert_eq!(named.name, "second");
    }

    #[test]
    fn test_source_namespace_mode_leaves_destination() {
        let builder = Builder::new(BuilderSpec::from_source_namespace("DEFAULT")).unwrap();
        assert_eq!(builder.source_namespace().as_deref(), Some("DEFAULT"));

        let mut named = Named {
            name: "untouched".to_string(),
        };
        builder.build(&context_with_get(), &mut named).unwrap();
        assert_eq!(named.name, "untouched");
        assert_eq!(builder.render(&context_with_get()).unwrap(), None);
    }

    #[test]
    fn test_new_rejects_invalid_spec() {
        let spec = BuilderSpec {
            source_namespace: "DEFAULT".to_string(),
            template: "name: x".to_string(),
            ..BuilderSpec::default()
        };
        assert!(matches!(
            Builder::new(spec),
            Err(BuilderError::ConfigError(_))
        ));
    }

    #[test]
    fn test_malformed_template_fails_at_compile() {
        let unclosed = Builder::new(BuilderSpec::from_template("name: {{requests.req1.Method"));
        assert!(matches!(unclosed, Err(BuilderError::CompileError(_))));

        let unknown = Builder::new(BuilderSpec::from_template("name: {{shout data.foo}}"));
        assert!(matches!(unknown, Err(BuilderError::CompileError(_))));
    }

    #[test]
    fn test_missing_field_fails_at_render() {
        let builder = Builder::new(BuilderSpec::from_template("name: {{data.missing}}")).unwrap();
        let mut named = Named::default();
        let err = builder.build(&Context::new(), &mut named).unwrap_err();
        assert!(matches!(err, BuilderError::RenderError(_)));
    }

    #[test]
    fn test_non_yaml_output_fails_at_decode() {
        let builder = Builder::new(BuilderSpec::from_template("name: [{{data.foo}}")).unwrap();
        let mut ctx = Context::new();
        ctx.set_data("foo", "x");

        let mut named = Named::default();
        let err = builder.build(&ctx, &mut named).unwrap_err();
        assert!(matches!(err, BuilderError::DecodeError(_)));
    }

    #[test]
    fn test_failed_reload_keeps_previous_template() {
        let builder = Builder::new(BuilderSpec::from_template("name: {{requests.req1.Method}}")).unwrap();

        let err = builder
            .reload(BuilderSpec::from_template("name: {{#if}}"))
            .unwrap_err();
        assert!(matches!(err, BuilderError::CompileError(_)));

        let mut named = Named::default();
        builder.build(&context_with_get(), &mut named).unwrap();
        assert_eq!(named.name, "GET");
        assert_eq!(builder.spec().template, "name: {{requests.req1.Method}}");
    }

    #[test]
    fn test_reload_switches_mode() {
        let builder = Builder::new(BuilderSpec::from_template("name: static")).unwrap();
        builder
            .reload(BuilderSpec::from_source_namespace("DEFAULT"))
            .unwrap();
        assert_eq!(builder.source_namespace().as_deref(), Some("DEFAULT"));

        builder
            .reload(BuilderSpec::from_template("name: {{upper data.foo}}"))
            .unwrap();
        let mut ctx = Context::new();
        ctx.set_data("foo", "bar");
        let mut named = Named::default();
        builder.build(&ctx, &mut named).unwrap();
        assert_eq!(named.name, "BAR");
    }

    #[test]
    fn test_builder_functions_available() {
        let builder = Builder::new(BuilderSpec::from_template(
            "name: '{{jsonEscape data.foo}}'\n",
        ))
        .unwrap();
        let mut ctx = Context::new();
        ctx.set_data("foo", "plain");

        let mut named = Named::default();
        builder.build(&ctx, &mut named).unwrap();
        assert_eq!(named.name, "plain");
    }

    #[test]
    fn test_published_handle_survives_reload() {
        let builder = Builder::new(BuilderSpec::from_template("name: {{requests.req1.Method}}")).unwrap();
        let held = builder.published();

        builder
            .reload(BuilderSpec::from_source_namespace("DEFAULT"))
            .unwrap();

        assert_eq!(held.source_namespace(), None);
        let mut named = Named::default();
        held.build(&context_with_get(), &mut named).unwrap();
        assert_eq!(named.name, "GET");

        assert_eq!(builder.published().source_namespace(), Some("DEFAULT"));
    }

    #[test]
    fn test_status_and_close() {
        let builder = Builder::new(BuilderSpec::from_template("name: x")).unwrap();
        assert!(builder.status().is_none());
        builder.close();
    }

    #[test]
    fn test_builder_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Builder>();
    }
}
