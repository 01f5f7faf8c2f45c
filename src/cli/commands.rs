// ABOUTME: Command implementations for the filter-builder CLI
// ABOUTME: Handles the validate and render commands

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::args::{Args, BuildKind};
use crate::builder::{
    Builder, BuilderSpec, RequestBuilder, RequestBuilderSpec, ResponseBuilder,
    ResponseBuilderSpec,
};
use crate::pipeline::Context;

fn load_spec(path: &Path) -> Result<BuilderSpec> {
    BuilderSpec::load(path).with_context(|| format!("Failed to load builder spec {}", path.display()))
}

fn spec_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Validate and compile a builder spec
pub fn validate_spec(spec_path: PathBuf) -> Result<()> {
    info!("Validating builder spec: {}", spec_path.display());

    let spec = load_spec(&spec_path)?;
    let builder = Builder::new(spec).context("Builder spec validation failed")?;

    println!("✓ Builder spec '{}' is valid", spec_path.display());
    match builder.source_namespace() {
        Some(namespace) => println!("  Mode: source namespace '{}'", namespace),
        None => println!("  Mode: template"),
    }

    info!("Builder spec validation completed successfully");
    Ok(())
}

/// Build against a context file and print the result as YAML
pub fn render_spec(
    spec_path: PathBuf,
    context_path: Option<PathBuf>,
    kind: BuildKind,
    vars: Vec<String>,
) -> Result<()> {
    info!("Rendering builder spec: {}", spec_path.display());

    let spec = load_spec(&spec_path)?;

    let mut ctx = match context_path {
        Some(path) => Context::load(&path)
            .with_context(|| format!("Failed to load context {}", path.display()))?,
        None => Context::new(),
    };
    for (key, value) in Args::parse_variables(&vars)? {
        ctx.set_data(&key, value);
    }

    let output = match kind {
        BuildKind::Value => {
            let builder = Builder::new(spec).context("Invalid builder spec")?;
            let mut value = serde_yaml::Value::Null;
            builder.build(&ctx, &mut value).context("Build failed")?;
            serde_yaml::to_string(&value)?
        }
        BuildKind::Request => {
            let builder = RequestBuilder::new(RequestBuilderSpec {
                name: spec_name(&spec_path),
                builder: spec,
            })
            .context("Invalid builder spec")?;
            let request = builder.build_request(&ctx).context("Build failed")?;
            serde_yaml::to_string(&request)?
        }
        BuildKind::Response => {
            let builder = ResponseBuilder::new(ResponseBuilderSpec {
                name: spec_name(&spec_path),
                builder: spec,
            })
            .context("Invalid builder spec")?;
            let response = builder.build_response(&ctx).context("Build failed")?;
            serde_yaml::to_string(&response)?
        }
    };

    print!("{}", output);

    info!("Render completed");
    Ok(())
}
