// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides temp-dir fixtures, spec builders and a sample pipeline context

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use filter_builder::pipeline::{Context, HttpRequest, HttpResponse};
use filter_builder::BuilderSpec;

pub struct TestSpecBuilder {
    spec: BuilderSpec,
}

impl TestSpecBuilder {
    pub fn template(template: &str) -> Self {
        Self {
            spec: BuilderSpec::from_template(template),
        }
    }

    pub fn source_namespace(namespace: &str) -> Self {
        Self {
            spec: BuilderSpec::from_source_namespace(namespace),
        }
    }

    pub fn with_delimiters(mut self, left: &str, right: &str) -> Self {
        self.spec = self.spec.with_delimiters(left, right);
        self
    }

    pub fn build(self) -> BuilderSpec {
        self.spec
    }

    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.spec).expect("spec serializes")
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    pub fn write_spec(&self, name: &str, spec: &TestSpecBuilder) -> PathBuf {
        self.write_file(&format!("{}.yaml", name), &spec.to_yaml())
    }
}

/// A context with one inbound request, one upstream response and some shared data
pub fn sample_context() -> Context {
    let mut ctx = Context::new();
    ctx.set_request(
        "req1",
        HttpRequest::new("GET", "https://api.example.com/v1/users?limit=5")
            .with_header("Authorization", "Basic YWxpY2U6czNjcmV0")
            .with_header("X-Request-Id", "abc-123")
            .with_real_ip("10.1.2.3"),
    );
    ctx.set_response(
        "upstream",
        HttpResponse::new(200)
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"users": [{"name": "alice"}, {"name": "bob"}]}"#),
    );
    ctx.set_data("foo", "bar");
    ctx.set_data("replicas", 3i64);
    ctx
}

pub const SAMPLE_CONTEXT_YAML: &str = r#"
requests:
  req1:
    method: GET
    url: http://example.com/users
    headers:
      X-Tenant: [acme]
responses:
  backend:
    statusCode: 502
data:
  foo: bar
"#;
