// ABOUTME: Request and response builder filters that write built messages into the context
// ABOUTME: Validate decoded output and report failures as the buildErr filter result

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::error::{BuilderError, Result};
use super::spec::BuilderSpec;
use super::stage::Builder;
use crate::pipeline::{Context, Headers, HttpRequest, HttpResponse};

/// Filter result reported when a build fails
pub const RESULT_BUILD_ERR: &str = "buildErr";

/// Header values may be written as a single string or a list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

fn collect_headers(headers: BTreeMap<String, HeaderValues>) -> Headers {
    headers
        .into_iter()
        .map(|(name, values)| match values {
            HeaderValues::One(value) => (name, vec![value]),
            HeaderValues::Many(values) => (name, values),
        })
        .collect()
}

/// RFC 7230 token characters
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Shape a request template must decode into
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BuiltRequest {
    method: String,
    url: String,
    headers: BTreeMap<String, HeaderValues>,
    body: String,
}

impl BuiltRequest {
    pub fn into_request(self) -> Result<HttpRequest> {
        let method = if self.method.is_empty() {
            "GET".to_string()
        } else {
            self.method.to_uppercase()
        };

        if !is_token(&method) {
            return Err(BuilderError::BuildError(format!(
                "invalid method '{}'",
                self.method
            )));
        }

        let mut request = HttpRequest::new(&method, &self.url).with_body(&self.body);
        request.headers = collect_headers(self.headers);
        Ok(request)
    }
}

/// Shape a response template must decode into
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuiltResponse {
    status_code: u16,
    headers: BTreeMap<String, HeaderValues>,
    body: String,
}

impl Default for BuiltResponse {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

impl BuiltResponse {
    pub fn into_response(self) -> Result<HttpResponse> {
        if !(100..=599).contains(&self.status_code) {
            return Err(BuilderError::BuildError(format!(
                "invalid status code {}",
                self.status_code
            )));
        }

        let mut response = HttpResponse::new(self.status_code).with_body(&self.body);
        response.headers = collect_headers(self.headers);
        Ok(response)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBuilderSpec {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub builder: BuilderSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBuilderSpec {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub builder: BuilderSpec,
}

/// Builds the request of the context's current namespace
#[derive(Debug)]
pub struct RequestBuilder {
    name: String,
    builder: Builder,
}

impl RequestBuilder {
    pub fn new(spec: RequestBuilderSpec) -> Result<Self> {
        Ok(Self {
            builder: Builder::new(spec.builder)?,
            name: spec.name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reload(&self, spec: RequestBuilderSpec) -> Result<()> {
        self.builder.reload(spec.builder)
    }

    /// Produce a request from the context without storing it
    pub fn build_request(&self, ctx: &Context) -> Result<HttpRequest> {
        let published = self.builder.published();
        if let Some(source) = published.source_namespace() {
            return ctx.request(source).cloned().ok_or_else(|| {
                BuilderError::BuildError(format!("no request in namespace '{}'", source))
            });
        }

        let mut built = BuiltRequest::default();
        published.build(ctx, &mut built)?;
        built.into_request()
    }

    pub fn handle(&self, ctx: &mut Context) -> &'static str {
        match self.build_request(ctx) {
            Ok(request) => {
                let namespace = ctx.namespace().to_string();
                debug!(
                    "Request builder '{}' built {} {} into '{}'",
                    self.name, request.method, request.url, namespace
                );
                ctx.set_request(&namespace, request);
                ""
            }
            Err(e) => {
                warn!("Request builder '{}' failed: {}", self.name, e);
                RESULT_BUILD_ERR
            }
        }
    }

    pub fn status(&self) -> Option<serde_json::Value> {
        self.builder.status()
    }

    pub fn close(&self) {
        self.builder.close();
    }
}

/// Builds the response of the context's current namespace
#[derive(Debug)]
pub struct ResponseBuilder {
    name: String,
    builder: Builder,
}

impl ResponseBuilder {
    pub fn new(spec: ResponseBuilderSpec) -> Result<Self> {
        Ok(Self {
            builder: Builder::new(spec.builder)?,
            name: spec.name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reload(&self, spec: ResponseBuilderSpec) -> Result<()> {
        self.builder.reload(spec.builder)
    }

    pub fn build_response(&self, ctx: &Context) -> Result<HttpResponse> {
        let published = self.builder.published();
        if let Some(source) = published.source_namespace() {
            return ctx.response(source).cloned().ok_or_else(|| {
                BuilderError::BuildError(format!("no response in namespace '{}'", source))
            });
        }

        let mut built = BuiltResponse::default();
        published.build(ctx, &mut built)?;
        built.into_response()
    }

    pub fn handle(&self, ctx: &mut Context) -> &'static str {
        match self.build_response(ctx) {
            Ok(response) => {
                let namespace = ctx.namespace().to_string();
                debug!(
                    "Response builder '{}' built status {} into '{}'",
                    self.name, response.status_code, namespace
                );
                ctx.set_response(&namespace, response);
                ""
            }
            Err(e) => {
                warn!("Response builder '{}' failed: {}", self.name, e);
                RESULT_BUILD_ERR
            }
        }
    }

    pub fn status(&self) -> Option<serde_json::Value> {
        self.builder.status()
    }

    pub fn close(&self) {
        self.builder.close();
    }
}
