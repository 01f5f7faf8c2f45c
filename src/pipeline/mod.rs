// ABOUTME: Pipeline context collaborator consumed by the builder stage
// ABOUTME: Holds named requests, responses and shared data produced by earlier filters

pub mod http;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::template::{SharedData, TemplateValue};

pub use http::{Headers, HttpRequest, HttpResponse};

/// Namespace used when a pipeline does not pick one
pub const DEFAULT_NAMESPACE: &str = "DEFAULT";

/// A pipeline message that can present itself to templates
pub trait BuilderProjection {
    /// Project into a template-visible value; `id` is the message's name in the context
    fn to_builder_value(&self, id: &str) -> TemplateValue;
}

impl BuilderProjection for TemplateValue {
    fn to_builder_value(&self, _id: &str) -> TemplateValue {
        self.clone()
    }
}

/// What the builder needs from the pipeline: enumerable named messages and shared data
pub trait PipelineContext {
    fn requests(&self) -> Vec<(&str, &dyn BuilderProjection)>;
    fn responses(&self) -> Vec<(&str, &dyn BuilderProjection)>;
    fn data(&self) -> &SharedData;
}

/// In-memory pipeline context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    requests: BTreeMap<String, HttpRequest>,
    responses: BTreeMap<String, HttpResponse>,
    data: SharedData,
    #[serde(skip)]
    namespace: String,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            responses: BTreeMap::new(),
            data: SharedData::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a context from a YAML (or JSON) file with `requests`, `responses` and `data`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let context: Context = serde_yaml::from_str(&contents)?;
        Ok(context)
    }

    /// Namespace the builder filters write their output into
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn use_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    pub fn set_request(&mut self, namespace: &str, request: HttpRequest) {
        self.requests.insert(namespace.to_string(), request);
    }

    pub fn request(&self, namespace: &str) -> Option<&HttpRequest> {
        self.requests.get(namespace)
    }

    pub fn set_response(&mut self, namespace: &str, response: HttpResponse) {
        self.responses.insert(namespace.to_string(), response);
    }

    pub fn response(&self, namespace: &str) -> Option<&HttpResponse> {
        self.responses.get(namespace)
    }

    pub fn set_data(&mut self, key: &str, value: impl Into<TemplateValue>) {
        self.data.insert(key.to_string(), value.into());
    }
}

impl PipelineContext for Context {
    fn requests(&self) -> Vec<(&str, &dyn BuilderProjection)> {
        self.requests
            .iter()
            .map(|(name, req)| (name.as_str(), req as &dyn BuilderProjection))
            .collect()
    }

    fn responses(&self) -> Vec<(&str, &dyn BuilderProjection)> {
        self.responses
            .iter()
            .map(|(name, resp)| (name.as_str(), resp as &dyn BuilderProjection))
            .collect()
    }

    fn data(&self) -> &SharedData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = Context::new();
        assert_eq!(ctx.namespace(), DEFAULT_NAMESPACE);
        assert!(ctx.requests().is_empty());
        assert!(ctx.data().is_empty());
    }

    #[test]
    fn test_context_enumerates_messages() {
        let mut ctx = Context::new();
        ctx.set_request("b", HttpRequest::new("GET", "/b"));
        ctx.set_request("a", HttpRequest::new("GET", "/a"));
        ctx.set_response("a", HttpResponse::new(200));

        let names: Vec<&str> = ctx.requests().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(ctx.responses().len(), 1);
    }

    #[test]
    fn test_context_from_yaml() {
        let yaml = r#"
requests:
  req1:
    method: GET
    url: http://example.com/users
    headers:
      Accept: [application/json]
responses:
  resp1:
    statusCode: 503
data:
  tenant: acme
  limits:
    rps: 10
"#;
        let ctx: Context = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(ctx.request("req1").unwrap().header("accept"), Some("application/json"));
        assert_eq!(ctx.response("resp1").unwrap().status_code, 503);
        assert_eq!(ctx.data()["tenant"], TemplateValue::from("acme"));
        assert_eq!(ctx.namespace(), DEFAULT_NAMESPACE);
    }
}
