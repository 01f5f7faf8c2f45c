// ABOUTME: Template-visible values and the per-invocation execution snapshot
// ABOUTME: Projects pipeline requests, responses and shared data into a renderable shape

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::error::{Result, TemplateError};
use crate::pipeline::PipelineContext;

/// Shared data carried across pipeline stages.
pub type SharedData = BTreeMap<String, TemplateValue>;

/// A value that templates can see.
///
/// Projections of requests and responses must produce one of these instead of
/// handing native objects to the renderer. `Opaque` carries arbitrary JSON
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<TemplateValue>),
    Mapping(BTreeMap<String, TemplateValue>),
    Opaque(JsonValue),
}

impl TemplateValue {
    /// Build an empty mapping
    pub fn mapping() -> Self {
        TemplateValue::Mapping(BTreeMap::new())
    }

    /// Insert a key into a mapping value, returning the updated value.
    /// Non-mapping values are returned unchanged.
    pub fn with(mut self, key: &str, value: impl Into<TemplateValue>) -> Self {
        if let TemplateValue::Mapping(ref mut map) = self {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Look up a key of a mapping value
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        match self {
            TemplateValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TemplateValue::String(s) => Some(s),
            TemplateValue::Opaque(JsonValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Structural conversion from JSON; objects and arrays become mappings and sequences
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => TemplateValue::Null,
            JsonValue::Bool(b) => TemplateValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => TemplateValue::Integer(i),
                None => n
                    .as_f64()
                    .map(TemplateValue::Float)
                    .unwrap_or(TemplateValue::Opaque(JsonValue::Number(n))),
            },
            JsonValue::String(s) => TemplateValue::String(s),
            JsonValue::Array(items) => {
                TemplateValue::Sequence(items.into_iter().map(Self::from_json).collect())
            }
            JsonValue::Object(obj) => TemplateValue::Mapping(
                obj.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::String(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::String(value)
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        TemplateValue::Bool(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        TemplateValue::Integer(value)
    }
}

impl From<u16> for TemplateValue {
    fn from(value: u16) -> Self {
        TemplateValue::Integer(i64::from(value))
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        TemplateValue::Float(value)
    }
}

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(values: Vec<T>) -> Self {
        TemplateValue::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TemplateValue>> From<BTreeMap<String, T>> for TemplateValue {
    fn from(values: BTreeMap<String, T>) -> Self {
        TemplateValue::Mapping(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Everything a template can reference during one invocation.
///
/// Captured fresh from the pipeline context on every build and dropped once
/// rendering finishes.
#[derive(Debug, Serialize)]
pub struct ExecutionSnapshot<'a> {
    pub requests: BTreeMap<String, TemplateValue>,
    pub responses: BTreeMap<String, TemplateValue>,
    pub data: &'a SharedData,
}

impl<'a> ExecutionSnapshot<'a> {
    /// Project every named request and response and borrow the shared data
    pub fn capture<C>(ctx: &'a C) -> Self
    where
        C: PipelineContext + ?Sized,
    {
        let requests = ctx
            .requests()
            .into_iter()
            .map(|(name, req)| (name.to_string(), req.to_builder_value(name)))
            .collect();

        let responses = ctx
            .responses()
            .into_iter()
            .map(|(name, resp)| (name.to_string(), resp.to_builder_value(name)))
            .collect();

        Self {
            requests,
            responses,
            data: ctx.data(),
        }
    }

    /// Convert the snapshot to JSON for handlebars rendering
    pub fn to_json(&self) -> Result<JsonValue> {
        serde_json::to_value(self).map_err(TemplateError::JsonError)
    }
}
