// ABOUTME: Builder configuration and its validation rules
// ABOUTME: A builder is driven either by a template or by a source namespace, never both

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{BuilderError, Result};
use crate::template::Delimiters;

/// Configuration of a builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuilderSpec {
    pub left_delim: String,
    pub right_delim: String,
    pub source_namespace: String,
    pub template: String,
}

impl BuilderSpec {
    pub fn from_template(template: &str) -> Self {
        Self {
            template: template.to_string(),
            ..Self::default()
        }
    }

    pub fn from_source_namespace(namespace: &str) -> Self {
        Self {
            source_namespace: namespace.to_string(),
            ..Self::default()
        }
    }

    pub fn with_delimiters(mut self, left: &str, right: &str) -> Self {
        self.left_delim = left.to_string();
        self.right_delim = right.to_string();
        self
    }

    /// Parse a spec from YAML or JSON text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| BuilderError::ConfigError(e.to_string()))
    }

    /// Load a spec from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check that exactly one build source is configured
    pub fn validate(&self) -> Result<()> {
        if self.source_namespace.is_empty() && self.template.is_empty() {
            return Err(BuilderError::ConfigError(
                "sourceNamespace or template must be specified".to_string(),
            ));
        }

        if !self.source_namespace.is_empty() && !self.template.is_empty() {
            return Err(BuilderError::ConfigError(
                "sourceNamespace and template cannot be specified at the same time".to_string(),
            ));
        }

        if self.left_delim.is_empty() != self.right_delim.is_empty() {
            return Err(BuilderError::ConfigError(
                "leftDelim and rightDelim must be specified together".to_string(),
            ));
        }

        Ok(())
    }

    pub fn delimiters(&self) -> Delimiters {
        Delimiters::new(&self.left_delim, &self.right_delim)
    }

    /// The source namespace, when the builder delegates instead of rendering
    pub fn source(&self) -> Option<&str> {
        if self.source_namespace.is_empty() {
            None
        } else {
            Some(&self.source_namespace)
        }
    }
}
