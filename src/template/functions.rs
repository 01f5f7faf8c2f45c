// ABOUTME: Explicit registry of named template functions with fixed arities
// ABOUTME: Adapts registered functions into handlebars helpers at compile time

use handlebars::{Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error::{Result, TemplateError};

/// Outcome of a template function; the error is a human readable reason.
pub type FuncResult = std::result::Result<JsonValue, String>;

/// Signature every template function shares.
pub type TemplateFn = dyn Fn(&[JsonValue]) -> FuncResult + Send + Sync;

/// Number of positional arguments a function accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => count >= min && count <= max,
            Arity::AtLeast(min) => count >= min,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
            Arity::AtLeast(min) => write!(f, "at least {}", min),
        }
    }
}

/// A named, side-effect-free function callable from templates
#[derive(Clone)]
pub struct TemplateFunction {
    name: String,
    arity: Arity,
    func: Arc<TemplateFn>,
}

impl TemplateFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Check the argument count, then invoke the function
    pub fn call(&self, args: &[JsonValue]) -> Result<JsonValue> {
        self.check_arity(args.len())?;
        (self.func)(args).map_err(|reason| TemplateError::FunctionError {
            name: self.name.clone(),
            reason,
        })
    }

    pub fn check_arity(&self, count: usize) -> Result<()> {
        if self.arity.accepts(count) {
            Ok(())
        } else {
            Err(TemplateError::ArityError {
                name: self.name.clone(),
                expected: self.arity.to_string(),
                actual: count,
            })
        }
    }
}

impl fmt::Debug for TemplateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl HelperDef for TemplateFunction {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'reg, 'rc>, RenderError> {
        let args: Vec<JsonValue> = h.params().iter().map(|p| p.value().clone()).collect();
        self.call(&args)
            .map(ScopedJson::Derived)
            .map_err(|e| RenderError::new(e.to_string()))
    }
}

/// Closed set of functions installed into every compiled template
#[derive(Clone, Default)]
pub struct FuncRegistry {
    funcs: BTreeMap<String, TemplateFunction>,
}

impl FuncRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous function with the same name
    pub fn register<F>(&mut self, name: &str, arity: Arity, func: F) -> &mut Self
    where
        F: Fn(&[JsonValue]) -> FuncResult + Send + Sync + 'static,
    {
        self.funcs.insert(
            name.to_string(),
            TemplateFunction {
                name: name.to_string(),
                arity,
                func: Arc::new(func),
            },
        );
        self
    }

    /// Add every function of `other`; functions in `other` win on name clashes
    pub fn merge(&mut self, other: &FuncRegistry) -> &mut Self {
        for (name, func) in &other.funcs {
            self.funcs.insert(name.clone(), func.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFunction> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Register every function as a handlebars helper
    pub fn install(&self, handlebars: &mut Handlebars<'static>) {
        for (name, func) in &self.funcs {
            handlebars.register_helper(name, Box::new(func.clone()));
        }
    }
}

impl fmt::Debug for FuncRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.funcs.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_registry() -> FuncRegistry {
        let mut registry = FuncRegistry::new();
        registry.register("double", Arity::Exact(1), |args| {
            let n = args[0].as_i64().ok_or("expected an integer")?;
            Ok(json!(n * 2))
        });
        registry
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(Arity::Range(1, 3).accepts(3));
        assert!(!Arity::Range(1, 3).accepts(0));
        assert!(Arity::AtLeast(1).accepts(10));
        assert_eq!(Arity::Range(1, 2).to_string(), "1 to 2");
    }

    #[test]
    fn test_registry_call() {
        let registry = sample_registry();
        let double = registry.get("double").unwrap();
        assert_eq!(double.call(&[json!(21)]).unwrap(), json!(42));
    }

    #[test]
    fn test_registry_call_wrong_arity() {
        let registry = sample_registry();
        let err = registry.get("double").unwrap().call(&[]).unwrap_err();
        assert!(matches!(err, TemplateError::ArityError { actual: 0, .. }));
    }

    #[test]
    fn test_registry_call_function_error() {
        let registry = sample_registry();
        let err = registry
            .get("double")
            .unwrap()
            .call(&[json!("x")])
            .unwrap_err();
        assert!(err.to_string().contains("expected an integer"));
    }

    #[test]
    fn test_registry_merge_overrides() {
        let mut base = sample_registry();
        let mut other = FuncRegistry::new();
        other.register("double", Arity::Exact(0), |_| Ok(json!(0)));
        other.register("zero", Arity::Exact(0), |_| Ok(json!(0)));

        base.merge(&other);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("double").unwrap().arity(), Arity::Exact(0));
        assert_eq!(base.names().collect::<Vec<_>>(), vec!["double", "zero"]);
    }

    #[test]
    fn test_installed_helper_renders() {
        let mut handlebars = Handlebars::new();
        sample_registry().install(&mut handlebars);

        let result = handlebars
            .render_template("{{double 4}}", &json!({}))
            .unwrap();
        assert_eq!(result, "8");
    }
}
