// ABOUTME: Builder-specific template functions layered on top of the standard library
// ABOUTME: Float math, logging, object merging, JSON escaping and header/basic-auth helpers

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, error, info, warn};

use crate::template::helpers::{to_f64, to_text};
use crate::template::{Arity, FuncRegistry};

/// First value of a header in a projected `Header` mapping, ignoring case
fn header_of(headers: &JsonValue, name: &str) -> Option<String> {
    let headers = headers.as_object()?;
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| match values {
            JsonValue::Array(items) => items.first().map(to_text),
            other => Some(to_text(other)),
        })
}

/// Decode `Authorization: Basic ...` of a projected request into user and password
fn basic_auth(request: &JsonValue) -> std::result::Result<(String, String), String> {
    let header = request
        .get("Header")
        .and_then(|h| header_of(h, "Authorization"))
        .ok_or("request has no Authorization header")?;

    let encoded = header
        .strip_prefix("Basic ")
        .ok_or("Authorization header is not basic auth")?;

    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|e| format!("invalid basic auth encoding: {}", e))?;
    let decoded = String::from_utf8(decoded).map_err(|e| format!("invalid basic auth: {}", e))?;

    decoded
        .split_once(':')
        .map(|(user, pass)| (user.to_string(), pass.to_string()))
        .ok_or_else(|| "basic auth credentials missing ':'".to_string())
}

/// Functions every builder template can call in addition to the standard library
pub fn extra_functions() -> FuncRegistry {
    let mut registry = FuncRegistry::new();

    registry
        .register("addf", Arity::AtLeast(1), |args| {
            let sum = args.iter().map(to_f64).sum::<std::result::Result<f64, _>>()?;
            Ok(json!(sum))
        })
        .register("subf", Arity::Exact(2), |args| {
            Ok(json!(to_f64(&args[0])? - to_f64(&args[1])?))
        })
        .register("mulf", Arity::AtLeast(1), |args| {
            let product = args
                .iter()
                .map(to_f64)
                .product::<std::result::Result<f64, _>>()?;
            Ok(json!(product))
        })
        .register("divf", Arity::Exact(2), |args| {
            let divisor = to_f64(&args[1])?;
            if divisor == 0.0 {
                return Err("division by zero".to_string());
            }
            Ok(json!(to_f64(&args[0])? / divisor))
        })
        .register("log", Arity::Exact(2), |args| {
            let message = to_text(&args[1]);
            match to_text(&args[0]).to_lowercase().as_str() {
                "debug" => debug!("{}", message),
                "info" => info!("{}", message),
                "warn" => warn!("{}", message),
                "error" => error!("{}", message),
                other => return Err(format!("unknown log level '{}'", other)),
            }
            Ok(json!(""))
        })
        .register("mergeObject", Arity::AtLeast(0), |args| {
            // later objects override earlier ones
            let mut merged = Map::new();
            for arg in args {
                let object = arg
                    .as_object()
                    .ok_or_else(|| format!("mergeObject expects maps, got {}", arg))?;
                for (k, v) in object {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Ok(JsonValue::Object(merged))
        })
        .register("jsonEscape", Arity::Exact(1), |args| {
            let quoted = serde_json::to_string(&to_text(&args[0])).map_err(|e| e.to_string())?;
            Ok(json!(&quoted[1..quoted.len() - 1]))
        })
        .register("header", Arity::Exact(2), |args| {
            Ok(json!(header_of(&args[0], &to_text(&args[1])).unwrap_or_default()))
        })
        .register("username", Arity::Exact(1), |args| {
            basic_auth(&args[0]).map(|(user, _)| json!(user))
        })
        .register("password", Arity::Exact(1), |args| {
            basic_auth(&args[0]).map(|(_, pass)| json!(pass))
        });

    registry
}
