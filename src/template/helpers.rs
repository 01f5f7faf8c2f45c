// ABOUTME: Standard library of template functions for strings, math, dates, encoding and collections
// ABOUTME: Follows sprig conventions: the value being operated on is the last argument

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::functions::{Arity, FuncRegistry, FuncResult};

/// Upper bound on the size of strings built by repetition
const MAX_REPEAT_BYTES: usize = 1 << 24;

/// Render a value as plain text the way templates print it
pub fn to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sprig emptiness: null, false, zero, and empty strings, lists and maps
pub fn is_empty(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64() == Some(0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
    }
}

pub fn to_f64(value: &JsonValue) -> std::result::Result<f64, String> {
    match value {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| format!("{} is not a number", n)),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s)),
        JsonValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        JsonValue::Null => Ok(0.0),
        other => Err(format!("{} is not a number", other)),
    }
}

pub fn to_i64(value: &JsonValue) -> std::result::Result<i64, String> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| format!("{} is not an integer", n)),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
                .map_err(|_| format!("'{}' is not an integer", s))
        }
        JsonValue::Bool(b) => Ok(i64::from(*b)),
        JsonValue::Null => Ok(0),
        other => Err(format!("{} is not an integer", other)),
    }
}

fn to_list(value: &JsonValue) -> std::result::Result<&Vec<JsonValue>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected a list, got {}", kind_of(value)))
}

fn to_map(value: &JsonValue) -> std::result::Result<&Map<String, JsonValue>, String> {
    value
        .as_object()
        .ok_or_else(|| format!("expected a map, got {}", kind_of(value)))
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_f64() => "float64",
        JsonValue::Number(_) => "int",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "slice",
        JsonValue::Object(_) => "map",
    }
}

/// Integer result when both operands are integers, float otherwise
fn number(value: f64, integral: bool) -> JsonValue {
    if integral && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn all_integers(args: &[JsonValue]) -> bool {
    args.iter().all(|a| match a {
        JsonValue::Number(n) => n.is_i64() || n.is_u64(),
        JsonValue::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    })
}

/// `text` repeated `count` times, refusing outputs over `MAX_REPEAT_BYTES`
fn repeat_bounded(text: &str, count: i64) -> std::result::Result<String, String> {
    let count = usize::try_from(count).map_err(|_| "repeat count must not be negative".to_string())?;
    match text.len().checked_mul(count) {
        Some(size) if size <= MAX_REPEAT_BYTES => Ok(text.repeat(count)),
        _ => Err(format!("repeat output exceeds {} bytes", MAX_REPEAT_BYTES)),
    }
}

/// strftime-style formatting that rejects unknown specifiers
fn format_time(time: &DateTime<Utc>, format: &str) -> std::result::Result<String, String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date format '{}'", format));
    }
    Ok(time.format_with_items(items.iter()).to_string())
}

fn parse_time(value: &JsonValue) -> std::result::Result<DateTime<Utc>, String> {
    match value {
        JsonValue::Number(_) => {
            let secs = to_i64(value)?;
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| format!("timestamp {} is out of range", secs))
        }
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                    .ok_or_else(|| format!("failed to parse timestamp '{}'", s))
            }),
        other => Err(format!("failed to parse timestamp {}", other)),
    }
}

fn register_string_functions(registry: &mut FuncRegistry) {
    registry
        .register("upper", Arity::Exact(1), |args| {
            Ok(json!(to_text(&args[0]).to_uppercase()))
        })
        .register("lower", Arity::Exact(1), |args| {
            Ok(json!(to_text(&args[0]).to_lowercase()))
        })
        .register("title", Arity::Exact(1), |args| {
            let titled = to_text(&args[0])
                .split(' ')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<String>>()
                .join(" ");
            Ok(json!(titled))
        })
        .register("trim", Arity::Exact(1), |args| {
            Ok(json!(to_text(&args[0]).trim()))
        })
        .register("trimAll", Arity::Exact(2), |args| {
            let cutset: Vec<char> = to_text(&args[0]).chars().collect();
            let text = to_text(&args[1]);
            Ok(json!(text.trim_matches(|c: char| cutset.contains(&c))))
        })
        .register("trimPrefix", Arity::Exact(2), |args| {
            let prefix = to_text(&args[0]);
            let text = to_text(&args[1]);
            Ok(json!(text.strip_prefix(prefix.as_str()).unwrap_or(text.as_str())))
        })
        .register("trimSuffix", Arity::Exact(2), |args| {
            let suffix = to_text(&args[0]);
            let text = to_text(&args[1]);
            Ok(json!(text.strip_suffix(suffix.as_str()).unwrap_or(text.as_str())))
        })
        .register("replace", Arity::Exact(3), |args| {
            let old = to_text(&args[0]);
            let new = to_text(&args[1]);
            Ok(json!(to_text(&args[2]).replace(&old, &new)))
        })
        .register("contains", Arity::Exact(2), |args| {
            Ok(json!(to_text(&args[1]).contains(&to_text(&args[0]))))
        })
        .register("hasPrefix", Arity::Exact(2), |args| {
            Ok(json!(to_text(&args[1]).starts_with(&to_text(&args[0]))))
        })
        .register("hasSuffix", Arity::Exact(2), |args| {
            Ok(json!(to_text(&args[1]).ends_with(&to_text(&args[0]))))
        })
        .register("repeat", Arity::Exact(2), |args| {
            let count = to_i64(&args[0])?;
            Ok(json!(repeat_bounded(&to_text(&args[1]), count)?))
        })
        .register("substr", Arity::Exact(3), |args| {
            let chars: Vec<char> = to_text(&args[2]).chars().collect();
            let len = chars.len() as i64;
            let start = to_i64(&args[0])?.clamp(0, len);
            let end = to_i64(&args[1])?;
            let end = if end < 0 || end > len { len } else { end };
            if start >= end {
                return Ok(json!(""));
            }
            Ok(json!(chars[start as usize..end as usize]
                .iter()
                .collect::<String>()))
        })
        .register("trunc", Arity::Exact(2), |args| {
            let n = to_i64(&args[0])?;
            let chars: Vec<char> = to_text(&args[1]).chars().collect();
            let len = chars.len() as i64;
            let kept: String = if n >= 0 {
                chars.iter().take(n as usize).collect()
            } else {
                chars.iter().skip((len + n).max(0) as usize).collect()
            };
            Ok(json!(kept))
        })
        .register("nospace", Arity::Exact(1), |args| {
            Ok(json!(to_text(&args[0])
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()))
        })
        .register("quote", Arity::AtLeast(1), |args| {
            Ok(json!(args
                .iter()
                .filter(|a| !a.is_null())
                .map(|a| format!("{:?}", to_text(a)))
                .collect::<Vec<_>>()
                .join(" ")))
        })
        .register("squote", Arity::AtLeast(1), |args| {
            Ok(json!(args
                .iter()
                .filter(|a| !a.is_null())
                .map(|a| format!("'{}'", to_text(a)))
                .collect::<Vec<_>>()
                .join(" ")))
        })
        .register("cat", Arity::AtLeast(0), |args| {
            Ok(json!(args
                .iter()
                .filter(|a| !a.is_null())
                .map(to_text)
                .collect::<Vec<_>>()
                .join(" ")))
        })
        .register("indent", Arity::Exact(2), |args| {
            let pad = repeat_bounded(" ", to_i64(&args[0])?.max(0))?;
            Ok(json!(indent(&pad, &to_text(&args[1]))))
        })
        .register("nindent", Arity::Exact(2), |args| {
            let pad = repeat_bounded(" ", to_i64(&args[0])?.max(0))?;
            Ok(json!(format!("\n{}", indent(&pad, &to_text(&args[1])))))
        })
        .register("splitList", Arity::Exact(2), |args| {
            let sep = to_text(&args[0]);
            let text = to_text(&args[1]);
            Ok(json!(text.split(sep.as_str()).collect::<Vec<_>>()))
        })
        .register("join", Arity::Exact(2), |args| {
            let sep = to_text(&args[0]);
            let list = to_list(&args[1])?;
            Ok(json!(list.iter().map(to_text).collect::<Vec<_>>().join(&sep)))
        })
        .register("toString", Arity::Exact(1), |args| Ok(json!(to_text(&args[0]))));
}

fn indent(pad: &str, text: &str) -> String {
    text.split('\n')
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn register_default_functions(registry: &mut FuncRegistry) {
    registry
        .register("default", Arity::Range(1, 2), |args| {
            let fallback = &args[0];
            match args.get(1) {
                Some(given) if !is_empty(given) => Ok(given.clone()),
                _ => Ok(fallback.clone()),
            }
        })
        .register("empty", Arity::Exact(1), |args| Ok(json!(is_empty(&args[0]))))
        .register("coalesce", Arity::AtLeast(1), |args| {
            Ok(args
                .iter()
                .find(|a| !is_empty(a))
                .cloned()
                .unwrap_or(JsonValue::Null))
        })
        .register("ternary", Arity::Exact(3), |args| {
            if is_empty(&args[2]) {
                Ok(args[1].clone())
            } else {
                Ok(args[0].clone())
            }
        })
        .register("kindOf", Arity::Exact(1), |args| Ok(json!(kind_of(&args[0]))));
}

fn register_math_functions(registry: &mut FuncRegistry) {
    registry
        .register("add", Arity::AtLeast(1), |args| {
            let sum = args.iter().map(to_f64).sum::<std::result::Result<f64, _>>()?;
            Ok(number(sum, all_integers(args)))
        })
        .register("add1", Arity::Exact(1), |args| {
            Ok(number(to_f64(&args[0])? + 1.0, all_integers(args)))
        })
        .register("sub", Arity::Exact(2), |args| {
            Ok(number(to_f64(&args[0])? - to_f64(&args[1])?, all_integers(args)))
        })
        .register("mul", Arity::AtLeast(1), |args| {
            let product = args
                .iter()
                .map(to_f64)
                .product::<std::result::Result<f64, _>>()?;
            Ok(number(product, all_integers(args)))
        })
        .register("div", Arity::Exact(2), |args| {
            let divisor = to_i64(&args[1])?;
            if divisor == 0 {
                return Err("division by zero".to_string());
            }
            to_i64(&args[0])?
                .checked_div(divisor)
                .map(|q| json!(q))
                .ok_or_else(|| "integer overflow".to_string())
        })
        .register("mod", Arity::Exact(2), |args| {
            let divisor = to_i64(&args[1])?;
            if divisor == 0 {
                return Err("division by zero".to_string());
            }
            to_i64(&args[0])?
                .checked_rem(divisor)
                .map(|r| json!(r))
                .ok_or_else(|| "integer overflow".to_string())
        })
        .register("max", Arity::AtLeast(1), |args| {
            let values = args.iter().map(to_f64).collect::<std::result::Result<Vec<_>, _>>()?;
            let max = values.into_iter().fold(f64::NEG_INFINITY, f64::max);
            Ok(number(max, all_integers(args)))
        })
        .register("min", Arity::AtLeast(1), |args| {
            let values = args.iter().map(to_f64).collect::<std::result::Result<Vec<_>, _>>()?;
            let min = values.into_iter().fold(f64::INFINITY, f64::min);
            Ok(number(min, all_integers(args)))
        })
        .register("floor", Arity::Exact(1), |args| Ok(json!(to_f64(&args[0])?.floor())))
        .register("ceil", Arity::Exact(1), |args| Ok(json!(to_f64(&args[0])?.ceil())))
        .register("round", Arity::Exact(2), |args| {
            let precision = to_i64(&args[1])?.clamp(0, 15) as i32;
            let factor = 10f64.powi(precision);
            Ok(json!((to_f64(&args[0])? * factor).round() / factor))
        })
        .register("int", Arity::Exact(1), |args| Ok(json!(to_i64(&args[0])?)))
        .register("atoi", Arity::Exact(1), |args| {
            Ok(json!(to_text(&args[0]).trim().parse::<i64>().unwrap_or(0)))
        })
        .register("float64", Arity::Exact(1), |args| Ok(json!(to_f64(&args[0])?)));
}

fn register_encoding_functions(registry: &mut FuncRegistry) {
    registry
        .register("b64enc", Arity::Exact(1), |args| {
            Ok(json!(BASE64.encode(to_text(&args[0]).as_bytes())))
        })
        .register("b64dec", Arity::Exact(1), |args| {
            let decoded = BASE64
                .decode(to_text(&args[0]))
                .map_err(|e| format!("Base64 decode error: {}", e))?;
            String::from_utf8(decoded)
                .map(|s| json!(s))
                .map_err(|e| format!("UTF-8 decode error: {}", e))
        })
        .register("sha256sum", Arity::Exact(1), |args| {
            let digest = Sha256::digest(to_text(&args[0]).as_bytes());
            Ok(json!(hex::encode(digest)))
        })
        .register("urlquery", Arity::AtLeast(1), |args| {
            let joined = args.iter().map(to_text).collect::<Vec<_>>().join("");
            Ok(json!(url::form_urlencoded::byte_serialize(joined.as_bytes())
                .collect::<String>()))
        })
        .register("toJson", Arity::Exact(1), |args| {
            serde_json::to_string(&args[0])
                .map(|s| json!(s))
                .map_err(|e| e.to_string())
        })
        .register("toPrettyJson", Arity::Exact(1), |args| {
            serde_json::to_string_pretty(&args[0])
                .map(|s| json!(s))
                .map_err(|e| e.to_string())
        })
        .register("fromJson", Arity::Exact(1), |args| {
            serde_json::from_str(&to_text(&args[0])).map_err(|e| e.to_string())
        })
        .register("toYaml", Arity::Exact(1), |args| {
            serde_yaml::to_string(&args[0])
                .map(|s| json!(s.trim_end()))
                .map_err(|e| e.to_string())
        });
}

fn register_date_functions(registry: &mut FuncRegistry) {
    registry
        .register("now", Arity::Exact(0), |_| Ok(json!(Utc::now().to_rfc3339())))
        .register("date", Arity::Exact(2), |args| {
            let format = to_text(&args[0]);
            let time = parse_time(&args[1])?;
            Ok(json!(format_time(&time, &format)?))
        })
        .register("unixEpoch", Arity::Exact(1), |args| {
            Ok(json!(parse_time(&args[0])?.timestamp()))
        })
        .register("uuidv4", Arity::Exact(0), |_| {
            Ok(json!(Uuid::new_v4().to_string()))
        });
}

fn register_list_functions(registry: &mut FuncRegistry) {
    registry
        .register("list", Arity::AtLeast(0), |args| Ok(JsonValue::Array(args.to_vec())))
        .register("len", Arity::Exact(1), |args| {
            let len = match &args[0] {
                JsonValue::Null => 0,
                JsonValue::String(s) => s.chars().count(),
                JsonValue::Array(a) => a.len(),
                JsonValue::Object(o) => o.len(),
                other => return Err(format!("len of {} is undefined", kind_of(other))),
            };
            Ok(json!(len))
        })
        .register("first", Arity::Exact(1), |args| {
            Ok(to_list(&args[0])?.first().cloned().unwrap_or(JsonValue::Null))
        })
        .register("last", Arity::Exact(1), |args| {
            Ok(to_list(&args[0])?.last().cloned().unwrap_or(JsonValue::Null))
        })
        .register("rest", Arity::Exact(1), |args| {
            Ok(json!(to_list(&args[0])?.iter().skip(1).collect::<Vec<_>>()))
        })
        .register("initial", Arity::Exact(1), |args| {
            let list = to_list(&args[0])?;
            Ok(json!(list[..list.len().saturating_sub(1)].to_vec()))
        })
        .register("append", Arity::Exact(2), |args| {
            let mut list = to_list(&args[0])?.clone();
            list.push(args[1].clone());
            Ok(JsonValue::Array(list))
        })
        .register("prepend", Arity::Exact(2), |args| {
            let mut list = to_list(&args[0])?.clone();
            list.insert(0, args[1].clone());
            Ok(JsonValue::Array(list))
        })
        .register("concat", Arity::AtLeast(1), |args| {
            let mut out = Vec::new();
            for arg in args {
                out.extend(to_list(arg)?.iter().cloned());
            }
            Ok(JsonValue::Array(out))
        })
        .register("reverse", Arity::Exact(1), |args| {
            let mut list = to_list(&args[0])?.clone();
            list.reverse();
            Ok(JsonValue::Array(list))
        })
        .register("uniq", Arity::Exact(1), |args| {
            let mut out: Vec<JsonValue> = Vec::new();
            for item in to_list(&args[0])? {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            Ok(JsonValue::Array(out))
        })
        .register("compact", Arity::Exact(1), |args| {
            Ok(JsonValue::Array(
                to_list(&args[0])?
                    .iter()
                    .filter(|v| !is_empty(v))
                    .cloned()
                    .collect(),
            ))
        })
        .register("has", Arity::Exact(2), |args| {
            Ok(json!(to_list(&args[1])?.contains(&args[0])))
        })
        .register("sortAlpha", Arity::Exact(1), |args| {
            let mut items: Vec<String> = to_list(&args[0])?.iter().map(to_text).collect();
            items.sort();
            Ok(json!(items))
        });
}

fn register_map_functions(registry: &mut FuncRegistry) {
    registry
        .register("dict", Arity::AtLeast(0), |args| {
            let mut map = Map::new();
            for pair in args.chunks(2) {
                let value = pair.get(1).cloned().unwrap_or(json!(""));
                map.insert(to_text(&pair[0]), value);
            }
            Ok(JsonValue::Object(map))
        })
        .register("get", Arity::Exact(2), |args| {
            let map = to_map(&args[0])?;
            Ok(map.get(&to_text(&args[1])).cloned().unwrap_or(json!("")))
        })
        .register("set", Arity::Exact(3), |args| {
            let mut map = to_map(&args[0])?.clone();
            map.insert(to_text(&args[1]), args[2].clone());
            Ok(JsonValue::Object(map))
        })
        .register("unset", Arity::Exact(2), |args| {
            let mut map = to_map(&args[0])?.clone();
            map.remove(&to_text(&args[1]));
            Ok(JsonValue::Object(map))
        })
        .register("hasKey", Arity::Exact(2), |args| {
            Ok(json!(to_map(&args[0])?.contains_key(&to_text(&args[1]))))
        })
        .register("keys", Arity::AtLeast(1), |args| {
            let mut keys = Vec::new();
            for arg in args {
                keys.extend(to_map(arg)?.keys().cloned());
            }
            Ok(json!(keys))
        })
        .register("values", Arity::Exact(1), |args| {
            Ok(JsonValue::Array(to_map(&args[0])?.values().cloned().collect()))
        })
        .register("pick", Arity::AtLeast(2), |args| {
            let map = to_map(&args[0])?;
            let picked = args[1..]
                .iter()
                .map(to_text)
                .filter_map(|k| map.get(&k).map(|v| (k, v.clone())))
                .collect();
            Ok(JsonValue::Object(picked))
        })
        .register("omit", Arity::AtLeast(2), |args| {
            let omitted: Vec<String> = args[1..].iter().map(to_text).collect();
            let kept = to_map(&args[0])?
                .iter()
                .filter(|(k, _)| !omitted.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(JsonValue::Object(kept))
        })
        .register("merge", Arity::AtLeast(1), |args| {
            // earlier maps take precedence
            let mut merged = Map::new();
            for arg in args.iter().rev() {
                for (k, v) in to_map(arg)? {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Ok(JsonValue::Object(merged))
        });
}

/// Build the general-purpose function library shared by every template
pub fn standard_functions() -> FuncRegistry {
    let mut registry = FuncRegistry::new();
    register_string_functions(&mut registry);
    register_default_functions(&mut registry);
    register_math_functions(&mut registry);
    register_encoding_functions(&mut registry);
    register_date_functions(&mut registry);
    register_list_functions(&mut registry);
    register_map_functions(&mut registry);
    registry
}
