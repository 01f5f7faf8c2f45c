// ABOUTME: Delimiter-aware scanner that validates template expressions before compilation
// ABOUTME: Rewrites custom-delimited templates into native handlebars syntax

use super::error::{Result, TemplateError};
use super::functions::FuncRegistry;

pub const DEFAULT_LEFT_DELIM: &str = "{{";
pub const DEFAULT_RIGHT_DELIM: &str = "}}";

/// Helpers the handlebars registry ships with
pub const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt",
    "lte", "and", "or", "not", "len",
];

/// Zero-argument helpers that print characters the native syntax would
/// otherwise interpret when custom delimiters are in use.
pub const LITERAL_LBRACE_HELPER: &str = "__lbrace";
pub const LITERAL_BACKSLASH_HELPER: &str = "__backslash";

/// Markers that open and close template expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    left: String,
    right: String,
}

impl Delimiters {
    /// Empty markers fall back to `{{` and `}}`
    pub fn new(left: &str, right: &str) -> Self {
        let left = if left.is_empty() {
            DEFAULT_LEFT_DELIM
        } else {
            left
        };
        let right = if right.is_empty() {
            DEFAULT_RIGHT_DELIM
        } else {
            right
        };
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    pub fn is_default(&self) -> bool {
        self.left == DEFAULT_LEFT_DELIM && self.right == DEFAULT_RIGHT_DELIM
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(DEFAULT_LEFT_DELIM, DEFAULT_RIGHT_DELIM)
    }
}

/// A piece of template source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Expression { inner: &'a str, line: usize },
    /// A native `{{{{helper}}}} ... {{{{/helper}}}}` block, passed through unparsed
    Raw(&'a str),
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

/// Split template source into literal text and the contents of each expression
pub fn split<'a>(source: &'a str, delims: &Delimiters) -> Result<Vec<Segment<'a>>> {
    let left = delims.left();
    let right = delims.right();
    let native = delims.is_default();

    let mut segments = Vec::new();
    let mut offset = 0;

    while offset < source.len() {
        let rest = &source[offset..];
        let Some(start) = rest.find(left) else {
            segments.push(Segment::Text(rest));
            break;
        };

        // `\{{` is an escaped mustache in native syntax
        if native && rest[..start].ends_with('\\') {
            segments.push(Segment::Text(&rest[..start + left.len()]));
            offset += start + left.len();
            continue;
        }

        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }

        let open_at = offset + start;
        let after = &rest[start + left.len()..];

        if native && after.starts_with("{{") {
            let len = raw_block_len(after).ok_or_else(|| {
                TemplateError::SyntaxError(format!(
                    "unclosed raw block on line {}",
                    line_of(source, open_at)
                ))
            })?;
            segments.push(Segment::Raw(&source[open_at..open_at + left.len() + len]));
            offset = open_at + left.len() + len;
            continue;
        }

        let end = if after.starts_with("!--") {
            after.find(&format!("--{}", right)).map(|e| e + 2)
        } else if native && after.starts_with('{') {
            after.find(&format!("}}{}", right)).map(|e| e + 1)
        } else {
            after.find(right)
        };

        let Some(end) = end else {
            return Err(TemplateError::SyntaxError(format!(
                "unclosed action: '{}' on line {} has no matching '{}'",
                left,
                line_of(source, open_at),
                right
            )));
        };

        segments.push(Segment::Expression {
            inner: &after[..end],
            line: line_of(source, open_at),
        });
        offset = open_at + left.len() + end + right.len();
    }

    Ok(segments)
}

/// Length of a raw block body starting right after its first `{{`, through
/// the closing `{{{{/name}}}}`
fn raw_block_len(after: &str) -> Option<usize> {
    let open_end = after.find("}}}}")?;
    let name = after[2..open_end].split_whitespace().next()?;
    let closing = ["{{{{/", name, "}}}}"].concat();
    let body_start = open_end + 4;
    let close_at = after[body_start..].find(&closing)?;
    Some(body_start + close_at + closing.len())
}

/// Rebuild the source with native `{{ }}` markers and plain paths.
///
/// Under custom delimiters, literal `{` and `\` in text are routed through
/// the literal helpers so they print verbatim instead of opening an
/// expression. Under the default delimiters text keeps its native meaning.
pub fn to_native(segments: &[Segment<'_>], delims: &Delimiters) -> String {
    let escape_text = !delims.is_default();
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Raw(raw) => out.push_str(raw),
            Segment::Text(text) if !escape_text => out.push_str(text),
            Segment::Text(text) => {
                for c in text.chars() {
                    match c {
                        '{' => out.push_str(&format!("{{{{{}}}}}", LITERAL_LBRACE_HELPER)),
                        '\\' => out.push_str(&format!("{{{{{}}}}}", LITERAL_BACKSLASH_HELPER)),
                        other => out.push(other),
                    }
                }
            }
            Segment::Expression { inner, .. } => {
                out.push_str(DEFAULT_LEFT_DELIM);
                out.push_str(&normalize_paths(inner));
                out.push_str(DEFAULT_RIGHT_DELIM);
            }
        }
    }
    out
}

fn starts_token(bytes: &[u8], at: usize) -> bool {
    at == 0
        || bytes[at - 1].is_ascii_whitespace()
        || matches!(bytes[at - 1], b'(' | b'=' | b'#' | b'^' | b'&' | b'{' | b'~' | b'>')
}

/// Rewrite dot-rooted paths into handlebars paths: `.a.b` becomes `a.b` and a
/// bare `.` becomes `this`. Quoted strings, comments and `./`, `../` paths are
/// left alone.
pub fn normalize_paths(inner: &str) -> String {
    if inner.trim_start_matches('~').trim_start().starts_with('!') {
        return inner.to_string();
    }

    let bytes = inner.as_bytes();
    let mut out = String::with_capacity(inner.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_quoted(bytes, i).unwrap_or(bytes.len());
            }
            b'.' if starts_token(bytes, i) => {
                match bytes.get(i + 1) {
                    Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {
                        out.push_str(&inner[copied..i]);
                        copied = i + 1;
                    }
                    None => {
                        out.push_str(&inner[copied..i]);
                        out.push_str("this");
                        copied = i + 1;
                    }
                    Some(b) if b.is_ascii_whitespace() || matches!(b, b')' | b'}' | b'~') => {
                        out.push_str(&inner[copied..i]);
                        out.push_str("this");
                        copied = i + 1;
                    }
                    _ => {}
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    out.push_str(&inner[copied..]);
    out
}

fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Split an expression body into whitespace separated tokens, keeping quoted
/// strings, subexpressions and bracketed path segments whole.
pub fn tokenize(expr: &str) -> std::result::Result<Vec<&str>, String> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let start = i;
        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = skip_quoted(bytes, i).ok_or("unterminated quoted string")?;
                    continue;
                }
                b'(' | b'[' => depth += 1,
                b')' | b']' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| format!("unexpected '{}'", bytes[i] as char))?;
                }
                b if b.is_ascii_whitespace() && depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return Err("unclosed '(' or '['".to_string());
        }
        tokens.push(&expr[start..i]);
    }

    Ok(tokens)
}

fn is_literal(token: &str) -> bool {
    token.starts_with('"')
        || token.starts_with('\'')
        || token.starts_with(|c: char| c.is_ascii_digit())
        || (token.starts_with('-') && token[1..].starts_with(|c: char| c.is_ascii_digit()))
        || matches!(token, "true" | "false" | "null" | "undefined")
}

/// `key=value` hash argument; returns the value part
fn hash_value(token: &str) -> Option<&str> {
    if is_literal(token) || token.starts_with('(') || token.starts_with('[') {
        return None;
    }
    let eq = token.find('=')?;
    let key = &token[..eq];
    if key.is_empty() || key.contains(|c: char| matches!(c, '.' | '/' | '[' | '"' | '\'')) {
        return None;
    }
    Some(&token[eq + 1..])
}

fn subexpression(token: &str) -> Option<&str> {
    token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
}

fn is_helper(name: &str, functions: &FuncRegistry) -> bool {
    functions.contains(name) || BUILTIN_HELPERS.contains(&name)
}

/// Check a helper invocation: known name and, for registered functions, arity
fn check_call(tokens: &[&str], functions: &FuncRegistry, subexpr: bool) -> Result<()> {
    let Some((&head, args)) = tokens.split_first() else {
        return Err(TemplateError::SyntaxError("empty subexpression".to_string()));
    };

    let mut positional = 0;
    for arg in args {
        let value = match hash_value(arg) {
            Some(value) => value,
            None => {
                positional += 1;
                arg
            }
        };
        if let Some(inner) = subexpression(value) {
            check_subexpression(inner, functions)?;
        }
    }

    if let Some(func) = functions.get(head) {
        return func.check_arity(positional);
    }

    let has_args = !args.is_empty();
    if (has_args || subexpr) && !is_literal(head) && !is_helper(head, functions) {
        return Err(TemplateError::UnknownFunction(head.to_string()));
    }
    Ok(())
}

fn check_subexpression(inner: &str, functions: &FuncRegistry) -> Result<()> {
    let tokens = tokenize(inner).map_err(TemplateError::SyntaxError)?;
    check_call(&tokens, functions, true)
}

/// Validate one expression body against the function registry
pub fn check_expression(inner: &str, line: usize, functions: &FuncRegistry) -> Result<()> {
    let body = inner.trim_start_matches('~').trim_end_matches('~').trim();

    if body.starts_with('!') || body.starts_with('/') {
        return Ok(());
    }
    if body.starts_with('>') || body.starts_with("#>") || body.starts_with("#*") || body.starts_with('*') {
        return Err(TemplateError::SyntaxError(format!(
            "line {}: partials and decorators are not supported",
            line
        )));
    }

    let (body, block) = if let Some(rest) = body.strip_prefix('#') {
        (rest, true)
    } else if let Some(rest) = body.strip_prefix('^') {
        (rest, true)
    } else if let Some(rest) = body.strip_prefix('&') {
        (rest, false)
    } else if let Some(rest) = body.strip_prefix('{').and_then(|b| b.strip_suffix('}')) {
        (rest, false)
    } else if body == "else" || body == "^" {
        return Ok(());
    } else if let Some(rest) = body.strip_prefix("else ") {
        (rest, true)
    } else {
        (body, false)
    };

    let tokens = tokenize(body.trim())
        .map_err(|e| TemplateError::SyntaxError(format!("line {}: {}", line, e)))?;
    if tokens.is_empty() {
        if block {
            return Err(TemplateError::SyntaxError(format!(
                "line {}: missing block name",
                line
            )));
        }
        return Ok(());
    }

    // block params are not arguments
    let end = tokens
        .iter()
        .position(|t| *t == "as")
        .filter(|_| block)
        .unwrap_or(tokens.len());

    check_call(&tokens[..end], functions, false)
}
