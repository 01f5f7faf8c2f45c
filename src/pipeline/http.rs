// ABOUTME: HTTP request and response values carried through the pipeline
// ABOUTME: Projects each message into the mapping templates see under requests/responses

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use super::BuilderProjection;
use crate::template::TemplateValue;

pub type Headers = BTreeMap<String, Vec<String>>;

fn default_proto() -> String {
    "HTTP/1.1".to_string()
}

fn default_status() -> u16 {
    200
}

/// Look up the first value of a header, ignoring case
fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn project_headers(headers: &Headers) -> TemplateValue {
    TemplateValue::Mapping(
        headers
            .iter()
            .map(|(k, v)| (k.clone(), TemplateValue::from(v.clone())))
            .collect(),
    )
}

/// Body text plus the parsed JSON body when the text is valid JSON
fn project_body(value: TemplateValue, body: &str) -> TemplateValue {
    let value = value.with("Body", body);
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) if !body.trim().is_empty() => value.with("JSONBody", TemplateValue::from_json(json)),
        _ => value,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    #[serde(default = "default_proto")]
    pub proto: String,
    #[serde(default)]
    pub real_ip: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            proto: default_proto(),
            real_ip: String::new(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// Append a header value
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_real_ip(mut self, ip: &str) -> Self {
        self.real_ip = ip.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Scheme, host, path and query of the request URL.
    /// Relative URLs take the host from the `Host` header.
    fn url_parts(&self) -> (String, String, String, String) {
        match Url::parse(&self.url) {
            Ok(parsed) => {
                let host = match (parsed.host_str(), parsed.port()) {
                    (Some(host), Some(port)) => format!("{}:{}", host, port),
                    (Some(host), None) => host.to_string(),
                    _ => String::new(),
                };
                (
                    parsed.scheme().to_string(),
                    host,
                    parsed.path().to_string(),
                    parsed.query().unwrap_or_default().to_string(),
                )
            }
            Err(_) => {
                let (path, query) = self.url.split_once('?').unwrap_or((self.url.as_str(), ""));
                let host = self.header("Host").unwrap_or_default();
                (
                    String::new(),
                    host.to_string(),
                    path.to_string(),
                    query.to_string(),
                )
            }
        }
    }
}

impl BuilderProjection for HttpRequest {
    fn to_builder_value(&self, id: &str) -> TemplateValue {
        let (scheme, host, path, query) = self.url_parts();

        let value = TemplateValue::mapping()
            .with("ID", id)
            .with("Method", self.method.as_str())
            .with("URL", self.url.as_str())
            .with("Scheme", scheme)
            .with("Host", host)
            .with("Path", path)
            .with("Query", query)
            .with("Proto", self.proto.as_str())
            .with("RealIP", self.real_ip.as_str())
            .with("Header", project_headers(&self.headers));

        project_body(value, &self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    #[serde(default = "default_status")]
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
}

impl HttpResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Headers::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(default_status())
    }
}

impl BuilderProjection for HttpResponse {
    fn to_builder_value(&self, id: &str) -> TemplateValue {
        let value = TemplateValue::mapping()
            .with("ID", id)
            .with("StatusCode", self.status_code)
            .with("Header", project_headers(&self.headers));

        project_body(value, &self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_projection_absolute_url() {
        let request = HttpRequest::new("POST", "https://api.example.com:8443/v1/users?limit=5")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"name": "alice"}"#)
            .with_real_ip("10.0.0.1");

        let value = request.to_builder_value("req1");
        let json = serde_json::to_value(&value).unwrap();

        assert_eq!(json["ID"], "req1");
        assert_eq!(json["Method"], "POST");
        assert_eq!(json["Scheme"], "https");
        assert_eq!(json["Host"], "api.example.com:8443");
        assert_eq!(json["Path"], "/v1/users");
        assert_eq!(json["Query"], "limit=5");
        assert_eq!(json["RealIP"], "10.0.0.1");
        assert_eq!(json["Header"]["Content-Type"][0], "application/json");
        assert_eq!(json["JSONBody"]["name"], "alice");
    }

    #[test]
    fn test_request_projection_relative_url() {
        let request = HttpRequest::new("GET", "/health?verbose=1").with_header("host", "svc.local");
        let json = serde_json::to_value(request.to_builder_value("probe")).unwrap();

        assert_eq!(json["Scheme"], "");
        assert_eq!(json["Host"], "svc.local");
        assert_eq!(json["Path"], "/health");
        assert_eq!(json["Query"], "verbose=1");
        assert!(json.get("JSONBody").is_none());
    }

    #[test]
    fn test_response_projection() {
        let response = HttpResponse::new(201)
            .with_header("X-Request-Id", "abc")
            .with_body("plain text");
        let json = serde_json::to_value(response.to_builder_value("resp")).unwrap();

        assert_eq!(json["StatusCode"], 201);
        assert_eq!(json["Header"]["X-Request-Id"], serde_json::json!(["abc"]));
        assert_eq!(json["Body"], "plain text");
        assert!(json.get("JSONBody").is_none());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = HttpRequest::new("GET", "/").with_header("Authorization", "Basic x");
        assert_eq!(request.header("authorization"), Some("Basic x"));
        assert_eq!(request.header("missing"), None);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: HttpRequest = serde_yaml::from_str("method: GET\nurl: /a\n").unwrap();
        assert_eq!(request.proto, "HTTP/1.1");
        assert!(request.headers.is_empty());
    }
}
