//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The session
//! builds `HttpRequest` values and wraps `HttpResponse` values without caring
//! how the round-trip happens; a [`Transport`](crate::transport::Transport)
//! executes the actual I/O. Keeping the boundary as data keeps the envelope and
//! pagination logic deterministic and easy to drive from scripted responses.
//!
//! Bodies are raw bytes because file downloads travel through the same type.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute and carries no query string; query pairs are kept
/// separately so the transport can encode them.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Case-insensitive header lookup; the first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Produced by a transport after executing an `HttpRequest`. Immutable once
/// received; the envelope takes ownership of it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            url: String::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body together with a matching content type.
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json; charset=utf-8")
            .with_body(body.to_string())
    }

    /// Case-insensitive header lookup; the first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let resp = HttpResponse::new(200).with_header("Content-Disposition", "attachment");
        assert_eq!(resp.header("content-disposition"), Some("attachment"));
        assert_eq!(resp.header("CONTENT-DISPOSITION"), Some("attachment"));
        assert_eq!(resp.header("digest"), None);
    }

    #[test]
    fn with_json_sets_content_type() {
        let resp = HttpResponse::new(200).with_json(&serde_json::json!({"a": 1}));
        assert!(resp.header("content-type").unwrap().contains("application/json"));
        assert_eq!(resp.body, br#"{"a":1}"#);
    }

    #[test]
    fn query_param_lookup() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/students".to_string(),
            query: vec![("$top".to_string(), "50".to_string())],
            headers: Vec::new(),
            body: None,
        };
        assert_eq!(req.query_param("$top"), Some("50"));
        assert_eq!(req.query_param("$skip"), None);
        assert_eq!(req.method.to_string(), "GET");
    }
}
