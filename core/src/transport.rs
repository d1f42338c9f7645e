//! Executes `HttpRequest` values.
//!
//! Network-level failures surface as [`ApiError::Transport`]; every HTTP
//! status, error statuses included, comes back as an `HttpResponse` so the
//! envelope alone decides what counts as a failure.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// One blocking HTTP round-trip.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse>,
{
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self(request)
    }
}

/// Blocking transport over `ureq`.
///
/// Status-code-as-error is disabled so 4xx/5xx responses are returned as data.
/// Response bodies are read in full with no size limit unless one is set with
/// [`UreqTransport::with_body_limit`].
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    body_limit: u64,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            body_limit: u64::MAX,
        }
    }

    /// Fails any response whose body exceeds `bytes`.
    pub fn with_body_limit(mut self, bytes: u64) -> Self {
        self.body_limit = bytes;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "executing request");

        let body = request.body.as_deref();
        let result = match request.method {
            HttpMethod::Get => decorate(self.agent.get(&request.url), request).call(),
            HttpMethod::Delete => decorate(self.agent.delete(&request.url), request).call(),
            HttpMethod::Post => send(decorate(self.agent.post(&request.url), request), body),
            HttpMethod::Put => send(decorate(self.agent.put(&request.url), request), body),
            HttpMethod::Patch => send(decorate(self.agent.patch(&request.url), request), body),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            url: request.url.clone(),
            headers,
            body,
        })
    }
}

fn decorate<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&[u8]>,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes),
        None => builder.send_empty(),
    }
}
