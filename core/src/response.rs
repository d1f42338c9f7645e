//! Response envelope: success classification, lazy typed decoding and
//! file-transfer metadata for one HTTP response.
//!
//! # Design
//! The envelope owns the raw response and exposes it through named accessors
//! only. A status is acceptable when it is below 400 or listed in the
//! caller's safe set, which lets individual calls treat e.g. `404` as an
//! answer rather than a failure.
//!
//! The body is decoded at most once. The outcome is memoized in a `OnceLock`,
//! including the "no JSON payload" outcome, so repeat access never re-parses
//! and concurrent readers cannot race the fill.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use base64::Engine;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::datetime::{DatetimeHook, ScalarHook};
use crate::document::Document;
use crate::error::{ApiError, ErrorDetail, RequestFailure, Result};
use crate::http::HttpResponse;

/// Header names the envelope inspects. Supplied by the API integration; the
/// defaults match the school API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNames {
    pub content_type: String,
    pub content_disposition: String,
    /// Pagination continuation flag; truthy values are `true`, `1` and `yes`.
    pub has_more: String,
    /// Digest headers in order of preference.
    pub digest: Vec<String>,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            content_type: "content-type".to_string(),
            content_disposition: "content-disposition".to_string(),
            has_more: "x-has-more".to_string(),
            digest: vec!["digest".to_string(), "repr-digest".to_string()],
        }
    }
}

/// Algorithm-prefixed digest announced for a file transfer, e.g.
/// `sha-256=<base64>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub algorithm: String,
    /// Value exactly as sent, without structured-field colons.
    pub value: String,
}

impl Digest {
    fn parse(header: &str) -> Option<Self> {
        let first = header.split(',').next()?.trim();
        let (algorithm, value) = first.split_once('=')?;
        let value = value.trim().trim_matches(':');
        if algorithm.trim().is_empty() || value.is_empty() {
            return None;
        }
        Some(Self {
            algorithm: algorithm.trim().to_string(),
            value: value.to_string(),
        })
    }

    /// Lowercase hex of the base64-encoded value.
    pub fn hex(&self) -> Option<String> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.value)
            .ok()
            .map(hex::encode)
    }
}

pub struct ResponseEnvelope {
    raw: HttpResponse,
    safe_statuses: BTreeSet<u16>,
    header_names: Arc<HeaderNames>,
    hook: Arc<dyn ScalarHook>,
    decoded: OnceLock<Option<Document>>,
}

impl ResponseEnvelope {
    pub fn new(raw: HttpResponse) -> Self {
        Self {
            raw,
            safe_statuses: BTreeSet::new(),
            header_names: Arc::new(HeaderNames::default()),
            hook: Arc::new(DatetimeHook::new()),
            decoded: OnceLock::new(),
        }
    }

    pub fn with_safe_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.safe_statuses.extend(statuses);
        self
    }

    pub fn with_header_names(mut self, names: Arc<HeaderNames>) -> Self {
        self.header_names = names;
        self
    }

    /// Replaces the string-leaf hook used when decoding the body.
    pub fn with_hook(mut self, hook: Arc<dyn ScalarHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn status(&self) -> u16 {
        self.raw.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.raw.reason.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.raw.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.raw.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.raw.header(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.raw.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw.body)
    }

    pub fn safe_statuses(&self) -> &BTreeSet<u16> {
        &self.safe_statuses
    }

    pub fn into_raw(self) -> HttpResponse {
        self.raw
    }

    pub fn is_ok(&self) -> bool {
        is_ok_status(self.raw.status, &self.safe_statuses)
    }

    /// No-op for acceptable statuses; otherwise a [`RequestFailure`] carrying
    /// the status, the safe set and any error fields found in the body.
    pub fn error_for_status(&self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        Err(ApiError::Request(RequestFailure {
            status: self.raw.status,
            reason: self.raw.reason.clone(),
            url: self.raw.url.clone(),
            safe_statuses: self.safe_statuses.iter().copied().collect(),
            detail: ErrorDetail::from_body(&self.raw.body),
        }))
    }

    /// The content type announces JSON.
    pub fn has_json(&self) -> bool {
        self.header(&self.header_names.content_type)
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("application/json") || ct.contains("+json")
            })
            .unwrap_or(false)
    }

    /// Raw JSON deserialization, bypassing the typed decoder and the cache.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.raw.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Decoded payload. `None` when the response carries no JSON: a non-JSON
    /// content type, an empty body, or a body that fails to parse.
    pub fn data(&self) -> Option<&Document> {
        self.decoded.get_or_init(|| self.decode()).as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut Document> {
        let _ = self.data();
        self.decoded.get_mut().and_then(Option::as_mut)
    }

    pub fn into_data(mut self) -> Option<Document> {
        let _ = self.data();
        self.decoded.take().flatten()
    }

    fn decode(&self) -> Option<Document> {
        if !self.has_json() || self.raw.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice::<serde_json::Value>(&self.raw.body) {
            Ok(json) => Some(Document::new(crate::value::Value::from_json_with(
                json,
                self.hook.as_ref(),
            ))),
            Err(e) => {
                warn!(status = self.raw.status, url = %self.raw.url, error = %e, "JSON response body did not parse");
                None
            }
        }
    }

    /// Digest announced for a file body, from the first digest header present.
    pub fn digest_data(&self) -> Option<Digest> {
        self.header_names
            .digest
            .iter()
            .find_map(|name| self.header(name))
            .and_then(Digest::parse)
    }

    /// Suggested filename from the content-disposition header. `filename*`
    /// (RFC 5987) wins over `filename`.
    pub fn filename(&self) -> Option<String> {
        let header = self.header(&self.header_names.content_disposition)?;
        let params = disposition_params(header);
        let extended = params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("filename*"))
            .and_then(|(_, v)| decode_extended(v));
        extended
            .or_else(|| {
                params
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("filename"))
                    .map(|(_, v)| v.clone())
            })
            .filter(|name| !name.is_empty())
    }

    /// The content-disposition marks the body as an attachment or inline file.
    pub fn has_file_stream(&self) -> bool {
        self.header(&self.header_names.content_disposition)
            .map(|v| {
                let v = v.to_ascii_lowercase();
                v.contains("attachment") || v.contains("inline")
            })
            .unwrap_or(false)
    }

    /// Pagination continuation flag.
    pub fn has_more(&self) -> bool {
        self.has_more_header().unwrap_or(false)
    }

    /// The continuation header's value, or `None` when absent.
    pub fn has_more_header(&self) -> Option<bool> {
        self.header(&self.header_names.has_more).map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            )
        })
    }
}

impl fmt::Debug for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseEnvelope")
            .field("status", &self.raw.status)
            .field("url", &self.raw.url)
            .field("safe_statuses", &self.safe_statuses)
            .field("decoded", &self.decoded.get().is_some())
            .finish()
    }
}

/// Below 400, or explicitly allowed by the caller.
pub fn is_ok_status(status: u16, safe_statuses: &BTreeSet<u16>) -> bool {
    status < 400 || safe_statuses.contains(&status)
}

/// `name=value` parameters of a content-disposition value; quoted values are
/// unquoted and `;` inside quotes does not split.
fn disposition_params(header: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in header.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .skip(1)
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// `charset'lang'percent-encoded` to text.
fn decode_extended(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let (_charset, _lang, encoded) = (pieces.next()?, pieces.next()?, pieces.next()?);
    Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned())
}
