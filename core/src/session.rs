//! Authenticated session against one school-management server.
//!
//! # Design
//! Request construction is pure: [`Session::build_request`] turns an
//! endpoint, path segments, options and a body into an `HttpRequest` using
//! whatever token is currently held. [`Session::request`] is the I/O half: it
//! authenticates when the token is missing or about to expire, executes the
//! request through the session's `Transport`, and wraps the result in a
//! `ResponseEnvelope` that has already passed `error_for_status`.
//!
//! Token state sits behind a `Mutex` so a session can be shared by reference
//! across pagers and endpoints while still refreshing its token.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::datetime::{DatetimeHook, ParsedDatetime, ScalarHook};
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::pagination::{PageFetcher, PageRequest, PaginatedResult, PagingRules};
use crate::patch::PatchOp;
use crate::response::{HeaderNames, ResponseEnvelope};
use crate::transport::Transport;
use crate::upload::MultipartForm;
use crate::value::Value;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

const JSON: &str = "application/json";
const JSON_PATCH: &str = "application/json-patch+json";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A company the authenticated client may act for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllowedCompany {
    pub cmpy_code: String,
    #[serde(default)]
    pub cmpy_name: String,
}

/// Token state from a successful authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenData {
    pub token: String,
    pub expires_at: DateTime<FixedOffset>,
    pub allowed_companies: Vec<AllowedCompany>,
}

#[derive(Deserialize)]
struct TokenPayload {
    token: String,
    token_expiry_date: String,
    allowed_companies: Vec<AllowedCompany>,
}

impl TokenPayload {
    fn into_token_data(self) -> Option<TokenData> {
        if self.token.is_empty() {
            return None;
        }
        let parsed = ParsedDatetime::parse(&self.token_expiry_date)?;
        // Expiry without an offset is read as UTC.
        let expires_at = parsed
            .to_datetime()
            .unwrap_or_else(|| parsed.naive().and_utc().fixed_offset());
        Some(TokenData {
            token: self.token,
            expires_at,
            allowed_companies: self.allowed_companies,
        })
    }
}

/// Request body. JSON bodies are sent with the content type their method
/// calls for; a multipart form carries its own.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Patch(Vec<PatchOp>),
    Multipart(MultipartForm),
}

impl RequestBody {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            RequestBody::Json(value) => serde_json::to_vec(value),
            RequestBody::Patch(ops) => serde_json::to_vec(ops),
            RequestBody::Multipart(form) => return Ok(form.encode()),
        };
        bytes.map_err(|e| ApiError::Serialization(e.to_string()))
    }

    fn content_type(&self, method: HttpMethod) -> String {
        match (self, method) {
            (RequestBody::Multipart(form), _) => form.content_type(),
            (_, HttpMethod::Patch) => JSON_PATCH.to_string(),
            _ => JSON.to_string(),
        }
    }
}

/// Per-call request settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    /// Error statuses treated as acceptable for this call.
    pub safe_statuses: BTreeSet<u16>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn safe_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.safe_statuses.extend(statuses);
        self
    }

    /// Adds an OData `$filter`. An existing filter is combined as
    /// `(existing) and (new)`.
    pub fn filter(mut self, expr: &str) -> Self {
        let expr = expr.trim();
        match self.params.iter_mut().find(|(k, _)| k == "$filter") {
            Some((_, existing)) if !existing.trim().is_empty() => {
                *existing = format!("({}) and ({expr})", existing.trim());
            }
            Some((_, existing)) => *existing = expr.to_string(),
            None => self.params.push(("$filter".to_string(), expr.to_string())),
        }
        self
    }
}

/// Options for [`Session::paginate`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageOptions {
    pub request: RequestOptions,
    pub top: u32,
    pub start_offset: u64,
    /// Records to advance `$skip` by per page. Defaults to `top`.
    pub step: Option<u64>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            request: RequestOptions::default(),
            top: DEFAULT_PAGE_SIZE,
            start_offset: 0,
            step: None,
        }
    }
}

pub struct Session<T> {
    config: ServerConfig,
    transport: T,
    token: Mutex<Option<TokenData>>,
    header_names: Arc<HeaderNames>,
    rules: PagingRules,
    hook: Arc<dyn ScalarHook>,
}

impl<T: Transport> Session<T> {
    pub fn new(config: ServerConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            token: Mutex::new(None),
            header_names: Arc::new(HeaderNames::default()),
            rules: PagingRules::default(),
            hook: Arc::new(DatetimeHook::new()),
        }
    }

    pub fn with_header_names(mut self, names: HeaderNames) -> Self {
        self.header_names = Arc::new(names);
        self
    }

    pub fn with_paging_rules(mut self, rules: PagingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ScalarHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn token_state(&self) -> MutexGuard<'_, Option<TokenData>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exchanges the client key and secret for a bearer token.
    pub fn authenticate(&self) -> Result<()> {
        let url = join_url(self.config.base(), &[self.config.auth_endpoint.as_str()]);
        let payload = serde_json::json!({
            "clientKey": self.config.client_key,
            "clientSecret": self.config.client_secret,
        });
        let body = serde_json::to_vec(&payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: url.clone(),
            query: Vec::new(),
            headers: vec![
                ("Accept".to_string(), JSON.to_string()),
                ("User-Agent".to_string(), self.config.user_agent.clone()),
                ("Content-Type".to_string(), JSON.to_string()),
            ],
            body: Some(body),
        };

        let response = self.transport.execute(&request)?;
        let token = read_token(&response).ok_or_else(|| {
            error!(status = response.status, url = %url, "authentication failed");
            ApiError::Authentication(format!("{} from {url}", response.status))
        })?;

        info!(
            url = %url,
            expires_at = %token.expires_at,
            companies = token.allowed_companies.len(),
            "authenticated"
        );
        *self.token_state() = Some(token);
        Ok(())
    }

    /// A token is held and has not expired.
    pub fn is_authenticated(&self) -> bool {
        !self.token_expired()
    }

    /// No token is held, or it expires within the configured offset.
    pub fn token_expired(&self) -> bool {
        self.token_expired_at(Utc::now())
    }

    pub fn token_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.token_state().as_ref() {
            None => true,
            Some(token) => {
                let cutoff = token.expires_at - Duration::seconds(self.config.token_expire_offset_secs);
                now >= cutoff
            }
        }
    }

    pub fn token(&self) -> Option<TokenData> {
        self.token_state().clone()
    }

    /// Companies reported by the last authentication.
    pub fn allowed_companies(&self) -> Vec<AllowedCompany> {
        self.token_state()
            .as_ref()
            .map(|t| t.allowed_companies.clone())
            .unwrap_or_default()
    }

    /// The configured company code is among the allowed companies.
    pub fn has_valid_company_code(&self) -> bool {
        self.allowed_companies()
            .iter()
            .any(|c| c.cmpy_code == self.config.company_code)
    }

    /// Builds the request for `endpoint` without performing any I/O. The
    /// bearer header is included when a token is held.
    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        segments: &[&str],
        options: &RequestOptions,
        body: Option<&RequestBody>,
    ) -> Result<HttpRequest> {
        let url = join_record_url(
            self.config.base(),
            &[self.config.company_code.as_str(), endpoint],
            segments,
        );

        let mut headers = vec![
            ("Accept".to_string(), JSON.to_string()),
            ("User-Agent".to_string(), self.config.user_agent.clone()),
        ];
        if let Some(token) = self.token_state().as_ref() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token.token)));
        }
        if let Some(body) = body {
            headers.push(("Content-Type".to_string(), body.content_type(method)));
        }
        headers.extend(options.headers.iter().cloned());

        Ok(HttpRequest {
            method,
            url,
            query: options.params.clone(),
            headers,
            body: body.map(RequestBody::to_bytes).transpose()?,
        })
    }

    /// Performs one request, authenticating first when needed. Statuses in
    /// `options.safe_statuses` come back as successful envelopes.
    pub fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        segments: &[&str],
        options: &RequestOptions,
        body: Option<&RequestBody>,
    ) -> Result<ResponseEnvelope> {
        if self.token_expired() {
            self.authenticate()?;
        }
        let request = self.build_request(method, endpoint, segments, options, body)?;
        debug!(method = %request.method, url = %request.url, "dispatching request");

        let raw = self.transport.execute(&request)?;
        let envelope = self.envelope(raw, options.safe_statuses.iter().copied());
        envelope.error_for_status()?;
        Ok(envelope)
    }

    /// Wraps a raw response with this session's header names and hook.
    pub fn envelope(&self, raw: HttpResponse, safe: impl IntoIterator<Item = u16>) -> ResponseEnvelope {
        ResponseEnvelope::new(raw)
            .with_safe_statuses(safe)
            .with_header_names(self.header_names.clone())
            .with_hook(self.hook.clone())
    }

    /// Lazy paginated GET over `endpoint`, driven by `$top` and `$skip`.
    pub fn paginate<'s>(
        &'s self,
        endpoint: &str,
        segments: &[&str],
        options: PageOptions,
    ) -> PaginatedResult<SessionPager<'s, T>> {
        let fetcher = SessionPager {
            session: self,
            endpoint: endpoint.to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
            options: options.request,
        };
        let result = PaginatedResult::new(fetcher, options.top, options.start_offset, self.rules.clone());
        match options.step {
            Some(step) => result.with_step(step),
            None => result,
        }
    }
}

/// Page fetcher issuing `$top`/`$skip` GETs through a session.
pub struct SessionPager<'s, T> {
    session: &'s Session<T>,
    endpoint: String,
    segments: Vec<String>,
    options: RequestOptions,
}

impl<T: Transport> PageFetcher for SessionPager<'_, T> {
    fn fetch(&mut self, page: &PageRequest) -> Result<ResponseEnvelope> {
        let options = self
            .options
            .clone()
            .param("$top", page.top.to_string())
            .param("$skip", page.offset.to_string());
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        self.session
            .request(HttpMethod::Get, &self.endpoint, &segments, &options, None)
    }
}

fn read_token(response: &HttpResponse) -> Option<TokenData> {
    if response.status >= 400 {
        return None;
    }
    serde_json::from_slice::<TokenPayload>(&response.body)
        .ok()?
        .into_token_data()
}

/// Joins path parts onto `base`. Parts are trimmed of slashes and whitespace
/// and may contain `/`; each resulting segment is percent-encoded, `.` and
/// `..` are resolved, and empty segments are dropped.
pub fn join_url(base: &str, parts: &[&str]) -> String {
    join_record_url(base, parts, &[])
}

/// Like [`join_url`], with `records` appended after `parts`. Record
/// segments are caller data: a `.` or `..` among them is encoded as a
/// literal segment instead of being resolved.
pub fn join_record_url(base: &str, parts: &[&str], records: &[&str]) -> String {
    let (origin, base_path) = split_origin(base);
    let resolved = parts.iter().flat_map(|part| encode_part(part));
    let literal = records.iter().flat_map(|part| encode_part(part)).map(|seg| match seg.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => seg,
    });

    let mut segments: Vec<String> = Vec::new();
    for seg in base_path.split('/').map(str::to_string).chain(resolved).chain(literal) {
        match seg.as_str() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(seg),
        }
    }
    format!("{origin}/{}", segments.join("/"))
}

fn encode_part(part: &str) -> Vec<String> {
    part.trim_matches(|c: char| c == '/' || c.is_whitespace())
        .split('/')
        .map(|s| utf8_percent_encode(s.trim(), PATH_SEGMENT).to_string())
        .collect()
}

fn split_origin(url: &str) -> (&str, &str) {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => url.split_at(after_scheme + i),
        None => (url, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn config() -> ServerConfig {
        ServerConfig::new("https://tass.example.edu/api/", "key", "secret", "10")
    }

    fn auth_ok(expiry: &str) -> HttpResponse {
        HttpResponse::new(200).with_json(&json!({
            "token": "tok-1",
            "token_expiry_date": expiry,
            "allowed_companies": [{"cmpy_code": "10", "cmpy_name": "Example College"}],
        }))
    }

    #[test]
    fn join_url_normalises_segments() {
        assert_eq!(
            join_url("https://h/api/", &["10", "/students/", "S 1"]),
            "https://h/api/10/students/S%201"
        );
        assert_eq!(join_url("https://h/api", &["a//b", "./c", "../d"]), "https://h/api/a/b/d");
        assert_eq!(join_url("https://h", &["users"]), "https://h/users");
        assert_eq!(join_url("https://h/api/", &["", "x?y#z"]), "https://h/api/x%3Fy%23z");
    }

    #[test]
    fn record_segments_keep_dot_segments_literal() {
        assert_eq!(
            join_record_url("https://h/api", &["10", "students"], &["..", "S001/./photo"]),
            "https://h/api/10/students/%2E%2E/S001/%2E/photo"
        );
        assert_eq!(join_record_url("https://h/api/v1/../v2", &["10"], &[]), "https://h/api/v2/10");

        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            unreachable!("no I/O")
        });
        let req = session
            .build_request(HttpMethod::Delete, "students", &[".."], &RequestOptions::new(), None)
            .unwrap();
        assert_eq!(req.url, "https://tass.example.edu/api/10/students/%2E%2E");
    }

    #[test]
    fn filter_merges_with_existing_expression() {
        let opts = RequestOptions::new().filter("doe ge 2024-01-01");
        assert_eq!(opts.params, vec![("$filter".to_string(), "doe ge 2024-01-01".to_string())]);

        let opts = opts.filter("dol eq null");
        assert_eq!(
            opts.params[0].1,
            "(doe ge 2024-01-01) and (dol eq null)"
        );
    }

    #[test]
    fn build_request_without_token_has_no_authorization() {
        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            unreachable!("no I/O")
        });
        let req = session
            .build_request(HttpMethod::Get, "students", &["S001"], &RequestOptions::new(), None)
            .unwrap();
        assert_eq!(req.url, "https://tass.example.edu/api/10/students/S001");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert!(req.header("user-agent").unwrap().starts_with("tass-core/"));
        assert_eq!(req.header("authorization"), None);
        assert_eq!(req.header("content-type"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn content_type_follows_method() {
        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            unreachable!("no I/O")
        });
        let patch = RequestBody::Patch(vec![PatchOp::Remove { path: "/a".to_string() }]);
        let req = session
            .build_request(HttpMethod::Patch, "students", &["S001"], &RequestOptions::new(), Some(&patch))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json-patch+json"));
        assert_eq!(req.body.as_deref(), Some(br#"[{"op":"remove","path":"/a"}]"#.as_slice()));

        let json = RequestBody::Json(Value::from(json!({"stud_code": "S002"})));
        let req = session
            .build_request(HttpMethod::Post, "students", &[], &RequestOptions::new(), Some(&json))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));

        let form = MultipartForm::new(Vec::new());
        let multipart = RequestBody::Multipart(form.clone());
        let req = session
            .build_request(HttpMethod::Post, "students", &["S001", "photo"], &RequestOptions::new(), Some(&multipart))
            .unwrap();
        assert_eq!(req.header("content-type"), Some(form.content_type().as_str()));
        assert_eq!(req.body, Some(form.encode()));
    }

    #[test]
    fn request_authenticates_lazily_once() {
        let seen = RefCell::new(Vec::new());
        let transport = |req: &HttpRequest| -> Result<HttpResponse> {
            seen.borrow_mut().push(req.clone());
            if req.url.ends_with("/users") {
                return Ok(auth_ok("2999-01-01T00:00:00Z"));
            }
            Ok(HttpResponse::new(200).with_json(&json!({"stud_code": "S001"})))
        };
        let session = Session::new(config(), transport);

        let env = session
            .request(HttpMethod::Get, "students", &["S001"], &RequestOptions::new(), None)
            .unwrap();
        assert_eq!(env.data().unwrap().get("stud_code").unwrap().as_str(), Some("S001"));
        session
            .request(HttpMethod::Get, "students", &["S002"], &RequestOptions::new(), None)
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].url, "https://tass.example.edu/api/users");
        let auth_body: serde_json::Value = serde_json::from_slice(seen[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(auth_body, json!({"clientKey": "key", "clientSecret": "secret"}));
        assert_eq!(seen[1].header("authorization"), Some("Bearer tok-1"));
        assert!(session.is_authenticated());
        assert!(session.has_valid_company_code());
    }

    #[test]
    fn failed_authentication_names_status_and_url() {
        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            Ok(HttpResponse::new(401).with_json(&json!({"title": "Unauthorized"})))
        });
        let err = session.authenticate().unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("https://tass.example.edu/api/users"));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn malformed_token_payload_fails_authentication() {
        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            Ok(HttpResponse::new(200).with_json(&json!({"token": "t"})))
        });
        assert!(matches!(session.authenticate(), Err(ApiError::Authentication(_))));
    }

    #[test]
    fn token_expiry_honours_offset() {
        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            Ok(auth_ok("2030-06-01T12:00:00Z"))
        });
        assert!(session.token_expired());
        session.authenticate().unwrap();

        let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        assert!(!session.token_expired_at(at("2030-06-01T11:58:59Z")));
        assert!(session.token_expired_at(at("2030-06-01T11:59:00Z")));
        assert!(session.token_expired_at(at("2030-06-01T12:30:00Z")));
    }

    #[test]
    fn naive_expiry_is_read_as_utc() {
        let session = Session::new(config(), |_: &HttpRequest| -> Result<HttpResponse> {
            Ok(auth_ok("2030-06-01T12:00:00"))
        });
        session.authenticate().unwrap();
        assert_eq!(
            session.token().unwrap().expires_at,
            "2030-06-01T12:00:00+00:00".parse::<DateTime<FixedOffset>>().unwrap()
        );
    }

    #[test]
    fn safe_status_returns_envelope() {
        let session = Session::new(config(), |req: &HttpRequest| -> Result<HttpResponse> {
            if req.url.ends_with("/users") {
                return Ok(auth_ok("2999-01-01T00:00:00Z"));
            }
            Ok(HttpResponse::new(404).with_url(req.url.clone()))
        });
        let env = session
            .request(
                HttpMethod::Get,
                "students",
                &["S404"],
                &RequestOptions::new().safe_statuses([404]),
                None,
            )
            .unwrap();
        assert_eq!(env.status(), 404);

        let err = session
            .request(HttpMethod::Get, "students", &["S404"], &RequestOptions::new(), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn paginate_sends_top_and_skip() {
        let queries = RefCell::new(Vec::new());
        let transport = |req: &HttpRequest| -> Result<HttpResponse> {
            if req.url.ends_with("/users") {
                return Ok(auth_ok("2999-01-01T00:00:00Z"));
            }
            queries.borrow_mut().push((
                req.query_param("$top").map(str::to_string),
                req.query_param("$skip").map(str::to_string),
                req.query_param("$filter").map(str::to_string),
            ));
            let skip: usize = req.query_param("$skip").unwrap().parse().unwrap();
            let body = if skip < 4 { json!([{"n": skip}, {"n": skip + 1}]) } else { json!([]) };
            Ok(HttpResponse::new(200).with_json(&body))
        };
        let session = Session::new(config(), transport);
        let mut pages = session.paginate(
            "students",
            &[],
            PageOptions {
                request: RequestOptions::new().filter("year_grp eq 7"),
                top: 2,
                start_offset: 0,
                step: None,
            },
        );
        assert_eq!(pages.data().unwrap().len(), 4);
        drop(pages);

        let q = queries.borrow();
        let skips: Vec<_> = q.iter().map(|(_, s, _)| s.clone().unwrap()).collect();
        assert_eq!(skips, vec!["0", "2", "4"]);
        assert!(q.iter().all(|(t, _, f)| t.as_deref() == Some("2") && f.as_deref() == Some("year_grp eq 7")));
    }

    #[test]
    fn paginate_step_advances_skip() {
        let skips = RefCell::new(Vec::new());
        let transport = |req: &HttpRequest| -> Result<HttpResponse> {
            if req.url.ends_with("/users") {
                return Ok(auth_ok("2999-01-01T00:00:00Z"));
            }
            let skip: usize = req.query_param("$skip").unwrap().parse().unwrap();
            skips.borrow_mut().push(skip);
            let body = if skip < 6 { json!([{"n": skip}, {"n": skip + 1}]) } else { json!([]) };
            Ok(HttpResponse::new(200).with_json(&body))
        };
        let session = Session::new(config(), transport);
        let mut pages = session.paginate(
            "students",
            &[],
            PageOptions {
                top: 2,
                start_offset: 1,
                step: Some(3),
                ..PageOptions::default()
            },
        );
        assert_eq!(pages.data().unwrap().len(), 4);
        drop(pages);
        assert_eq!(*skips.borrow(), vec![1, 4, 7]);
    }
}
