//! In-memory stand-in for the TASS school-management API.
//!
//! # Design
//! One company (`10`) with a seeded `students` collection. Every company
//! route requires the bearer token handed out by `POST /users`. Collection
//! reads honour `$top`/`$skip` and report continuation through `X-Has-More`.
//! Errors use the API's JSON error body (`title`, `detail`, `errors`,
//! `message`).

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info, warn};

pub const CLIENT_KEY: &str = "mock-key";
pub const CLIENT_SECRET: &str = "mock-secret";
pub const COMPANY_CODE: &str = "10";
pub const TOKEN: &str = "mock-token";
pub const TOKEN_EXPIRY: &str = "2999-12-31T23:59:59Z";
pub const HAS_MORE_HEADER: &str = "x-has-more";

#[derive(Debug, Default)]
pub struct Db {
    /// Student records in insertion order.
    pub students: Vec<Value>,
    /// Photo bytes keyed by student code.
    pub photos: HashMap<String, Vec<u8>>,
}

pub type SharedDb = Arc<RwLock<Db>>;

/// Seeded records: five students, one with a photo.
pub fn seed() -> Db {
    let students = (1..=5)
        .map(|n| {
            json!({
                "stud_code": format!("S{n:03}"),
                "surname": format!("Student{n}"),
                "given_name": "Test",
                "year_grp": 7 + (n % 3),
                "dob": format!("2012-0{n}-1{n}"),
                "update_on": "2026-02-11T10:45:12.557000",
                "address": {"street": format!("{n} Main St"), "town": "Springfield"},
            })
        })
        .collect();
    let mut photos = HashMap::new();
    photos.insert("S001".to_string(), b"\xff\xd8\xff\xe0mock-jpeg".to_vec());
    Db { students, photos }
}

pub fn app() -> Router {
    app_with(seed())
}

pub fn app_with(db: Db) -> Router {
    let db: SharedDb = Arc::new(RwLock::new(db));
    Router::new()
        .route("/users", post(authenticate))
        .route("/{cmpy}/students", get(list_students).post(create_student))
        .route(
            "/{cmpy}/students/{code}",
            get(get_student).patch(patch_student).delete(delete_student),
        )
        .route(
            "/{cmpy}/students/{code}/photo",
            get(student_photo).post(upload_photo),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Response in the API's error body shape.
pub fn error_body(status: StatusCode, detail: impl Into<String>) -> Response {
    let title = status.canonical_reason().unwrap_or("Error");
    let body = json!({
        "title": title,
        "detail": detail.into(),
        "errors": null,
        "message": format!("{} {title}", status.as_u16()),
    });
    (status, Json(body)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    client_key: String,
    client_secret: String,
}

async fn authenticate(body: Bytes) -> Response {
    let Ok(creds) = serde_json::from_slice::<Credentials>(&body) else {
        return error_body(StatusCode::BAD_REQUEST, "expected clientKey and clientSecret");
    };
    if creds.client_key != CLIENT_KEY || creds.client_secret != CLIENT_SECRET {
        warn!(client_key = %creds.client_key, "rejected credentials");
        return error_body(StatusCode::UNAUTHORIZED, "invalid client credentials");
    }
    info!(client_key = %creds.client_key, "issued token");
    Json(json!({
        "token": TOKEN,
        "token_expiry_date": TOKEN_EXPIRY,
        "allowed_companies": [{"cmpy_code": COMPANY_CODE, "cmpy_name": "Mock College"}],
    }))
    .into_response()
}

/// Bearer token and company checks shared by every company route.
#[allow(clippy::result_large_err)]
fn authorize(headers: &HeaderMap, cmpy: &str) -> Result<(), Response> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer != Some(TOKEN) {
        return Err(error_body(StatusCode::UNAUTHORIZED, "missing or invalid bearer token"));
    }
    if cmpy != COMPANY_CODE {
        return Err(error_body(StatusCode::FORBIDDEN, format!("company {cmpy} is not allowed")));
    }
    Ok(())
}

fn stud_code(record: &Value) -> Option<&str> {
    record.get("stud_code").and_then(Value::as_str)
}

fn not_found(code: &str) -> Response {
    error_body(StatusCode::NOT_FOUND, format!("no student {code}"))
}

async fn list_students(
    State(db): State<SharedDb>,
    Path(cmpy): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let parse = |name: &str, default: usize| -> Result<usize, Response> {
        match params.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| error_body(StatusCode::BAD_REQUEST, format!("{name} must be a number"))),
        }
    };
    let (top, skip) = match (parse("$top", 100), parse("$skip", 0)) {
        (Ok(top), Ok(skip)) => (top, skip),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    let db = db.read().await;
    let page: Vec<Value> = db.students.iter().skip(skip).take(top).cloned().collect();
    let has_more = skip.saturating_add(top) < db.students.len();
    debug!(top, skip, returned = page.len(), has_more, "listing students");

    let mut resp = Json(page).into_response();
    resp.headers_mut().insert(
        HAS_MORE_HEADER,
        HeaderValue::from_static(if has_more { "true" } else { "false" }),
    );
    resp
}

async fn get_student(
    State(db): State<SharedDb>,
    Path((cmpy, code)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let db = db.read().await;
    match db.students.iter().find(|s| stud_code(s) == Some(code.as_str())) {
        Some(record) => Json(record.clone()).into_response(),
        None => not_found(&code),
    }
}

async fn create_student(
    State(db): State<SharedDb>,
    Path(cmpy): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let record: Value = match serde_json::from_slice(&body) {
        Ok(v @ Value::Object(_)) => v,
        _ => return error_body(StatusCode::BAD_REQUEST, "body must be a JSON object"),
    };
    let Some(code) = stud_code(&record).map(str::to_string) else {
        return error_body(StatusCode::UNPROCESSABLE_ENTITY, "stud_code is required");
    };

    let mut db = db.write().await;
    if db.students.iter().any(|s| stud_code(s) == Some(code.as_str())) {
        return error_body(StatusCode::CONFLICT, format!("student {code} already exists"));
    }
    info!(stud_code = %code, "created student");
    db.students.push(record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Test { path: String, value: Value },
}

async fn patch_student(
    State(db): State<SharedDb>,
    Path((cmpy, code)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != "application/json-patch+json" {
        return error_body(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected application/json-patch+json",
        );
    }
    let ops: Vec<PatchOperation> = match serde_json::from_slice(&body) {
        Ok(ops) => ops,
        Err(e) => return error_body(StatusCode::BAD_REQUEST, format!("invalid patch: {e}")),
    };

    let mut db = db.write().await;
    let Some(record) = db
        .students
        .iter_mut()
        .find(|s| stud_code(s) == Some(code.as_str()))
    else {
        return not_found(&code);
    };

    // Applied to a copy so a failing op leaves the record untouched.
    let mut updated = record.clone();
    if let Err(detail) = apply_patch(&mut updated, &ops) {
        return error_body(StatusCode::CONFLICT, detail);
    }
    *record = updated.clone();
    debug!(stud_code = %code, ops = ops.len(), "patched student");
    Json(updated).into_response()
}

async fn delete_student(
    State(db): State<SharedDb>,
    Path((cmpy, code)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let mut db = db.write().await;
    let before = db.students.len();
    db.students.retain(|s| stud_code(s) != Some(code.as_str()));
    if db.students.len() == before {
        return not_found(&code);
    }
    db.photos.remove(&code);
    StatusCode::NO_CONTENT.into_response()
}

async fn student_photo(
    State(db): State<SharedDb>,
    Path((cmpy, code)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let db = db.read().await;
    let Some(bytes) = db.photos.get(&code) else {
        return error_body(StatusCode::NOT_FOUND, format!("no photo for student {code}"));
    };
    (
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{code}.jpg\""),
            ),
            (header::HeaderName::from_static("digest"), sha256_digest(bytes)),
        ],
        bytes.clone(),
    )
        .into_response()
}

/// Replaces a student's photo from a `file_name` + `file_content` form.
async fn upload_photo(
    State(db): State<SharedDb>,
    Path((cmpy, code)): Path<(String, String)>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(resp) = authorize(&headers, &cmpy) {
        return resp;
    }
    let mut file_name = None;
    let mut content = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_body(StatusCode::BAD_REQUEST, e.body_text()),
        };
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return error_body(StatusCode::BAD_REQUEST, e.body_text()),
        };
        match name.as_str() {
            "file_name" => file_name = Some(String::from_utf8_lossy(&bytes).into_owned()),
            "file_content" => content = Some((content_type, bytes)),
            other => debug!(field = other, "ignoring form field"),
        }
    }
    let (Some(file_name), Some((content_type, bytes))) = (file_name, content) else {
        return error_body(StatusCode::BAD_REQUEST, "expected file_name and file_content parts");
    };

    let mut db = db.write().await;
    if !db.students.iter().any(|s| stud_code(s) == Some(code.as_str())) {
        return not_found(&code);
    }
    info!(code = %code, file_name = %file_name, bytes = bytes.len(), "stored photo");
    db.photos.insert(code, bytes.to_vec());
    (
        StatusCode::CREATED,
        Json(json!({
            "file_name": file_name,
            "content_type": content_type,
            "size": bytes.len(),
        })),
    )
        .into_response()
}

/// `SHA-256=<base64>` digest header value.
pub fn sha256_digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    format!(
        "SHA-256={}",
        base64::engine::general_purpose::STANDARD.encode(hash)
    )
}

/// Applies RFC 6902 operations in order; the first failing op aborts.
pub fn apply_patch(doc: &mut Value, ops: &[PatchOperation]) -> Result<(), String> {
    for op in ops {
        match op {
            PatchOperation::Test { path, value } => {
                if doc.pointer(path) != Some(value) {
                    return Err(format!("test failed at {path}"));
                }
            }
            PatchOperation::Add { path, value } => insert(doc, path, value.clone(), false)?,
            PatchOperation::Replace { path, value } => insert(doc, path, value.clone(), true)?,
            PatchOperation::Remove { path } => {
                let (parent, token) = split_pointer(path)?;
                let removed = match doc.pointer_mut(parent) {
                    Some(Value::Object(map)) => map.remove(&token).is_some(),
                    Some(Value::Array(items)) => match token.parse::<usize>() {
                        Ok(i) if i < items.len() => {
                            items.remove(i);
                            true
                        }
                        _ => false,
                    },
                    _ => false,
                };
                if !removed {
                    return Err(format!("nothing to remove at {path}"));
                }
            }
        }
    }
    Ok(())
}

fn insert(doc: &mut Value, path: &str, value: Value, must_exist: bool) -> Result<(), String> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, token) = split_pointer(path)?;
    match doc.pointer_mut(parent) {
        Some(Value::Object(map)) => {
            if must_exist && !map.contains_key(&token) {
                return Err(format!("nothing to replace at {path}"));
            }
            map.insert(token, value);
            Ok(())
        }
        Some(Value::Array(items)) => {
            let index = if token == "-" {
                items.len()
            } else {
                token
                    .parse::<usize>()
                    .map_err(|_| format!("bad array index in {path}"))?
            };
            match (must_exist, index.cmp(&items.len())) {
                (true, std::cmp::Ordering::Less) => items[index] = value,
                (false, std::cmp::Ordering::Less | std::cmp::Ordering::Equal) => items.insert(index, value),
                _ => return Err(format!("index out of range in {path}")),
            }
            Ok(())
        }
        _ => Err(format!("no parent container for {path}")),
    }
}

fn split_pointer(path: &str) -> Result<(&str, String), String> {
    let (parent, token) = path
        .rsplit_once('/')
        .ok_or_else(|| format!("invalid pointer {path:?}"))?;
    Ok((parent, token.replace("~1", "/").replace("~0", "~")))
}
