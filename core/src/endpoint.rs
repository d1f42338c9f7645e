//! Named API resource bound to a session.
//!
//! `Endpoint` is the convenience layer over [`Session::request`]: one method
//! per verb, payloads taken as [`Document`]s, multipart file uploads, and
//! file downloads written to disk with digest verification.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256, Sha512};
use tracing::{debug, error, warn};

use crate::document::Document;
use crate::error::{ApiError, Result};
use crate::http::HttpMethod;
use crate::pagination::PaginatedResult;
use crate::response::{Digest, ResponseEnvelope};
use crate::session::{PageOptions, RequestBody, RequestOptions, Session, SessionPager};
use crate::transport::Transport;
use crate::upload::FileUpload;

/// Where and how [`Endpoint::download`] writes a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Overrides the session's attachment directory. Must already exist.
    pub dest: Option<PathBuf>,
    /// Overrides the server-suggested filename.
    pub file_name: Option<String>,
    pub verify_digest: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            dest: None,
            file_name: None,
            verify_digest: true,
        }
    }
}

#[derive(Debug)]
pub struct Download {
    pub response: ResponseEnvelope,
    /// Written file; `None` when the response carried no file stream.
    pub path: Option<PathBuf>,
}

pub struct Endpoint<'s, T> {
    session: &'s Session<T>,
    name: String,
}

impl<'s, T: Transport> Endpoint<'s, T> {
    pub fn new(session: &'s Session<T>, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, segments: &[&str], options: &RequestOptions) -> Result<ResponseEnvelope> {
        self.session
            .request(HttpMethod::Get, &self.name, segments, options, None)
    }

    pub fn get_all(&self, segments: &[&str], options: PageOptions) -> PaginatedResult<SessionPager<'s, T>> {
        self.session.paginate(&self.name, segments, options)
    }

    /// POSTs `payload`. When `required` is given, every listed top-level key
    /// must be present or the call fails before any I/O.
    pub fn create(
        &self,
        segments: &[&str],
        payload: &Document,
        required: Option<&[&str]>,
        options: &RequestOptions,
    ) -> Result<ResponseEnvelope> {
        if let Some(keys) = required {
            require_keys(payload, keys)?;
        }
        let body = RequestBody::Json(payload.value().clone());
        self.session
            .request(HttpMethod::Post, &self.name, segments, options, Some(&body))
    }

    /// PUTs the whole of `payload`.
    pub fn update(&self, segments: &[&str], payload: &Document, options: &RequestOptions) -> Result<ResponseEnvelope> {
        let body = RequestBody::Json(payload.value().clone());
        self.session
            .request(HttpMethod::Put, &self.name, segments, options, Some(&body))
    }

    /// PATCHes the changes recorded in `doc` since its baseline.
    pub fn patch(&self, segments: &[&str], doc: &Document, options: &RequestOptions) -> Result<ResponseEnvelope> {
        let ops = doc.compute_patch();
        debug!(endpoint = %self.name, ops = ops.len(), "sending patch");
        let body = RequestBody::Patch(ops);
        self.session
            .request(HttpMethod::Patch, &self.name, segments, options, Some(&body))
    }

    pub fn delete(&self, segments: &[&str], options: &RequestOptions) -> Result<ResponseEnvelope> {
        self.session
            .request(HttpMethod::Delete, &self.name, segments, options, None)
    }

    /// POSTs the file at `path` as a multipart form with `file_name` and
    /// `file_content` parts.
    pub fn upload(&self, segments: &[&str], path: &Path, options: &RequestOptions) -> Result<ResponseEnvelope> {
        let upload = FileUpload::new(path);
        let form = upload.to_form()?;
        debug!(
            endpoint = %self.name,
            file = %path.display(),
            mime = upload.mime_type(),
            "uploading file"
        );
        let body = RequestBody::Multipart(form);
        self.session
            .request(HttpMethod::Post, &self.name, segments, options, Some(&body))
    }

    /// GETs a file and writes it under the destination directory. Every
    /// status is accepted; a response without a file stream yields no path.
    pub fn download(
        &self,
        segments: &[&str],
        options: &RequestOptions,
        download: &DownloadOptions,
    ) -> Result<Download> {
        let options = options.clone().safe_statuses(0..1000);
        let response = self.get(segments, &options)?;

        if !response.has_file_stream() {
            error!(url = %response.url(), status = response.status(), "no file stream in response");
            return Ok(Download { response, path: None });
        }

        let name = download
            .file_name
            .clone()
            .or_else(|| response.filename())
            .and_then(|n| Path::new(&n).file_name().map(|f| f.to_os_string()))
            .ok_or_else(|| ApiError::InvalidArgument(format!("no filename for download from {}", response.url())))?;
        let dest = download
            .dest
            .clone()
            .unwrap_or_else(|| self.session.config().attachment_dest.clone());
        let path = dest.join(name);
        fs::write(&path, response.body())?;
        debug!(path = %path.display(), bytes = response.body().len(), "wrote download");

        if download.verify_digest {
            match response.digest_data() {
                Some(digest) => verify_file_digest(&path, &digest)?,
                None => warn!(url = %response.url(), "download has no digest to verify"),
            }
        }
        Ok(Download {
            response,
            path: Some(path),
        })
    }
}

/// Checks the file at `path` against an announced digest. SHA-256 and
/// SHA-512 are supported.
pub fn verify_file_digest(path: &Path, digest: &Digest) -> Result<()> {
    let algorithm = digest.algorithm.to_ascii_lowercase().replace('-', "");
    let mut file = File::open(path)?;
    let actual = match algorithm.as_str() {
        "sha256" => {
            let mut hasher = Sha256::new();
            io::copy(&mut file, &mut hasher)?;
            hex::encode(hasher.finalize())
        }
        "sha512" => {
            let mut hasher = Sha512::new();
            io::copy(&mut file, &mut hasher)?;
            hex::encode(hasher.finalize())
        }
        _ => return Err(ApiError::UnsupportedDigest(digest.algorithm.clone())),
    };
    let expected = digest
        .hex()
        .unwrap_or_else(|| digest.value.to_ascii_lowercase());
    if actual != expected {
        return Err(ApiError::DigestMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn require_keys(payload: &Document, keys: &[&str]) -> Result<()> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| !payload.contains_key([*k]))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    let plural = if missing.len() > 1 { "s" } else { "" };
    Err(ApiError::InvalidArgument(format!(
        "payload is missing required attribute{plural}: {}",
        oxford_join(&missing, "and")
    )))
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`.
pub fn oxford_join(items: &[&str], conjunction: &str) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} {conjunction} {b}"),
        [rest @ .., last] => format!("{}, {conjunction} {last}", rest.join(", ")),
    }
}
