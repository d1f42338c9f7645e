//! Client core for the TASS school-management REST API.
//!
//! # Overview
//! Responses are wrapped in a [`ResponseEnvelope`] that classifies the
//! status against a per-call safe set and lazily decodes the JSON body into
//! a [`Document`]. String leaves that look like ISO-8601 dates or timestamps
//! become typed [`ParsedDatetime`] values on the way in.
//!
//! A `Document` remembers the value it was decoded with, so after local edits
//! [`Document::compute_patch`] yields the RFC 6902 operations that bring the
//! server copy up to date.
//!
//! Collection endpoints are read through [`PaginatedResult`], a pull-driven
//! pager that caches every fetched page.
//!
//! # Design
//! - Requests and responses are plain data ([`HttpRequest`], [`HttpResponse`]);
//!   a [`Transport`] executes them. [`UreqTransport`] is the blocking network
//!   implementation, and any `Fn(&HttpRequest) -> Result<HttpResponse>`
//!   closure works as a scripted one in tests.
//! - [`Session`] owns authentication and URL construction; [`Endpoint`] adds
//!   per-verb helpers, multipart uploads and file downloads on top.
//! - Header names and pagination rules are injected ([`HeaderNames`],
//!   [`PagingRules`]) with defaults matching the TASS API.

pub mod config;
pub mod datetime;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod pagination;
pub mod patch;
pub mod response;
pub mod session;
pub mod transport;
pub mod upload;
pub mod value;

pub use config::ServerConfig;
pub use datetime::{decode_scalar, DatetimeHook, NoopHook, ParsedDatetime, ScalarHook, DEFAULT_DATETIME_FIELDS};
pub use document::{Document, KeyPath};
pub use endpoint::{Download, DownloadOptions, Endpoint};
pub use error::{ApiError, ErrorDetail, RequestFailure, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use pagination::{MoreIndicator, Page, PageFetcher, PageRequest, PaginatedResult, PagingRules, RecordSource};
pub use patch::PatchOp;
pub use response::{Digest, HeaderNames, ResponseEnvelope};
pub use session::{AllowedCompany, PageOptions, RequestBody, RequestOptions, Session, TokenData};
pub use transport::{Transport, UreqTransport};
pub use upload::{FileUpload, FormPart, MultipartForm};
pub use value::{Map, Value};
