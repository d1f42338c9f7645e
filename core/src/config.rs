//! Connection settings for one school-management server.
//!
//! Settings deserialize from any serde source (a config file section, JSON)
//! with optional fields defaulted, or load from `TASS_*` environment
//! variables.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ApiError, Result};

pub const DEFAULT_TOKEN_EXPIRE_OFFSET_SECS: i64 = 60;
pub const DEFAULT_AUTH_ENDPOINT: &str = "users";

#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub client_key: String,
    pub client_secret: String,
    pub company_code: String,
    /// Seconds before the reported expiry at which a token counts as expired.
    #[serde(default = "default_token_expire_offset")]
    pub token_expire_offset_secs: i64,
    /// Directory downloads are written to.
    #[serde(default = "default_attachment_dest")]
    pub attachment_dest: PathBuf,
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_token_expire_offset() -> i64 {
    DEFAULT_TOKEN_EXPIRE_OFFSET_SECS
}

fn default_attachment_dest() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_auth_endpoint() -> String {
    DEFAULT_AUTH_ENDPOINT.to_string()
}

fn default_user_agent() -> String {
    format!("tass-core/{}", env!("CARGO_PKG_VERSION"))
}

impl ServerConfig {
    /// Required settings only; everything else takes its default.
    pub fn new(
        base_url: impl Into<String>,
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
        company_code: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_key: client_key.into(),
            client_secret: client_secret.into(),
            company_code: company_code.into(),
            token_expire_offset_secs: default_token_expire_offset(),
            attachment_dest: default_attachment_dest(),
            auth_endpoint: default_auth_endpoint(),
            timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }

    /// Reads `TASS_BASE_URL`, `TASS_CLIENT_KEY`, `TASS_CLIENT_SECRET` and
    /// `TASS_COMPANY_CODE`, plus the optional `TASS_TOKEN_EXPIRE_OFFSET`,
    /// `TASS_ATTACHMENT_DEST` and `TASS_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// [`ServerConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ApiError::InvalidArgument(format!("{name} is not set")))
        };
        let mut config = Self::new(
            required("TASS_BASE_URL")?,
            required("TASS_CLIENT_KEY")?,
            required("TASS_CLIENT_SECRET")?,
            required("TASS_COMPANY_CODE")?,
        );

        if let Some(raw) = lookup("TASS_TOKEN_EXPIRE_OFFSET") {
            config.token_expire_offset_secs = parse_number("TASS_TOKEN_EXPIRE_OFFSET", &raw)?;
        }
        if let Some(dest) = lookup("TASS_ATTACHMENT_DEST") {
            config.attachment_dest = PathBuf::from(dest);
        }
        if let Some(raw) = lookup("TASS_TIMEOUT_SECS") {
            config.timeout_secs = Some(parse_number("TASS_TIMEOUT_SECS", &raw)?);
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Base URL without trailing slashes.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::InvalidArgument(format!("{name} is not a number: {raw:?}")))
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("client_key", &self.client_key)
            .field("client_secret", &"<redacted>")
            .field("company_code", &self.company_code)
            .field("token_expire_offset_secs", &self.token_expire_offset_secs)
            .field("attachment_dest", &self.attachment_dest)
            .field("auth_endpoint", &self.auth_endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
