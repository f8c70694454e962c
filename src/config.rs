// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub const ENV_WEBFLOW_API_TOKEN: &str = "WEBFLOW_API_TOKEN";
pub const ENV_COLLECTION_ID: &str = "COLLECTION_ID";
pub const ENV_WEBFLOW_API_BASE: &str = "WEBFLOW_API_BASE";
pub const ENV_WEBFLOW_PAGE_SIZE: &str = "WEBFLOW_PAGE_SIZE";
pub const ENV_WEBFLOW_CREATE_AS_DRAFT: &str = "WEBFLOW_CREATE_AS_DRAFT";
pub const ENV_CALENDAR_ENDPOINT: &str = "CALENDAR_ENDPOINT";
pub const ENV_CALENDAR_AUTH: &str = "CALENDAR_AUTH";
pub const ENV_SYNC_INTERVAL_SECS: &str = "SYNC_INTERVAL_SECS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_STATUS_ADDR: &str = "STATUS_ADDR";

pub const DEFAULT_WEBFLOW_API_BASE: &str = "https://api.webflow.com/v2";
pub const DEFAULT_CALENDAR_ENDPOINT: &str = "https://ir.oms.no/server/secure/components";
pub const DEFAULT_CALENDAR_AUTH: &str = "key=JORDA";

/// Webflow caps `limit` at 100 items per page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Runtime configuration, read once at startup and handed to every collaborator.
#[derive(Clone)]
pub struct SyncConfig {
    pub webflow_api_token: String,
    pub collection_id: String,
    pub webflow_base_url: String,
    pub page_size: u32,
    pub create_as_draft: bool,
    pub calendar_endpoint: String,
    pub calendar_auth: String,
    pub interval_secs: u64,
    pub http_timeout_secs: u64,
    pub status_addr: Option<SocketAddr>,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            value(name).ok_or_else(|| anyhow!("{name} must be set to a non-empty value"))
        };

        let webflow_api_token = required(ENV_WEBFLOW_API_TOKEN)?;
        let collection_id = required(ENV_COLLECTION_ID)?;

        let page_size: u32 = parse_or(value(ENV_WEBFLOW_PAGE_SIZE), ENV_WEBFLOW_PAGE_SIZE, 100)?;
        let interval_secs: u64 =
            parse_or(value(ENV_SYNC_INTERVAL_SECS), ENV_SYNC_INTERVAL_SECS, 3600)?;
        if interval_secs == 0 {
            bail!("{ENV_SYNC_INTERVAL_SECS} must be greater than zero");
        }
        let http_timeout_secs: u64 =
            parse_or(value(ENV_HTTP_TIMEOUT_SECS), ENV_HTTP_TIMEOUT_SECS, 10)?;

        let create_as_draft = match value(ENV_WEBFLOW_CREATE_AS_DRAFT) {
            None => false,
            Some(v) => parse_bool(&v).with_context(|| {
                format!("{ENV_WEBFLOW_CREATE_AS_DRAFT} must be a boolean, got {v:?}")
            })?,
        };

        let status_addr = value(ENV_STATUS_ADDR)
            .map(|v| {
                v.parse::<SocketAddr>()
                    .with_context(|| format!("{ENV_STATUS_ADDR} must be host:port, got {v:?}"))
            })
            .transpose()?;

        Ok(Self {
            webflow_api_token,
            collection_id,
            webflow_base_url: value(ENV_WEBFLOW_API_BASE)
                .unwrap_or_else(|| DEFAULT_WEBFLOW_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            create_as_draft,
            calendar_endpoint: value(ENV_CALENDAR_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_CALENDAR_ENDPOINT.to_string()),
            calendar_auth: value(ENV_CALENDAR_AUTH)
                .unwrap_or_else(|| DEFAULT_CALENDAR_AUTH.to_string()),
            interval_secs,
            http_timeout_secs,
            status_addr,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Shared HTTP client for both APIs.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(concat!("calendar-sync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()
            .context("building reqwest client")
    }
}

// Never print the token; its length is enough for diagnostics.
impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("webflow_api_token_len", &self.webflow_api_token.len())
            .field("collection_id", &self.collection_id)
            .field("webflow_base_url", &self.webflow_base_url)
            .field("page_size", &self.page_size)
            .field("create_as_draft", &self.create_as_draft)
            .field("calendar_endpoint", &self.calendar_endpoint)
            .field("interval_secs", &self.interval_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("status_addr", &self.status_addr)
            .finish()
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| anyhow!("{name} must be a valid number, got {v:?}")),
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("unrecognised boolean"),
    }
}
