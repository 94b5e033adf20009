//! ODP GraphQL client for audience segment qualification.
//!
//! Example request for a single segment:
//!
//! ```text
//! curl -H 'Content-Type: application/json' -H 'x-api-key: <key>' -X POST \
//!   -d '{"query":"query {customer(vuid: \"d66a...\") {audiences(subset:[\"has_email\"]) {edges {node {name is_ready state}}}}}"}' \
//!   https://api.zaius.com/v3/graphql
//! ```

pub mod audience;
pub mod errors;
pub mod json;
pub mod query;

pub use errors::FetchError;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::utils::log_if_slow;
use audience::{decode_edges, qualified_segments};
use json::{extract_path, parse_json_with_context};
use query::{build_filter, build_query_document};

/// Default ODP GraphQL endpoint.
pub const DEFAULT_API_HOST: &str = "https://api.zaius.com/v3/graphql";

/// The only identifier kind the `customer` query currently accepts.
pub const SUPPORTED_USER_KEY: &str = "vuid";

/// Header carrying the ODP public API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Location of the audience list in the response document.
const AUDIENCES_PATH: &str = "data.customer.audiences.edges";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SLOW_FETCH_THRESHOLD: Duration = Duration::from_secs(2);

/// Everything needed to ask ODP which segments a user qualifies for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub api_key: String,
    pub api_host: String,
    pub user_key: String,
    pub user_value: String,
    /// `None` checks every segment; `Some(vec![])` checks none.
    pub segments_to_check: Option<Vec<String>>,
}

impl FetchRequest {
    /// A request for all segments of a `vuid` identity.
    pub fn new(
        api_key: impl Into<String>,
        api_host: impl Into<String>,
        user_value: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_host: api_host.into(),
            user_key: SUPPORTED_USER_KEY.to_string(),
            user_value: user_value.into(),
            segments_to_check: None,
        }
    }

    pub fn with_user_key(mut self, user_key: impl Into<String>) -> Self {
        self.user_key = user_key.into();
        self
    }

    pub fn with_segments(mut self, segments: Option<Vec<String>>) -> Self {
        self.segments_to_check = segments;
        self
    }
}

/// Source of qualified segment lists for a user identity.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<String>, FetchError>;
}

/// Fetches segments from the ODP GraphQL API.
///
/// Each fetch builds its own HTTP client with connection pooling disabled and
/// drops it before returning, so no connection outlives the call.
#[derive(Debug, Clone)]
pub struct OdpClient {
    timeout: Duration,
}

impl Default for OdpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OdpClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn session(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| FetchError::TransportFailed(e.into()))
    }
}

#[async_trait]
impl SegmentFetcher for OdpClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<String>, FetchError> {
        if request.user_key != SUPPORTED_USER_KEY {
            return Err(FetchError::UnsupportedUserKey(request.user_key.clone()));
        }

        let url = Url::parse(&request.api_host).map_err(|e| {
            FetchError::InvalidQuery(format!("invalid api host `{}`: {e}", request.api_host))
        })?;

        let filter = build_filter(request.segments_to_check.as_deref());
        let body = build_query_document(&request.user_key, &request.user_value, &filter).to_body()?;

        let session = self.session()?;
        let started = Instant::now();

        let resp = session
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &request.api_key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                debug!(error = %e, "ODP GraphQL download failed");
                FetchError::TransportFailed(e.into())
            })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| {
            debug!(error = %e, "ODP GraphQL response body read failed");
            FetchError::TransportFailed(e.into())
        })?;
        log_if_slow(started, SLOW_FETCH_THRESHOLD, "ODP segments fetch");

        // the body decides the outcome, whatever the status
        if !status.is_success() {
            debug!(%status, len = bytes.len(), "ODP GraphQL returned non-success status");
        }

        if bytes.is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        let segments = parse_segments(&bytes)?;
        debug!(
            user = %request.user_value,
            qualified = segments.len(),
            "ODP segments fetched"
        );
        Ok(segments)
    }
}

/// Extract qualified segment names from a raw GraphQL response body.
pub fn parse_segments(body: &[u8]) -> Result<Vec<String>, FetchError> {
    let text = std::str::from_utf8(body).map_err(|e| {
        debug!(body = %String::from_utf8_lossy(body), "ODP GraphQL body is not UTF-8");
        FetchError::DecodeFailed(anyhow::Error::new(e).context("response body is not valid UTF-8"))
    })?;

    let json: Value = parse_json_with_context(text).map_err(|e| {
        debug!(body = %text, "ODP GraphQL decode failed");
        FetchError::DecodeFailed(e)
    })?;

    let edges = extract_path(&json, AUDIENCES_PATH)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            debug!(body = %text, "ODP GraphQL response missing audiences");
            FetchError::DecodeFailed(anyhow!("missing `{AUDIENCES_PATH}` in response"))
        })?;

    Ok(qualified_segments(decode_edges(edges)))
}
