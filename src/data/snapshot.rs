//! Glide snapshot client
//!
//! Fetching the Watermelon Index data takes two requests: a POST that returns a
//! `dataSnapshot` URL, then a GET of that URL whose body is base64-encoded JSON.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

/// Base URL of the Glide app serving the Watermelon Index
pub const DEFAULT_UPSTREAM_URL: &str = "https://watermelonindex.glide.page";

const SNAPSHOT_PATH: &str = "/api/container/playerFunctionCritical/getAppSnapshot";
const REQUEST_ID: &str = "1PKuPWeIywUcbOBGX5P9";
const APP_ID: &str = "57dVVMXNFIuBOYtiLIaP";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Errors that can occur when fetching the snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Transport failure or non-2xx status from either request
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The first response did not point at a snapshot
    #[error("dataSnapshot URL not found in response")]
    MissingSnapshotUrl,

    /// Snapshot body is not valid base64
    #[error("failed to decode snapshot body: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded snapshot is not valid JSON
    #[error("failed to parse snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnapshotError {
    /// True when the upstream could not be reached or answered with an error status
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SnapshotError::Request(e) if !e.is_decode())
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotPointer {
    #[serde(rename = "dataSnapshot")]
    data_snapshot: Option<String>,
}

/// Client for fetching the raw snapshot
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http_client: Client,
    /// Base URL for the Glide app (allows override for testing)
    base_url: String,
}

impl SnapshotClient {
    /// Creates a client with the given base URL and per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SnapshotError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetches and decodes the current snapshot
    ///
    /// # Returns
    /// * `Ok(Value)` - The decoded snapshot document
    /// * `Err(SnapshotError)` - If either request fails or the body cannot be decoded
    pub async fn fetch(&self) -> Result<Value, SnapshotError> {
        let snapshot_url = self.fetch_snapshot_url().await?;
        debug!(url = %snapshot_url, "fetching snapshot");

        let body = self
            .http_client
            .get(&snapshot_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(log_request_error)?
            .text()
            .await?;

        decode_snapshot(&body)
    }

    async fn fetch_snapshot_url(&self) -> Result<String, SnapshotError> {
        let url = format!("{}{}?reqid={}", self.base_url, SNAPSHOT_PATH, REQUEST_ID);
        debug!(url = %url, "requesting snapshot pointer");

        let response = self
            .http_client
            .post(&url)
            .header(header::ACCEPT, "*/*")
            .header(header::ORIGIN, self.base_url.as_str())
            .header(header::REFERER, format!("{}/dl/companies", self.base_url))
            .header(header::USER_AGENT, USER_AGENT)
            .header("fly-customer-request-id", REQUEST_ID)
            .header("x-glide-anonymous-user", "")
            .header("x-glide-attempt", "1")
            .json(&json!({ "appID": APP_ID }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(log_request_error)?;

        let pointer: SnapshotPointer = response.json().await?;
        pointer
            .data_snapshot
            .filter(|url| !url.is_empty())
            .ok_or(SnapshotError::MissingSnapshotUrl)
    }
}

fn log_request_error(e: reqwest::Error) -> SnapshotError {
    error!(error = %e, status = ?e.status(), "snapshot request failed");
    SnapshotError::Request(e)
}

/// Decodes a base64 snapshot body into JSON
pub fn decode_snapshot(body: &str) -> Result<Value, SnapshotError> {
    let bytes = STANDARD.decode(body.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}
