//! Shared HTTP plumbing for the Google adapters
//!
//! Builds the reqwest client, resolves endpoint URLs and maps HTTP failures
//! onto the domain errors.

use super::auth::SharedCredential;
use crate::domain::{InvoicerError, JobError, Result};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Google API error reasons that mean "slow down" even on a 403
const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

/// Base URLs of the Google APIs the invoicer uses
///
/// Overridable so tests can point every adapter at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    pub drive: String,
    pub docs: String,
    pub sheets: String,
    pub gmail: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            drive: "https://www.googleapis.com/drive/v3".to_string(),
            docs: "https://docs.googleapis.com/v1".to_string(),
            sheets: "https://sheets.googleapis.com/v4".to_string(),
            gmail: "https://gmail.googleapis.com/gmail/v1".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// Every API under one base URL, keeping the real path prefixes
    pub fn uniform(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            drive: format!("{base}/drive/v3"),
            docs: format!("{base}/v1"),
            sheets: format!("{base}/v4"),
            gmail: format!("{base}/gmail/v1"),
        }
    }
}

/// Builds the HTTP client shared by all adapters
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("invoicer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| InvoicerError::Other(format!("Failed to build HTTP client: {e}")))
}

/// HTTP client that attaches the shared bearer token to every request
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    credential: Arc<SharedCredential>,
}

impl AuthorizedClient {
    pub fn new(http: Client, credential: Arc<SharedCredential>) -> Self {
        Self { http, credential }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Sends the request without checking the status
    pub(crate) async fn execute(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let bearer = self.credential.bearer().await?;
        request
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(|e| send_error(e, what))
    }

    /// Sends the request and maps non-success statuses
    pub(crate) async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self.execute(request, what).await?;
        ensure_success(response, what).await
    }

    /// Sends the request and decodes a JSON response
    pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| JobError::Backend(format!("{what}: unexpected response: {e}")).into())
    }
}

/// Appends percent-encoded path segments to `base`
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| InvoicerError::Configuration(format!("Invalid API base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| InvoicerError::Configuration(format!("API base URL '{base}' cannot have a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Maps a transport-level failure
pub(crate) fn send_error(err: reqwest::Error, what: &str) -> InvoicerError {
    if err.is_timeout() || err.is_connect() {
        InvoicerError::Transient(format!("{what}: {err}"))
    } else {
        InvoicerError::Other(format!("{what}: {err}"))
    }
}

/// Passes successful responses through and maps the rest
pub(crate) async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, what, &body))
}

/// Classifies a non-success status
///
/// 404 → NotFound, 403 → PermissionDenied (unless rate limited),
/// 401 → Authentication, 429 and 5xx → Transient, anything else → Backend.
pub(crate) fn status_error(status: StatusCode, what: &str, body: &str) -> InvoicerError {
    let detail = format!("{what} failed with status {status}: {}", api_message(body));
    match status {
        StatusCode::NOT_FOUND => JobError::NotFound(detail).into(),
        StatusCode::UNAUTHORIZED => InvoicerError::Authentication(detail),
        StatusCode::FORBIDDEN if is_rate_limited(body) => InvoicerError::Transient(detail),
        StatusCode::FORBIDDEN => JobError::PermissionDenied(detail).into(),
        StatusCode::TOO_MANY_REQUESTS => InvoicerError::Transient(detail),
        s if s.is_server_error() => InvoicerError::Transient(detail),
        _ => JobError::Backend(detail).into(),
    }
}

/// The `error.message` of a Google error body, or the raw body
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn is_rate_limited(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    value["error"]["errors"]
        .as_array()
        .map(|errors| {
            errors.iter().any(|e| {
                e["reason"]
                    .as_str()
                    .is_some_and(|reason| RATE_LIMIT_REASONS.contains(&reason))
            })
        })
        .unwrap_or(false)
}
