//! Smart HTTP transport for fetching from a remote repository.

use crate::protocol::{build_want_request, RefAdvertisement, RefRecord, UPLOAD_PACK};
use crate::{GitError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;

const ADVERTISEMENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
const REQUEST_TYPE: &str = "application/x-git-upload-pack-request";
const RESULT_TYPE: &str = "application/x-git-upload-pack-result";

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout applied to each request.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            user_agent: format!("knit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Client for the fetch half of git's smart HTTP protocol.
#[derive(Debug, Clone)]
pub struct SmartHttpClient {
    client: Client,
}

impl SmartHttpClient {
    /// Creates a client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| GitError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetches the raw ref advertisement of `repo_url`.
    pub fn fetch_refs(&self, repo_url: &str) -> Result<Vec<u8>> {
        let url = format!("{}/info/refs?service={UPLOAD_PACK}", base(repo_url));
        tracing::debug!(%url, "Discovering refs");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| GitError::Network(e.to_string()))?;
        read_body(&url, response, ADVERTISEMENT_TYPE)
    }

    /// Fetches and parses the ref advertisement of `repo_url`.
    pub fn discover_refs(&self, repo_url: &str) -> Result<RefAdvertisement> {
        RefAdvertisement::parse(&self.fetch_refs(repo_url)?)
    }

    /// Requests every ref in `refs` and returns the response body, which is
    /// the pack, possibly preceded by a `NAK` line.
    pub fn negotiate_pack(&self, repo_url: &str, refs: &[RefRecord]) -> Result<Vec<u8>> {
        if refs.is_empty() {
            return Err(GitError::Protocol("no refs to request".to_string()));
        }

        let url = format!("{}/{UPLOAD_PACK}", base(repo_url));
        let body = build_want_request(refs);
        tracing::debug!(%url, wants = refs.len(), "Requesting pack");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, REQUEST_TYPE)
            .body(body)
            .send()
            .map_err(|e| GitError::Network(e.to_string()))?;
        let pack = read_body(&url, response, RESULT_TYPE)?;

        tracing::debug!(bytes = pack.len(), "Received pack");
        Ok(pack)
    }
}

fn base(repo_url: &str) -> &str {
    repo_url.trim_end_matches('/')
}

fn read_body(url: &str, response: Response, expected_type: &str) -> Result<Vec<u8>> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(GitError::Protocol(format!("{url}: unexpected status {status}")));
    }

    // a dumb-HTTP server answers with text/plain; only the smart type is usable
    if let Some(value) = response.headers().get(CONTENT_TYPE) {
        let content_type = value.to_str().unwrap_or_default();
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        if !mime.eq_ignore_ascii_case(expected_type) {
            return Err(GitError::Protocol(format!(
                "{url}: unexpected content type {content_type:?}, expected {expected_type}"
            )));
        }
    }

    let body = response
        .bytes()
        .map_err(|e| GitError::Network(e.to_string()))?;
    Ok(body.to_vec())
}
