//! Downloading thumbnail images from remote URLs.

use std::time::Duration;

use tracing::{debug, instrument};
use url::Url;

use crate::error::{KvmmError, Result};
use crate::image_ops;

/// Upper bound on a downloaded image body.
pub const MAX_FETCH_BYTES: usize = 10 * 1024 * 1024;

/// Total time allowed for one download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse `raw` and require an http or https scheme.
pub fn check_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| KvmmError::Fetch(format!("invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(KvmmError::Fetch(format!(
            "unsupported URL scheme '{other}' (use http or https)"
        ))),
    }
}

/// HTTP client for thumbnail downloads.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_limits(FETCH_TIMEOUT, MAX_FETCH_BYTES)
    }

    pub fn with_limits(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kvmm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KvmmError::Fetch(format!("building HTTP client: {e}")))?;
        Ok(Self { client, max_bytes })
    }

    /// Download `raw_url` and return the body if it is a readable image.
    ///
    /// Bodies over the size limit are rejected rather than truncated.
    #[instrument(skip(self))]
    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>> {
        let url = check_url(raw_url)?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KvmmError::Fetch(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(KvmmError::Fetch(format!(
                "server returned {}",
                status.as_u16()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| KvmmError::Fetch(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "Downloaded image");

        image_ops::validate_image_data(&body)
            .map_err(|_| KvmmError::Fetch("URL did not return a valid image".to_string()))?;
        Ok(body)
    }

    fn too_large(&self) -> KvmmError {
        KvmmError::Fetch(format!("image exceeds the {} byte limit", self.max_bytes))
    }
}
