//! HTTP client wrapper for metadata requests.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::error::VerifyError;

/// HTTP client wrapper for metadata service requests.
///
/// Every response body is read through [`read_body_limited`] with the
/// client's cap.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    inner: Client,
    base_url: String,
    max_size: usize,
}

impl MetadataClient {
    /// Create a client for a link-local metadata service.
    ///
    /// Proxies are disabled: metadata services are only reachable directly.
    pub fn new(timeout: Duration, base_url: &str, max_size: usize) -> Result<Self, VerifyError> {
        let inner = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_size,
        })
    }

    /// Create a client for public hosts (certificate and key downloads).
    pub fn for_downloads(timeout: Duration, max_size: usize) -> Result<Self, VerifyError> {
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            base_url: String::new(),
            max_size,
        })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Absolute URL for a path on the metadata service.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return its body, failing on non-success status.
    pub async fn fetch(&self, request: RequestBuilder) -> Result<Vec<u8>, VerifyError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Http(status.as_u16()));
        }

        read_body_limited(response, self.max_size).await
    }

    /// Like [`fetch`](Self::fetch), decoding the body as UTF-8.
    pub async fn fetch_text(&self, request: RequestBuilder) -> Result<String, VerifyError> {
        let body = self.fetch(request).await?;
        String::from_utf8(body).map_err(|_| VerifyError::Parse("invalid utf-8".into()))
    }
}

/// Read response body with a size limit.
///
/// 1. Check the `Content-Length` header and fail early if it exceeds the limit
/// 2. Read the body with a pre-allocated capped buffer, aborting immediately if exceeded
pub async fn read_body_limited(response: Response, max_size: usize) -> Result<Vec<u8>, VerifyError> {
    if let Some(content_length) = response.content_length() {
        if content_length as usize > max_size {
            return Err(VerifyError::TooLarge(content_length as usize, max_size));
        }
    }

    // Content-Length may be missing or wrong, so the buffer is capped either way
    let capacity = response
        .content_length()
        .map(|cl| (cl as usize).min(max_size))
        .unwrap_or(max_size.min(8192));
    let mut body = Vec::with_capacity(capacity);

    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        let total = body.len().saturating_add(chunk.len());
        if total > max_size {
            return Err(VerifyError::TooLarge(total, max_size));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
