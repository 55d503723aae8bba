//! HTTP exchange used to reach the CAS server.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

/// Fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs the validation requests.
///
/// Implementations must read the whole body before returning, whatever the status code, so the
/// underlying connection is released when `fetch` completes. Timeouts, proxies and TLS settings are
/// the implementation's business.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a `GET` request without body to `url`, sending `user_agent` as the `User-Agent` header.
    async fn fetch(&self, url: &Url, user_agent: &str) -> anyhow::Result<HttpResponse>;
}

#[async_trait]
impl HttpClient for reqwest::Client {
    async fn fetch(&self, url: &Url, user_agent: &str) -> anyhow::Result<HttpResponse> {
        let response = reqwest::Client::get(self, url.clone())
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .context("failed to send request to CAS server")?;

        let status = response.status();

        let body = response
            .text()
            .await
            .context("failed to read CAS server response body")?;

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    async fn fetch(&self, url: &Url, user_agent: &str) -> anyhow::Result<HttpResponse> {
        T::fetch(self, url, user_agent).await
    }
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for &T {
    async fn fetch(&self, url: &Url, user_agent: &str) -> anyhow::Result<HttpResponse> {
        T::fetch(self, url, user_agent).await
    }
}
