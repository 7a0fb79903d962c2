//! HTTP renderer with rate limiting
//!
//! This module provides the default [`Renderer`] which:
//! - Sends browser-like request headers
//! - Rate limits requests with governor
//! - Passes the location filter as a query parameter when configured
//! - Extracts a snapshot from the returned HTML
//!
//! It performs a single attempt per render. A failed render is retried by
//! the monitor on its next tick, not here.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE},
    Client,
};
use std::num::NonZeroU32;
use std::time::Duration;
use url::Url;

use super::Renderer;
use crate::availability::Snapshot;
use crate::config::RendererConfig;
use crate::parser::{ParsedPage, SnapshotParser};
use crate::utils::error::RenderError;

/// Renders product pages by fetching their HTML
pub struct HttpRenderer {
    /// HTTP client with configured timeout, cookies and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Query parameter carrying the location filter, if the storefront takes one
    location_param: Option<String>,

    /// Request timeout, reported in timeout errors
    timeout: Duration,

    parser: SnapshotParser,
}

impl HttpRenderer {
    /// Create a renderer from configuration
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Http` if the HTTP client cannot be created
    pub fn new(config: &RendererConfig) -> Result<Self, RenderError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(Self::build_headers())
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            location_param: config.location_param.clone().filter(|p| !p.is_empty()),
            timeout,
            parser: SnapshotParser::new(),
        })
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-IN,en;q=0.9"));
        headers
    }

    /// Build the request URL, appending the location filter if configured
    pub fn request_url(&self, url: &str, location_filter: &str) -> Result<Url, RenderError> {
        let mut parsed = Url::parse(url).map_err(|e| RenderError::InvalidUrl(format!("{url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RenderError::InvalidUrl(url.to_string()));
        }

        if let Some(param) = &self.location_param {
            if !location_filter.is_empty() {
                parsed
                    .query_pairs_mut()
                    .append_pair(param, location_filter);
            }
        }

        Ok(parsed)
    }

    /// Fetch a page and parse it, keeping page metadata
    pub async fn fetch_page(&self, url: &str, location_filter: &str) -> Result<ParsedPage, RenderError> {
        let request_url = self.request_url(url, location_filter)?;

        self.rate_limiter.until_ready().await;

        tracing::debug!(url = %request_url, "Fetching product page");

        let response = self.client.get(request_url).send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout(self.timeout.as_secs())
            } else {
                RenderError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        if html.trim().is_empty() {
            return Err(RenderError::Extraction("empty response body".to_string()));
        }

        let page = self.parser.parse(&html);

        if page.looks_like_error_page() {
            tracing::warn!(
                url = %url,
                title = ?page.title,
                "Page shows error messaging, reading stock status anyway"
            );
        }

        if !location_filter.is_empty() && !page.mentions(location_filter) {
            tracing::debug!(
                url = %url,
                location_filter = %location_filter,
                "Could not confirm location filter on the page"
            );
        }

        Ok(page)
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, url: &str, location_filter: &str) -> Result<Snapshot, RenderError> {
        self.fetch_page(url, location_filter)
            .await
            .map(|page| page.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(location_param: Option<&str>) -> HttpRenderer {
        let config = RendererConfig {
            location_param: location_param.map(str::to_string),
            ..RendererConfig::default()
        };
        HttpRenderer::new(&config).unwrap()
    }

    #[test]
    fn test_request_url_without_location_param() {
        let url = renderer(None)
            .request_url("https://shop.example.com/p/1", "560001")
            .unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/p/1");
    }

    #[test]
    fn test_request_url_appends_location_param() {
        let url = renderer(Some("pincode"))
            .request_url("https://shop.example.com/p/1?variant=2", "560001")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://shop.example.com/p/1?variant=2&pincode=560001"
        );
    }

    #[test]
    fn test_request_url_rejects_non_http() {
        let err = renderer(None)
            .request_url("file:///etc/passwd", "")
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidUrl(_)));
    }
}
