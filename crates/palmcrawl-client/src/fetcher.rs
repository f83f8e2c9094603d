use std::time::Duration;

use palmcrawl_core::error::CrawlError;
use palmcrawl_core::traits::Fetcher;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

/// Default client identifier sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "palmcrawl/",
    env!("CARGO_PKG_VERSION"),
    " (+oil palm research crawler)"
);

/// HTTP fetcher using reqwest.
///
/// Downloads page bodies with a fixed User-Agent and timeout. PDF documents
/// are recognised by url or content type and come back as an empty body,
/// which the quality gate then rejects as too short.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        if is_pdf_url(url) {
            tracing::debug!(%url, "Skipping PDF body");
            return Ok(String::new());
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                CrawlError::NetworkError(format!("Connection failed: {e}"))
            } else {
                CrawlError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let is_pdf = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_pdf_content_type);
        if is_pdf {
            tracing::debug!(%url, "Skipping PDF body");
            return Ok(String::new());
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                CrawlError::Timeout(self.timeout_secs)
            } else {
                CrawlError::HttpError(format!("Failed to read response body: {e}"))
            }
        })
    }
}

fn is_pdf_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".pdf")
}

fn is_pdf_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/pdf"))
}
