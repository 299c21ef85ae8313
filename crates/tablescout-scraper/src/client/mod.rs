//! HTTP client used to replay captured API calls and to fetch search pages.

mod origin;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use tablescout_core::AppConfig;

use crate::error::ScraperError;
use crate::source::RequestExecutor;
use crate::types::{ReplayResponse, RequestDescriptor};

pub use origin::extract_origin;
pub(crate) use origin::extract_host;

/// Desktop browser user agents rotated per request when no fixed agent is
/// configured.
pub(crate) const BROWSER_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// reqwest-backed [`RequestExecutor`].
///
/// No retries: a failed replay ends pagination for the query, which keeps
/// whatever was already emitted.
pub struct ReplayClient {
    client: Client,
    timeout_secs: u64,
    /// Fixed agent; `None` rotates through [`BROWSER_USER_AGENTS`].
    user_agent: Option<String>,
}

impl ReplayClient {
    /// Creates a client with the given request timeout and optional fixed
    /// `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: Option<&str>) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
            user_agent: user_agent.map(str::to_owned),
        })
    }

    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(config.request_timeout_secs, config.user_agent.as_deref())
    }

    fn pick_user_agent(&self) -> &str {
        match &self.user_agent {
            Some(ua) => ua,
            None => BROWSER_USER_AGENTS[rand::random_range(0..BROWSER_USER_AGENTS.len())],
        }
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> ScraperError {
        if err.is_timeout() {
            ScraperError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.timeout_secs,
            }
        } else {
            ScraperError::Http(err)
        }
    }

    /// Fetches an HTML page body.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Timeout`]: no response within the timeout.
    /// - [`ScraperError::UnexpectedStatus`]: any non-2xx status.
    /// - [`ScraperError::Http`]: network or TLS failure.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.pick_user_agent())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RequestExecutor for ReplayClient {
    async fn execute(&self, request: &RequestDescriptor) -> Result<ReplayResponse, ScraperError> {
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            ScraperError::InvalidTemplateUrl {
                url: request.url.clone(),
                reason: format!("invalid method {:?}: {e}", request.method),
            }
        })?;
        let origin = extract_origin(&request.url);

        let mut builder = self
            .client
            .request(method, &request.url)
            .header(reqwest::header::USER_AGENT, self.pick_user_agent())
            .header(reqwest::header::ACCEPT, "application/json,*/*;q=0.8")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::ORIGIN, &origin)
            .header(reqwest::header::REFERER, format!("{origin}/"));
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(&request.url, e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(
                host = %extract_host(&request.url),
                status = status.as_u16(),
                "replay returned non-success status"
            );
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        Ok(ReplayResponse {
            status: status.as_u16(),
            body: response.text().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_user_agent_is_always_used() {
        let client = ReplayClient::new(5, Some("tablescout-test/1.0")).unwrap();
        for _ in 0..5 {
            assert_eq!(client.pick_user_agent(), "tablescout-test/1.0");
        }
    }

    #[test]
    fn rotating_user_agent_comes_from_pool() {
        let client = ReplayClient::new(5, None).unwrap();
        for _ in 0..20 {
            assert!(BROWSER_USER_AGENTS.contains(&client.pick_user_agent()));
        }
    }
}
