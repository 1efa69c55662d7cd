use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error {0}")]
    Status(StatusCode),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// GET a page and hand back its HTML. Dropping the future abandons the request.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch_html(&self, url: &Url) -> Result<String, FetchError>;
}

/// Runs `fetcher` under a deadline; the timer goes away with the future either way.
pub async fn fetch_with_timeout(
    fetcher: &dyn HtmlFetcher,
    url: &Url,
    limit: Duration,
) -> Result<String, FetchError> {
    match tokio::time::timeout(limit, fetcher.fetch_html(url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(limit)),
    }
}

pub fn create_client(config: &Config) -> Result<Client> {
    let jar = Arc::new(Jar::default());
    if let Some(cookie) = &config.session_cookie {
        let origin = config.origin_url()?;
        for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            jar.add_cookie_str(pair, &origin);
        }
    }

    let client = ClientBuilder::new()
        .user_agent(&config.user_agent)
        .cookie_provider(jar)
        .pool_max_idle_per_host(config.max_concurrent_fetch)
        .build()
        .context("Failed to build HTTP client")?;

    Ok(client)
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HtmlFetcher for HttpFetcher {
    async fn fetch_html(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverFetcher;

    #[async_trait]
    impl HtmlFetcher for NeverFetcher {
        async fn fetch_html(&self, _url: &Url) -> Result<String, FetchError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn deadline_turns_into_timeout_error() {
        let url = Url::parse("https://qiita.com/alice/items/1").unwrap();
        let limit = Duration::from_millis(20);
        let err = fetch_with_timeout(&NeverFetcher, &url, limit).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(d) if d == limit));
    }

    #[test]
    fn client_accepts_session_cookie() {
        let config = Config {
            session_cookie: Some("user_session=abc; theme=dark".to_string()),
            ..Default::default()
        };
        assert!(create_client(&config).is_ok());
    }
}
