use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::urls::is_http_url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub content: String,
    /// URL after redirects; relative links resolve against it.
    pub final_url: Url,
    pub status: u16,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        if !is_http_url(url) {
            return Err(FetchError::permanent(
                url.as_str(),
                format!("unsupported scheme: {}", url.scheme()),
            ));
        }

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|err| classify(url, &err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(url.as_str(), status.as_u16()));
        }

        let final_url = response.url().clone();
        let content = response.text().await.map_err(|err| classify(url, &err))?;
        tracing::debug!(%url, %final_url, bytes = content.len(), "fetched");

        Ok(FetchResponse {
            content,
            final_url,
            status: status.as_u16(),
        })
    }
}

fn classify(url: &Url, err: &reqwest::Error) -> FetchError {
    let message = error_chain(err);
    if err.is_builder() || err.is_decode() || err.is_redirect() {
        FetchError::permanent(url.as_str(), message)
    } else {
        FetchError::transient(url.as_str(), message)
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_http_urls_are_permanent_failures() -> anyhow::Result<()> {
        let fetcher = HttpFetcher::new(&FetchConfig::default())?;
        let url = Url::parse("ftp://example.com/file")?;
        let err = fetcher.fetch(&url).await.expect_err("ftp is rejected");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("unsupported scheme"));
        Ok(())
    }

    #[tokio::test]
    async fn refused_connection_is_transient() -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let fetcher = HttpFetcher::new(&FetchConfig::default().with_timeout_secs(2))?;
        let url = Url::parse(&format!("http://{addr}/chapter"))?;
        let err = fetcher.fetch(&url).await.expect_err("nothing listens");
        assert!(err.is_transient());
        Ok(())
    }
}
