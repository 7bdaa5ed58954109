use anyhow::Result;
use quill_config::FetcherConfig;
use quill_http::{HttpClient, RequestOpts};

/// Retrieves the raw HTML for a page.
///
/// Implementations must be safe to call from many requests at once and
/// should fail with a descriptive error rather than returning partial markup.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Concrete fetcher backed by the shared HTTP client.
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: HttpClient,
}

impl HttpPageFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Build a fetcher honoring the configured timeouts, retries and limits.
    pub fn from_config(cfg: &FetcherConfig) -> Result<Self> {
        let mut client = HttpClient::with_connect_timeout(cfg.connect_timeout())?
            .with_timeout(cfg.timeout())
            .with_retries(cfg.retries)
            .with_max_body_bytes(cfg.max_body_bytes);
        if let Some(ua) = cfg.user_agent.as_deref().filter(|ua| !ua.trim().is_empty()) {
            client = client.with_user_agent(ua);
        }
        Ok(Self::new(client))
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let page = self.client.get_html(url, RequestOpts::default()).await?;
        tracing::debug!(
            target: "web.fetch",
            requested = %url,
            final_url = %page.url,
            html_len = page.html.len(),
            "fetch.complete"
        );
        Ok(page.html)
    }
}
