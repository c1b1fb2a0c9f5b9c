//! Shared HTTP seam for the unauthenticated sources.

use async_trait::async_trait;
use contrib_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the body of a 2xx response.
    async fn get_text(&self, url: &Url) -> Result<String>;
}

#[derive(Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("contrib-aggregator"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(Error::backend_reqwest)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn get_text(&self, url: &Url) -> Result<String> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(Error::backend_reqwest)?
            .error_for_status()
            .map_err(Error::backend_reqwest)?;
        resp.text().await.map_err(Error::backend_reqwest)
    }
}

/// GET and decode JSON. Transport failures come back as `Backend`, bad bodies as `Decode`.
pub async fn get_json<T: DeserializeOwned>(fetch: &dyn Fetch, url: &Url) -> Result<T> {
    let body = fetch.get_text(url).await?;
    serde_json::from_str(&body).map_err(|e| Error::decode(url.to_string(), e))
}

pub fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidInput(format!("invalid url '{raw}': {e}")))
}

/// Sleeps between follow-up requests. A zero delay returns immediately.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
