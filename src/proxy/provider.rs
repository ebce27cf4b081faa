//! Elite proxy list acquisition.
//!
//! The listing service exposes one plain-text endpoint per scheme, one
//! `host:port` per line. A fresh list is fetched before the primary pass and
//! before every retry pass; a fetch failure is fatal to starting that pass,
//! with no internal retry.

use crate::proxy::rotation::EgressIdentity;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

const HTTP_LIST_URL: &str = "https://www.proxy-list.download/api/v1/get?&type=http&anon=elite";
const HTTPS_LIST_URL: &str = "https://www.proxy-list.download/api/v1/get?&type=https&anon=elite";

/// Source of egress proxy identities. Object-safe so tests can script one.
pub trait ProxySource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<EgressIdentity>>>;
}

impl<T: ProxySource + ?Sized> ProxySource for Arc<T> {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<EgressIdentity>>> {
        self.as_ref().fetch()
    }
}

/// Fetches the elite-proxy listings over HTTP.
pub struct HttpProxySource {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpProxySource {
    pub fn new(fetch_timeout: Duration, urls: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .context("failed to build proxy list HTTP client")?;
        Ok(Self { client, urls })
    }

    pub fn default_urls() -> Vec<String> {
        vec![HTTP_LIST_URL.to_owned(), HTTPS_LIST_URL.to_owned()]
    }

    async fn fetch_list(&self, url: &str) -> Result<Vec<EgressIdentity>> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("proxy list request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("proxy list request to {url} was rejected"))?
            .text()
            .await
            .with_context(|| format!("failed to read proxy list body from {url}"))?;

        Ok(parse_proxy_lines(&body))
    }
}

impl ProxySource for HttpProxySource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<EgressIdentity>>> {
        Box::pin(async move {
            let mut proxies = Vec::new();
            for url in &self.urls {
                let list = self.fetch_list(url).await?;
                tracing::debug!(url, count = list.len(), "fetched proxy list");
                proxies.extend(list);
            }
            tracing::info!(count = proxies.len(), "fetched elite proxies");
            Ok(proxies)
        })
    }
}

fn parse_proxy_lines(body: &str) -> Vec<EgressIdentity> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| EgressIdentity::Proxy(line.to_owned()))
        .collect()
}
