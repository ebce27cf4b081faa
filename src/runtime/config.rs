use crate::glm::client::DEFAULT_REQUEST_TIMEOUT;
use crate::proxy::provider::HttpProxySource;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ENDPOINT_URL: &str = "http://www.google.com/glm/mmap";
const DEFAULT_PROXY_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SWITCH_THRESHOLD_SECS: u64 = 30;

/// Runtime configuration for the resolution engine.
///
/// All instances must be constructed via [`ResolverConfig::builder`] so
/// invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    store_path: PathBuf,
    worker_width: usize,
    start_with_proxies: bool,
    request_timeout: Duration,
    proxy_fetch_timeout: Duration,
    switch_threshold_secs: u64,
    endpoint_url: String,
    proxy_list_urls: Vec<String>,
}

impl ResolverConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }

    /// Path to the sqlite cell store.
    pub fn store_path(&self) -> &PathBuf {
        &self.store_path
    }

    /// Concurrent lookups per batch, and the direct-mode batch size.
    pub fn worker_width(&self) -> usize {
        self.worker_width
    }

    /// Whether the primary pass starts in proxy mode.
    pub fn start_with_proxies(&self) -> bool {
        self.start_with_proxies
    }

    /// Hard deadline for one upstream request.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Deadline for each proxy listing fetch.
    pub fn proxy_fetch_timeout(&self) -> Duration {
        self.proxy_fetch_timeout
    }

    /// Direct-mode delay, in seconds, at which a pass switches to proxies.
    pub fn switch_threshold_secs(&self) -> u64 {
        self.switch_threshold_secs
    }

    /// Upstream geolocation endpoint.
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Proxy listing endpoints, queried in order.
    pub fn proxy_list_urls(&self) -> &[String] {
        &self.proxy_list_urls
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            bail!("store_path cannot be empty");
        }
        if self.worker_width == 0 {
            bail!("worker_width must be greater than 0");
        }
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.proxy_fetch_timeout.is_zero() {
            bail!("proxy_fetch_timeout must be greater than 0");
        }
        if self.switch_threshold_secs == 0 {
            bail!("switch_threshold_secs must be greater than 0");
        }
        validate_url(&self.endpoint_url, "endpoint_url")?;
        if self.proxy_list_urls.is_empty() {
            bail!("proxy_list_urls cannot be empty");
        }
        for url in &self.proxy_list_urls {
            validate_url(url, "proxy_list_urls entry")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ResolverConfigBuilder {
    store_path: Option<PathBuf>,
    worker_width: Option<usize>,
    start_with_proxies: Option<bool>,
    request_timeout: Option<Duration>,
    proxy_fetch_timeout: Option<Duration>,
    switch_threshold_secs: Option<u64>,
    endpoint_url: Option<String>,
    proxy_list_urls: Option<Vec<String>>,
}

impl ResolverConfigBuilder {
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn worker_width(mut self, width: usize) -> Self {
        self.worker_width = Some(width);
        self
    }

    pub fn start_with_proxies(mut self, enabled: bool) -> Self {
        self.start_with_proxies = Some(enabled);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn proxy_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.proxy_fetch_timeout = Some(timeout);
        self
    }

    pub fn switch_threshold_secs(mut self, secs: u64) -> Self {
        self.switch_threshold_secs = Some(secs);
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn proxy_list_urls(mut self, urls: Vec<String>) -> Self {
        self.proxy_list_urls = Some(urls);
        self
    }

    pub fn build(self) -> Result<ResolverConfig> {
        let config = ResolverConfig {
            store_path: self.store_path.context("store_path is required")?,
            worker_width: self.worker_width.context("worker_width is required")?,
            start_with_proxies: self.start_with_proxies.unwrap_or(false),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            proxy_fetch_timeout: self
                .proxy_fetch_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_PROXY_FETCH_TIMEOUT_SECS)),
            switch_threshold_secs: self
                .switch_threshold_secs
                .unwrap_or(DEFAULT_SWITCH_THRESHOLD_SECS),
            endpoint_url: self
                .endpoint_url
                .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_owned()),
            proxy_list_urls: self
                .proxy_list_urls
                .unwrap_or_else(HttpProxySource::default_urls),
        };

        config.validate()?;
        Ok(config)
    }
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
