//! HTTP client for the upstream geolocation service.
//!
//! Every lookup resolves to a [`LookupOutcome`] value; transport problems
//! are classified, never propagated, so no failure escapes the per-record
//! task boundary. The `CellLookup` trait is the seam the dispatch engine
//! and the test suite consume.

use crate::glm::codec;
use crate::glm::validate;
use crate::proxy::rotation::EgressIdentity;
use crate::resolver::outcome::{CellRecord, LookupOutcome};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for one upstream request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs one cell lookup through the given egress identity.
pub trait CellLookup: Send + Sync {
    fn lookup<'a>(
        &'a self,
        record: &'a CellRecord,
        egress: &'a EgressIdentity,
    ) -> BoxFuture<'a, LookupOutcome>;
}

/// Shared handles dispatch like the client they wrap, so a caller can keep
/// a reference to a client it hands to the resolver.
impl<T: CellLookup + ?Sized> CellLookup for Arc<T> {
    fn lookup<'a>(
        &'a self,
        record: &'a CellRecord,
        egress: &'a EgressIdentity,
    ) -> BoxFuture<'a, LookupOutcome> {
        self.as_ref().lookup(record, egress)
    }
}

/// Client for the GLM MMAP endpoint.
pub struct GlmClient {
    endpoint: String,
    request_timeout: Duration,
    direct: reqwest::Client,
}

impl GlmClient {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let direct = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build direct HTTP client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            request_timeout,
            direct,
        })
    }

    /// Builds a client routed through one proxy endpoint. Proxies come and
    /// go between batches, so these are constructed per request rather than
    /// cached.
    fn proxied(&self, endpoint: &str) -> Result<reqwest::Client> {
        let proxy = reqwest::Proxy::all(format!("http://{endpoint}"))
            .with_context(|| format!("invalid proxy endpoint {endpoint}"))?;
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .proxy(proxy)
            .build()
            .context("failed to build proxied HTTP client")
    }

    async fn perform(&self, record: &CellRecord, egress: &EgressIdentity) -> LookupOutcome {
        let client = match egress {
            EgressIdentity::Direct => self.direct.clone(),
            EgressIdentity::Proxy(endpoint) => match self.proxied(endpoint) {
                Ok(client) => client,
                Err(err) => {
                    tracing::debug!(key = %record.key, error = %err, "proxy client build failed");
                    return LookupOutcome::ConnectionError;
                }
            },
        };

        let response = match client
            .post(&self.endpoint)
            .body(codec::encode(record.key))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return classify_transport_error(&err),
        };

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return classify_transport_error(&err),
        };

        validate::validate((record.lat, record.lon), codec::decode(&bytes))
    }
}

impl CellLookup for GlmClient {
    fn lookup<'a>(
        &'a self,
        record: &'a CellRecord,
        egress: &'a EgressIdentity,
    ) -> BoxFuture<'a, LookupOutcome> {
        Box::pin(self.perform(record, egress))
    }
}

/// A deadline overrun is a [`LookupOutcome::Timeout`]; every other transport
/// or decode-level failure is indistinguishable from a broken connection.
fn classify_transport_error(err: &reqwest::Error) -> LookupOutcome {
    if err.is_timeout() {
        LookupOutcome::Timeout
    } else {
        LookupOutcome::ConnectionError
    }
}
