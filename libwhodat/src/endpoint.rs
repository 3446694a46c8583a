use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};

const IANA_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// How long a failed bootstrap is remembered before IANA is tried again.
const BOOTSTRAP_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Failed to fetch IANA bootstrap: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("IANA bootstrap failed recently, retrying in {0:?}")]
    RecentlyFailed(Duration),
    #[error("Invalid domain format: {0:?}")]
    InvalidDomain(String),
}

#[derive(Debug, Deserialize)]
struct IanaBootstrap {
    services: Vec<(Vec<String>, Vec<String>)>,
}

/// TLD to RDAP base URL map, filled once from the IANA bootstrap file.
pub struct EndpointRegistry {
    endpoints: DashMap<String, String>,
    bootstrap_url: String,
    bootstrapped: AtomicBool,
    /// Time of the last failed bootstrap; the lock also serialises attempts.
    last_failure: Mutex<Option<Instant>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::with_bootstrap_url(IANA_BOOTSTRAP_URL)
    }

    pub fn with_bootstrap_url(url: impl Into<String>) -> Self {
        Self {
            endpoints: DashMap::new(),
            bootstrap_url: url.into(),
            bootstrapped: AtomicBool::new(false),
            last_failure: Mutex::new(None),
        }
    }

    /// A registry that never contacts IANA and only knows `endpoints`.
    pub fn with_endpoints<I>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let registry = Self::new();
        for (tld, url) in endpoints {
            registry.insert(&tld, &url);
        }
        registry.bootstrapped.store(true, Ordering::Release);
        registry
    }

    pub async fn bootstrap(&self, client: &Client) -> Result<(), EndpointError> {
        if self.bootstrapped.load(Ordering::Acquire) {
            return Ok(());
        }

        // Concurrent lookups in one batch all land here on a cold start.
        let mut last_failure = self.last_failure.lock().await;
        if self.bootstrapped.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(failed_at) = *last_failure {
            let since = failed_at.elapsed();
            if since < BOOTSTRAP_RETRY_AFTER {
                return Err(EndpointError::RecentlyFailed(BOOTSTRAP_RETRY_AFTER - since));
            }
        }

        let resp = match self.fetch(client).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, url = %self.bootstrap_url, "RDAP bootstrap failed");
                *last_failure = Some(Instant::now());
                return Err(e);
            }
        };

        for (tlds, urls) in resp.services {
            if let Some(url) = urls.first() {
                for tld in tlds {
                    self.insert(&tld, url);
                }
            }
        }

        tracing::debug!(tlds = self.endpoints.len(), "RDAP bootstrap loaded");
        *last_failure = None;
        self.bootstrapped.store(true, Ordering::Release);
        Ok(())
    }

    async fn fetch(&self, client: &Client) -> Result<IanaBootstrap, EndpointError> {
        Ok(client
            .get(&self.bootstrap_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub fn get_endpoint(&self, tld: &str) -> Option<String> {
        self.endpoints.get(&tld.to_lowercase()).map(|v| v.clone())
    }

    fn insert(&self, tld: &str, url: &str) {
        let base_url = url.trim_end_matches('/').to_string();
        self.endpoints.insert(tld.to_lowercase(), base_url);
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn extract_tld(domain: &str) -> Result<String, EndpointError> {
    domain
        .rsplit_once('.')
        .filter(|(name, tld)| !name.is_empty() && !tld.is_empty())
        .map(|(_, tld)| tld.to_lowercase())
        .ok_or_else(|| EndpointError::InvalidDomain(domain.to_string()))
}
