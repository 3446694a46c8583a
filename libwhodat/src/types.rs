use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration data for a single domain.
///
/// Every field except `domain` is optional: registries differ in what they
/// publish, and a missing value stays `None` rather than being guessed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisInfo {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl WhoisInfo {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", content = "server", rename_all = "lowercase")]
pub enum Source {
    Rdap(String),
    Whois(String),
}

/// Outcome of resolving one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(WhoisInfo),
    Failed { domain: String, reason: String },
}

impl Lookup {
    pub fn domain(&self) -> &str {
        match self {
            Lookup::Found(info) => &info.domain,
            Lookup::Failed { domain, .. } => domain,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Deadline for a single domain's RDAP or whois exchange.
    pub timeout: Duration,
    pub whois_fallback: bool,
    pub max_rate_per_endpoint: u32,
    pub max_concurrent: u32,
    /// Return per-domain failures as `Lookup::Failed` instead of failing the batch.
    pub partial_results: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            whois_fallback: true,
            max_rate_per_endpoint: 20,
            max_concurrent: 10,
            partial_results: false,
        }
    }
}
