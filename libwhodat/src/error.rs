use crate::endpoint::EndpointError;
use thiserror::Error;

/// Why a single domain could not be resolved.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("RDAP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RDAP server returned HTTP {0}")]
    Status(u16),
    #[error("Domain is not registered")]
    NotRegistered,
    #[error("Rate limited by registry")]
    RateLimited,
    #[error("WHOIS error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No RDAP or WHOIS server for .{0}")]
    NoServer(String),
    #[error("WHOIS response from {0} contained no registration data")]
    EmptyResponse(String),
    #[error("Timed out")]
    Timeout,
}

impl LookupError {
    /// Whether a WHOIS fallback could still produce an answer after this RDAP failure.
    pub(crate) fn is_recoverable(&self) -> bool {
        !matches!(self, LookupError::NotRegistered | LookupError::Endpoint(EndpointError::InvalidDomain(_)))
    }
}

/// Aggregate failure of a multi-domain lookup.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{}", describe_failures(.0))]
    Lookups(Vec<(String, LookupError)>),
}

fn describe_failures(failures: &[(String, LookupError)]) -> String {
    let details: Vec<String> = failures
        .iter()
        .map(|(domain, err)| format!("{}: {}", domain, err))
        .collect();
    format!(
        "whois lookup failed for {} domain(s): {}",
        failures.len(),
        details.join("; ")
    )
}
