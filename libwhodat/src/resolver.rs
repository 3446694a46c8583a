use crate::{
    endpoint::{extract_tld, EndpointError, EndpointRegistry},
    error::{LookupError, ResolveError},
    http::create_http_pool,
    ratelimit::EndpointRateLimiters,
    rdap::fetch_rdap,
    types::{Lookup, ResolverConfig, WhoisInfo},
    whois::{check_whois, WhoisServers},
};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use std::{sync::Arc, time::Instant};

/// Resolves a batch of domains to registration records.
///
/// Results come back in request order. Callers that need a deadline wrap the
/// returned future in `tokio::time::timeout`; dropping it cancels every
/// in-flight lookup.
#[async_trait]
pub trait MultiWhois: Send + Sync {
    async fn get_multi_whois(&self, domains: &[String]) -> Result<Vec<Lookup>, ResolveError>;
}

pub struct Resolver {
    client: Client,
    registry: Arc<EndpointRegistry>,
    rate_limiters: Arc<EndpointRateLimiters>,
    whois_servers: WhoisServers,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Result<Self, ResolveError> {
        Self::with_registry(config, EndpointRegistry::new())
    }

    /// Uses `registry` as-is; a preloaded registry skips the IANA bootstrap.
    pub fn with_registry(config: ResolverConfig, registry: EndpointRegistry) -> Result<Self, ResolveError> {
        let client = create_http_pool(config.timeout).map_err(ResolveError::Client)?;
        Ok(Self {
            client,
            registry: Arc::new(registry),
            rate_limiters: Arc::new(EndpointRateLimiters::new(config.max_rate_per_endpoint)),
            whois_servers: WhoisServers::new(),
            config,
        })
    }

    /// Replaces the WHOIS server table used by the fallback.
    pub fn with_whois_servers(mut self, servers: WhoisServers) -> Self {
        self.whois_servers = servers;
        self
    }

    pub async fn ensure_bootstrapped(&self) -> Result<(), EndpointError> {
        self.registry.bootstrap(&self.client).await
    }

    pub async fn lookup_one(&self, domain: &str) -> Result<WhoisInfo, LookupError> {
        let start = Instant::now();
        let tld = extract_tld(domain)?;

        let result = match self.rdap(domain, &tld).await {
            Ok(info) => Ok(info),
            Err(err) if self.config.whois_fallback && err.is_recoverable() => {
                tracing::debug!(domain, error = %err, "RDAP lookup failed, trying WHOIS");
                match self.whois(domain, &tld).await {
                    Err(LookupError::NoServer(_)) => Err(err),
                    other => other,
                }
            }
            Err(err) => Err(err),
        };

        tracing::debug!(
            domain,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "lookup finished"
        );
        result
    }

    async fn rdap(&self, domain: &str, tld: &str) -> Result<WhoisInfo, LookupError> {
        self.ensure_bootstrapped().await?;

        let endpoint = self
            .registry
            .get_endpoint(tld)
            .ok_or_else(|| LookupError::NoServer(tld.to_string()))?;

        self.rate_limiters.acquire(&endpoint).await;
        fetch_rdap(&self.client, &endpoint, domain, self.config.timeout).await
    }

    async fn whois(&self, domain: &str, tld: &str) -> Result<WhoisInfo, LookupError> {
        let server = self
            .whois_servers
            .get(tld)
            .ok_or_else(|| LookupError::NoServer(tld.to_string()))?;

        self.rate_limiters.acquire(&server.name).await;
        check_whois(&server, domain, self.config.timeout).await
    }

    /// Lookups run concurrently, bounded by `max_concurrent`, and are yielded in input order.
    pub fn lookup_stream<I>(&self, domains: I) -> impl Stream<Item = (String, Result<WhoisInfo, LookupError>)> + '_
    where
        I: IntoIterator<Item = String> + 'static,
    {
        let domains: Vec<String> = domains.into_iter().collect();
        let concurrency = self.config.max_concurrent.max(1) as usize;

        stream::iter(domains)
            .map(move |domain| async move {
                let result = self.lookup_one(&domain).await;
                (domain, result)
            })
            .buffered(concurrency)
    }

    pub async fn resolve(&self, domains: &[String]) -> Result<Vec<Lookup>, ResolveError> {
        let outcomes: Vec<_> = self.lookup_stream(domains.to_vec()).collect().await;

        if self.config.partial_results {
            return Ok(outcomes
                .into_iter()
                .map(|(domain, result)| match result {
                    Ok(info) => Lookup::Found(info),
                    Err(err) => Lookup::Failed {
                        domain,
                        reason: err.to_string(),
                    },
                })
                .collect());
        }

        let mut found = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (domain, result) in outcomes {
            match result {
                Ok(info) => found.push(Lookup::Found(info)),
                Err(err) => failures.push((domain, err)),
            }
        }

        if failures.is_empty() {
            Ok(found)
        } else {
            tracing::warn!(
                requested = domains.len(),
                failed = failures.len(),
                "whois batch failed"
            );
            Err(ResolveError::Lookups(failures))
        }
    }
}

#[async_trait]
impl MultiWhois for Resolver {
    async fn get_multi_whois(&self, domains: &[String]) -> Result<Vec<Lookup>, ResolveError> {
        self.resolve(domains).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;
    use chrono::Datelike;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const REGISTERED: &str = r#"{"ldhName":"x","events":[{"eventAction":"registration","eventDate":"2001-02-03T00:00:00Z"},{"eventAction":"expiration","eventDate":"2031-02-03T00:00:00Z"}]}"#;

    const WHOIS_RECORD: &str = "Domain Name: FLAKY.TEST\r\n\
Registrar: Example Registrar, Inc.\r\n\
Creation Date: 2004-05-06T00:00:00Z\r\n\
Registry Expiry Date: 2034-05-06T00:00:00Z\r\n\
Name Server: NS1.EXAMPLE.NET\r\n";

    /// Minimal RDAP server: `/domain/missing.*` is 404, `/domain/flaky.*` is 503,
    /// everything else is registered.
    async fn start_rdap_backend() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let (status, body) = if request.starts_with("GET /domain/missing.") {
                        ("404 Not Found", "{}")
                    } else if request.starts_with("GET /domain/flaky.") {
                        ("503 Service Unavailable", "{}")
                    } else {
                        ("200 OK", REGISTERED)
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/rdap+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        addr
    }

    /// Port-43 server answering every query with `WHOIS_RECORD`; counts connections.
    async fn start_whois_backend() -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(WHOIS_RECORD.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (addr, hits)
    }

    /// RDAP for `.test` plus a local WHOIS server for `.test` and `.zz`.
    async fn fallback_resolver() -> (Resolver, SocketAddr, Arc<AtomicUsize>) {
        let rdap = start_rdap_backend().await;
        let (whois, hits) = start_whois_backend().await;
        let registry = EndpointRegistry::with_endpoints([("test".to_string(), format!("http://{}", rdap))]);
        let config = ResolverConfig {
            timeout: Duration::from_secs(2),
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_registry(config, registry)
            .unwrap()
            .with_whois_servers(WhoisServers::with_servers([
                ("test".to_string(), whois),
                ("zz".to_string(), whois),
            ]));
        (resolver, whois, hits)
    }

    async fn resolver(partial_results: bool) -> Resolver {
        let addr = start_rdap_backend().await;
        let registry = EndpointRegistry::with_endpoints([("test".to_string(), format!("http://{}", addr))]);
        let config = ResolverConfig {
            timeout: Duration::from_secs(2),
            whois_fallback: false,
            partial_results,
            ..ResolverConfig::default()
        };
        Resolver::with_registry(config, registry).unwrap()
    }

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn resolves_batch_in_request_order() {
        let resolver = resolver(false).await;
        let names = domains(&["c.test", "a.test", "b.test"]);

        let lookups = resolver.get_multi_whois(&names).await.unwrap();

        let order: Vec<&str> = lookups.iter().map(Lookup::domain).collect();
        assert_eq!(order, vec!["c.test", "a.test", "b.test"]);
        match &lookups[0] {
            Lookup::Found(info) => {
                assert_eq!(info.created_date.map(|d| d.year()), Some(2001));
                assert_eq!(info.expiration_date.map(|d| d.year()), Some(2031));
            }
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn any_failure_fails_the_batch_by_default() {
        let resolver = resolver(false).await;
        let names = domains(&["a.test", "missing.test", "nodot"]);

        let err = resolver.get_multi_whois(&names).await.unwrap_err();

        match err {
            ResolveError::Lookups(failures) => {
                let failed: Vec<&str> = failures.iter().map(|(d, _)| d.as_str()).collect();
                assert_eq!(failed, vec!["missing.test", "nodot"]);
                assert!(matches!(failures[0].1, LookupError::NotRegistered));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn partial_mode_reports_failures_inline() {
        let resolver = resolver(true).await;
        let names = domains(&["missing.test", "a.test"]);

        let lookups = resolver.get_multi_whois(&names).await.unwrap();

        assert_eq!(lookups.len(), 2);
        assert!(matches!(
            &lookups[0],
            Lookup::Failed { domain, reason } if domain == "missing.test" && reason == "Domain is not registered"
        ));
        assert!(lookups[1].is_found());
    }

    #[tokio::test]
    async fn unknown_tld_without_fallback_has_no_server() {
        let resolver = resolver(false).await;

        let err = resolver.lookup_one("example.zz").await.unwrap_err();
        assert!(matches!(err, LookupError::NoServer(tld) if tld == "zz"));
    }

    #[tokio::test]
    async fn rdap_server_error_falls_back_to_whois() {
        let (resolver, whois, hits) = fallback_resolver().await;

        let info = resolver.lookup_one("flaky.test").await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(info.source, Some(Source::Whois(whois.to_string())));
        assert_eq!(info.registrar.as_deref(), Some("Example Registrar, Inc."));
        assert_eq!(info.created_date.map(|d| d.year()), Some(2004));
        assert_eq!(info.expiration_date.map(|d| d.year()), Some(2034));
        assert_eq!(info.name_servers, vec!["ns1.example.net"]);
    }

    #[tokio::test]
    async fn not_registered_skips_the_fallback() {
        let (resolver, _, hits) = fallback_resolver().await;

        let err = resolver.lookup_one("missing.test").await.unwrap_err();

        assert!(matches!(err, LookupError::NotRegistered));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_domain_skips_the_fallback() {
        let (resolver, _, hits) = fallback_resolver().await;

        let err = resolver.lookup_one("nodot").await.unwrap_err();

        assert!(matches!(err, LookupError::Endpoint(EndpointError::InvalidDomain(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_whois_server_keeps_the_rdap_error() {
        let rdap = start_rdap_backend().await;
        let registry = EndpointRegistry::with_endpoints([("test".to_string(), format!("http://{}", rdap))]);
        let config = ResolverConfig {
            timeout: Duration::from_secs(2),
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_registry(config, registry).unwrap();

        let err = resolver.lookup_one("flaky.test").await.unwrap_err();

        assert!(matches!(err, LookupError::Status(503)));
    }

    #[tokio::test]
    async fn tld_without_rdap_uses_whois() {
        let (resolver, whois, hits) = fallback_resolver().await;

        let info = resolver.lookup_one("flaky.zz").await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(info.domain, "flaky.zz");
        assert_eq!(info.source, Some(Source::Whois(whois.to_string())));
    }
}
