//! Stub resolvers and request helpers shared by the integration tests.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use libwhodat::{Lookup, LookupError, MultiWhois, ResolveError};
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;
use whodat::{router, AppState};

/// Returns `lookups` for any input and remembers what it was asked.
#[derive(Default)]
pub struct StaticResolver {
    pub lookups: Vec<Lookup>,
    pub seen: Mutex<Vec<Vec<String>>>,
}

impl StaticResolver {
    pub fn new(lookups: Vec<Lookup>) -> Arc<Self> {
        Arc::new(Self {
            lookups,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MultiWhois for StaticResolver {
    async fn get_multi_whois(&self, domains: &[String]) -> Result<Vec<Lookup>, ResolveError> {
        self.seen.lock().unwrap().push(domains.to_vec());
        Ok(self.lookups.clone())
    }
}

/// Never answers within any reasonable deadline.
pub struct SlowResolver(pub Duration);

#[async_trait]
impl MultiWhois for SlowResolver {
    async fn get_multi_whois(&self, _domains: &[String]) -> Result<Vec<Lookup>, ResolveError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

/// Fails every domain with the given error.
pub struct FailingResolver;

#[async_trait]
impl MultiWhois for FailingResolver {
    async fn get_multi_whois(&self, domains: &[String]) -> Result<Vec<Lookup>, ResolveError> {
        Err(ResolveError::Lookups(
            domains
                .iter()
                .map(|d| (d.clone(), LookupError::NoServer("zz".to_string())))
                .collect(),
        ))
    }
}

pub fn app(resolver: Arc<dyn MultiWhois>) -> Router {
    router(AppState::new(resolver, Duration::from_secs(5)))
}

pub async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, content_type, body)
}
