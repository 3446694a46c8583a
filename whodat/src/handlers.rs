//! Request handlers.

use axum::{
    extract::{RawQuery, State},
    http::Method,
    Json,
};
use chrono::Utc;
use libwhodat::MultiWhois;
use serde::Serialize;
use std::time::Duration;

use crate::{domain::DomainInfo, error::ApiError, server::AppState};

/// `/multi?domains=a.com,b.org`
///
/// Routed for every method so that non-GET requests get the JSON 405 body
/// instead of axum's empty default.
pub async fn multi_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<DomainInfo>>, ApiError> {
    if method != Method::GET {
        return Err(ApiError::MethodNotAllowed);
    }

    let domains = domains_param(query.as_deref())
        .map(|value| split_domains(&value))
        .ok_or(ApiError::MissingDomains)?;

    tracing::info!(count = domains.len(), "resolving domains");

    let infos = resolve_domains(state.resolver.as_ref(), &domains, state.request_timeout).await?;
    Ok(Json(infos))
}

/// Resolves `domains` within `timeout` and attaches the derived metrics.
///
/// Shared by `/multi` and the `lookup` subcommand.
pub async fn resolve_domains(
    resolver: &dyn MultiWhois,
    domains: &[String],
    timeout: Duration,
) -> Result<Vec<DomainInfo>, ApiError> {
    let lookups = tokio::time::timeout(timeout, resolver.get_multi_whois(domains))
        .await
        .map_err(|_| {
            tracing::warn!(count = domains.len(), timeout = ?timeout, "whois lookup timed out");
            ApiError::Timeout(timeout)
        })?
        .inspect_err(|err| tracing::warn!(error = %err, "whois lookup failed"))?;

    let now = Utc::now();
    Ok(lookups
        .into_iter()
        .map(|lookup| DomainInfo::from_lookup(lookup, now))
        .collect())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

/// Value of the first `domains` parameter, if it is non-empty.
fn domains_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "domains")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Split on commas as-is: no trimming, dedup or validation.
pub fn split_domains(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}
