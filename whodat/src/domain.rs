//! Per-domain response records and the metrics derived from whois dates.

use chrono::{DateTime, Utc};
use libwhodat::{Lookup, WhoisInfo};
use serde::Serialize;

/// One element of the `/multi` response: the whois record plus derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainInfo {
    #[serde(flatten)]
    pub whois: WhoisInfo,
    pub domain_age: i64,
    pub domain_registration_length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainInfo {
    pub fn from_whois(whois: WhoisInfo, now: DateTime<Utc>) -> Self {
        Self {
            domain_age: domain_age(whois.created_date, now),
            domain_registration_length: registration_length(whois.created_date, whois.expiration_date),
            whois,
            error: None,
        }
    }

    pub fn from_lookup(lookup: Lookup, now: DateTime<Utc>) -> Self {
        match lookup {
            Lookup::Found(whois) => Self::from_whois(whois, now),
            Lookup::Failed { domain, reason } => Self {
                whois: WhoisInfo::new(domain),
                domain_age: 0,
                domain_registration_length: 0,
                error: Some(reason),
            },
        }
    }
}

/// Whole days from `created` to `now`, truncated toward zero. 0 when unknown.
pub fn domain_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    created.map_or(0, |created| (now - created).num_days())
}

/// Whole days from `created` to `expiration`, truncated toward zero. 0 unless both are known.
pub fn registration_length(created: Option<DateTime<Utc>>, expiration: Option<DateTime<Utc>>) -> i64 {
    match (created, expiration) {
        (Some(created), Some(expiration)) => (expiration - created).num_days(),
        _ => 0,
    }
}
