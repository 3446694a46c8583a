use crate::{
    dates::parse_timestamp,
    error::LookupError,
    types::{Source, WhoisInfo},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
    #[serde(default)]
    status: Vec<String>,
    #[serde(default)]
    nameservers: Vec<RdapNameserver>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapEvent {
    event_action: String,
    event_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapNameserver {
    ldh_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapEntity {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    vcard_array: Option<Value>,
}

pub async fn fetch_rdap(
    client: &Client,
    endpoint: &str,
    domain: &str,
    timeout: Duration,
) -> Result<WhoisInfo, LookupError> {
    let url = format!("{}/domain/{}", endpoint, domain);

    let response = tokio::time::timeout(timeout, client.get(&url).send())
        .await
        .map_err(|_| LookupError::Timeout)??;

    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => return Err(LookupError::NotRegistered),
        StatusCode::TOO_MANY_REQUESTS => return Err(LookupError::RateLimited),
        status => return Err(LookupError::Status(status.as_u16())),
    }

    let body: RdapDomain = tokio::time::timeout(timeout, response.json())
        .await
        .map_err(|_| LookupError::Timeout)??;

    Ok(into_whois_info(domain, endpoint, body))
}

pub(crate) fn into_whois_info(domain: &str, endpoint: &str, body: RdapDomain) -> WhoisInfo {
    let mut info = WhoisInfo::new(domain);

    for event in &body.events {
        let slot = match event.event_action.to_lowercase().as_str() {
            "registration" => &mut info.created_date,
            "expiration" => &mut info.expiration_date,
            "last changed" => &mut info.updated_date,
            _ => continue,
        };
        if slot.is_none() {
            *slot = parse_timestamp(&event.event_date);
        }
    }

    info.registrar = body
        .entities
        .iter()
        .find(|e| e.roles.iter().any(|r| r.eq_ignore_ascii_case("registrar")))
        .and_then(|e| e.vcard_array.as_ref())
        .and_then(vcard_full_name);

    info.name_servers = body
        .nameservers
        .into_iter()
        .filter_map(|ns| ns.ldh_name)
        .map(|name| name.to_lowercase())
        .collect();

    info.status = body.status;
    info.source = Some(Source::Rdap(endpoint.to_string()));
    info
}

/// Pulls the `fn` property out of a jCard: `["vcard", [["fn", {}, "text", "Name"], ...]]`.
fn vcard_full_name(vcard: &Value) -> Option<String> {
    vcard
        .get(1)?
        .as_array()?
        .iter()
        .find(|prop| prop.get(0).and_then(Value::as_str) == Some("fn"))?
        .get(3)?
        .as_str()
        .map(str::to_string)
}
