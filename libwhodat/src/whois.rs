use crate::{
    dates::parse_timestamp,
    error::LookupError,
    types::{Source, WhoisInfo},
};
use std::{collections::HashMap, net::SocketAddr, time::Duration};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

const CREATED_KEYS: &[&str] = &["creation date", "created", "created on", "registered on", "registration time"];
const EXPIRY_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiry date",
    "expiration date",
    "expires on",
    "paid-till",
];
const UPDATED_KEYS: &[&str] = &["updated date", "last updated", "last modified", "changed"];
const NOT_FOUND_MARKERS: &[&str] = &["no match", "not found", "no data found", "no entries found"];

fn whois_server(tld: &str) -> Option<&'static str> {
    let server = match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "io" => "whois.nic.io",
        "dev" | "app" => "whois.nic.google",
        "ai" => "whois.nic.ai",
        "co" => "whois.nic.co",
        "me" => "whois.nic.me",
        "info" => "whois.nic.info",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "no" => "whois.norid.no",
        _ => return None,
    };
    Some(server)
}

/// A WHOIS server to query: `name` is what records and rate limits are keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisServer {
    pub name: String,
    addr: String,
}

/// TLD to WHOIS server map: the built-in table plus per-TLD address overrides.
#[derive(Debug, Clone, Default)]
pub struct WhoisServers {
    overrides: HashMap<String, SocketAddr>,
}

impl WhoisServers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Servers in `overrides` take precedence over the built-in table.
    pub fn with_servers<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, SocketAddr)>,
    {
        Self {
            overrides: overrides
                .into_iter()
                .map(|(tld, addr)| (tld.to_lowercase(), addr))
                .collect(),
        }
    }

    pub fn get(&self, tld: &str) -> Option<WhoisServer> {
        let tld = tld.to_lowercase();
        if let Some(addr) = self.overrides.get(&tld) {
            return Some(WhoisServer {
                name: addr.to_string(),
                addr: addr.to_string(),
            });
        }

        whois_server(&tld).map(|host| WhoisServer {
            name: host.to_string(),
            addr: format!("{}:{}", host, WHOIS_PORT),
        })
    }
}

pub async fn check_whois(server: &WhoisServer, domain: &str, timeout: Duration) -> Result<WhoisInfo, LookupError> {
    let response = query_server(server.addr.as_str(), domain, timeout).await?;
    parse_whois_response(domain, &server.name, &response)
}

pub(crate) async fn query_server<A: ToSocketAddrs>(
    addr: A,
    domain: &str,
    timeout: Duration,
) -> Result<String, LookupError> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(format!("{}\r\n", domain).as_bytes()).await?;

        let mut raw = Vec::new();
        (&mut stream).take(MAX_RESPONSE_BYTES).read_to_end(&mut raw).await?;

        Ok::<_, std::io::Error>(String::from_utf8_lossy(&raw).into_owned())
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| LookupError::Timeout)?
        .map_err(LookupError::from)
}

pub(crate) fn parse_whois_response(domain: &str, server: &str, response: &str) -> Result<WhoisInfo, LookupError> {
    let lower = response.to_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Err(LookupError::NotRegistered);
    }

    let mut info = WhoisInfo::new(domain);
    let mut recognised = false;

    for line in response.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if CREATED_KEYS.contains(&key.as_str()) {
            info.created_date = info.created_date.or_else(|| parse_timestamp(value));
        } else if EXPIRY_KEYS.contains(&key.as_str()) {
            info.expiration_date = info.expiration_date.or_else(|| parse_timestamp(value));
        } else if UPDATED_KEYS.contains(&key.as_str()) {
            info.updated_date = info.updated_date.or_else(|| parse_timestamp(value));
        } else if key == "registrar" {
            info.registrar.get_or_insert_with(|| value.to_string());
        } else if key == "name server" || key == "nserver" {
            let ns = value.split_whitespace().next().unwrap_or(value).to_lowercase();
            if !info.name_servers.contains(&ns) {
                info.name_servers.push(ns);
            }
        } else if key == "domain status" || key == "status" {
            let status = value.split_whitespace().next().unwrap_or(value);
            info.status.push(status.to_string());
        } else if key != "domain name" && key != "domain" {
            continue;
        }
        recognised = true;
    }

    if !recognised {
        return Err(LookupError::EmptyResponse(server.to_string()));
    }

    info.source = Some(Source::Whois(server.to_string()));
    Ok(info)
}
