//! Registration lookups for many domains at once.
//!
//! Each domain is resolved over RDAP (base URLs from the IANA bootstrap file),
//! falling back to a port-43 WHOIS query when RDAP has nothing for the TLD.
//! The HTTP layer only sees the [`MultiWhois`] trait.

mod dates;
mod endpoint;
mod error;
mod http;
mod ratelimit;
mod rdap;
mod resolver;
mod types;
mod whois;

pub use dates::parse_timestamp;
pub use endpoint::{EndpointError, EndpointRegistry};
pub use error::{LookupError, ResolveError};
pub use resolver::{MultiWhois, Resolver};
pub use types::{Lookup, ResolverConfig, Source, WhoisInfo};
pub use whois::{WhoisServer, WhoisServers};
