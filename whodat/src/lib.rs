//! who-dat: whois data, domain age and registration length for many domains
//! over a small JSON HTTP API.

pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod server;

pub use domain::DomainInfo;
pub use error::ApiError;
pub use server::{router, serve, AppState};
