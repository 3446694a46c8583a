use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("libwhodat/", env!("CARGO_PKG_VERSION"));

pub fn create_http_pool(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .build()
}
