use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One token bucket per upstream RDAP base URL or WHOIS host.
pub struct EndpointRateLimiters {
    limiters: DashMap<String, Arc<Limiter>>,
    quota: Quota,
}

impl EndpointRateLimiters {
    pub fn new(default_rate_per_second: u32) -> Self {
        let rate = NonZeroU32::new(default_rate_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiters: DashMap::new(),
            quota: Quota::per_second(rate),
        }
    }

    pub async fn acquire(&self, endpoint: &str) {
        let limiter = self.get_or_create(endpoint);
        limiter.until_ready().await;
    }

    fn get_or_create(&self, endpoint: &str) -> Arc<Limiter> {
        self.limiters
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone()
    }
}
