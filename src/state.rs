use std::net::IpAddr;
use std::sync::Arc;
use crate::clock::Clock;
use crate::config::Config;
use crate::gate::FetchGate;
use crate::models::PostQuery;
use crate::rate_limit::KeyedRateLimiter;
use crate::upstream::Upstream;
// app's shared state

pub struct AppState {
    pub gate: FetchGate,
    pub http_limiter: KeyedRateLimiter<IpAddr>, // per client address, all routes but /health and /metrics
    pub default_query: Option<PostQuery>,       // what GET /api/tweets serves
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: &Config, upstream: Arc<dyn Upstream>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let default_query = config
            .username
            .as_ref()
            .map(|name| PostQuery::Search(format!("from:{name}")));

        Arc::new(Self {
            gate: FetchGate::new(config.gate.clone(), upstream, Arc::clone(&clock)),
            http_limiter: KeyedRateLimiter::new(config.http_limit),
            default_query,
            clock,
        })
    }
}
