use dashmap::DashMap;
use rand::seq::IndexedRandom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use crate::cache::{CacheEntry, Freshness};
use crate::clock::Clock;
use crate::config::GateConfig;
use crate::metrics::{ADMISSION_REJECTED, CACHE_HITS, CACHE_MISSES, CACHE_SIZE, STALE_SERVED, UPSTREAM_CALLS};
use crate::models::{Pick, Post, PostQuery, ResponseMode};
use crate::rate_limit::RateWindow;
use crate::upstream::{Upstream, UpstreamError};

#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error("Rate limit exceeded. Please try again in {retry_after_secs} seconds.")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("No posts available right now")]
    Unavailable,

    #[error("Upstream failed: {0}")]
    Upstream(#[source] Arc<UpstreamError>),
}

type Outcome = Result<Arc<Vec<Post>>, GateError>;

enum Lookup {
    Serve(Arc<Vec<Post>>),
    Refresh(Option<Arc<Vec<Post>>>),
}

// Per-key refresh slot. The lock serializes refreshes and holds the outcome
// of the last one, `landed` counts how many have finished.
#[derive(Default)]
struct Flight {
    landed: AtomicU64,
    last: tokio::sync::Mutex<Option<Outcome>>,
}

// Cache, cooldown, admission limiter, then at most one bounded upstream call
// per key at a time.
pub struct FetchGate {
    config: GateConfig,
    upstream: Arc<dyn Upstream>,
    clock: Arc<dyn Clock>,
    cache: DashMap<String, CacheEntry>,
    admission: Mutex<RateWindow>,
    flights: DashMap<String, Arc<Flight>>,
}

impl FetchGate {
    pub fn new(config: GateConfig, upstream: Arc<dyn Upstream>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            upstream,
            clock,
            cache: DashMap::new(),
            admission: Mutex::new(RateWindow::new()),
            flights: DashMap::new(),
        }
    }

    pub async fn get_posts(&self, query: &PostQuery) -> Outcome {
        let key = query.cache_key();

        if let Lookup::Serve(posts) = self.lookup(&key) {
            return Ok(posts);
        }

        let flight = self.flight(&key);
        let outcome = self.join_or_refresh(&key, query, &flight).await;

        drop(flight);
        self.flights.remove_if(&key, |_, f| Arc::strong_count(f) == 1);
        outcome
    }

    async fn join_or_refresh(&self, key: &str, query: &PostQuery, flight: &Flight) -> Outcome {
        let seen = flight.landed.load(Ordering::SeqCst);
        let mut last = flight.last.lock().await;

        // a refresh finished while we queued, its outcome is ours too
        if flight.landed.load(Ordering::SeqCst) != seen {
            if let Some(outcome) = last.as_ref() {
                debug!(key, "joined in-flight refresh");
                return outcome.clone();
            }
        }

        let outcome = match self.lookup(key) {
            Lookup::Serve(posts) => return Ok(posts),
            Lookup::Refresh(fallback) => self.refresh(key, query, fallback).await,
        };

        *last = Some(outcome.clone());
        flight.landed.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    pub async fn pick(&self, query: &PostQuery, mode: ResponseMode) -> Result<Pick, GateError> {
        let posts = self.get_posts(query).await?;
        Ok(choose(posts, mode))
    }

    fn lookup(&self, key: &str) -> Lookup {
        let now = self.clock.now();
        let Some(entry) = self.cache.get(key) else {
            return Lookup::Refresh(None);
        };

        match entry.classify(now, self.config.cache_duration, self.config.cooldown) {
            Freshness::Fresh(posts) => {
                CACHE_HITS.inc();
                debug!(key, "cache hit");
                Lookup::Serve(posts)
            }
            Freshness::Cooling(posts) => {
                STALE_SERVED.inc();
                debug!(key, "cooldown active, serving cached posts");
                Lookup::Serve(posts)
            }
            Freshness::Expired(posts) => Lookup::Refresh(Some(posts)),
        }
    }

    async fn refresh(
        &self,
        key: &str,
        query: &PostQuery,
        fallback: Option<Arc<Vec<Post>>>,
    ) -> Outcome {
        CACHE_MISSES.inc();
        let now = self.clock.now();

        if let Err(retry_after_secs) = self.admit(now) {
            ADMISSION_REJECTED.inc();
            warn!(key, retry_after_secs, "upstream admission refused");
            return degrade(key, fallback, GateError::RateLimitExceeded { retry_after_secs });
        }

        UPSTREAM_CALLS.inc();
        info!(key, "fetching fresh posts");

        let result = timeout(self.config.upstream_timeout, self.upstream.fetch_posts(query))
            .await
            .unwrap_or(Err(UpstreamError::Timeout));

        match result {
            Ok(posts) => {
                info!(key, count = posts.len(), "cache refreshed");
                let entry = CacheEntry::new(posts, now);
                let posts = Arc::clone(&entry.posts);
                self.cache.insert(key.to_string(), entry);
                CACHE_SIZE.set(self.cached_keys() as f64);
                Ok(posts)
            }
            Err(e) => {
                warn!(key, error = %e, "upstream fetch failed");
                let err = if e.is_transient() {
                    GateError::Unavailable
                } else {
                    GateError::Upstream(Arc::new(e))
                };
                degrade(key, fallback, err)
            }
        }
    }

    // Check and record under one lock so no other request slips in between
    fn admit(&self, now: Instant) -> Result<(), u64> {
        let mut window = self.admission.lock().unwrap_or_else(|e| e.into_inner());
        window.try_admit(now, self.config.admission)
    }

    fn flight(&self, key: &str) -> Arc<Flight> {
        Arc::clone(self.flights.entry(key.to_string()).or_default().value())
    }

    pub fn cached_keys(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    fn pending_refreshes(&self) -> usize {
        self.flights.len()
    }
}

fn degrade(
    key: &str,
    fallback: Option<Arc<Vec<Post>>>,
    err: GateError,
) -> Outcome {
    match fallback {
        Some(posts) => {
            STALE_SERVED.inc();
            info!(key, reason = %err, "serving stale posts");
            Ok(posts)
        }
        None => Err(err),
    }
}

pub fn choose(posts: Arc<Vec<Post>>, mode: ResponseMode) -> Pick {
    if posts.is_empty() {
        return Pick::NoPosts;
    }

    match mode {
        ResponseMode::All => Pick::All(posts),
        ResponseMode::Random => posts
            .as_slice()
            .choose(&mut rand::rng())
            .cloned()
            .map_or(Pick::NoPosts, Pick::One),
    }
}
