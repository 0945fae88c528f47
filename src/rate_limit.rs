use dashmap::DashMap;
use std::collections::VecDeque;
use std::hash::Hash;
use std::time::{Duration, Instant};
use crate::config::RateLimitConfig;

/// Sliding log of recent admissions. Every entry is younger than the window
/// once `prune` has run.
#[derive(Debug, Default)]
pub struct RateWindow {
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.admitted.pop_front();
        }
    }

    /// Checks and records in one step. On rejection nothing is recorded and
    /// the error carries the whole seconds until the oldest entry ages out.
    pub fn try_admit(&mut self, now: Instant, limit: RateLimitConfig) -> Result<(), u64> {
        self.prune(now, limit.window);

        if self.len() >= limit.max_requests as usize {
            let oldest = self.admitted.front().copied().unwrap_or(now);
            let remaining = limit.window.saturating_sub(now.saturating_duration_since(oldest));
            return Err(retry_after_secs(remaining));
        }

        self.admitted.push_back(now);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}

// ceil to whole seconds, never zero
fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_nanos().div_ceil(1_000_000_000);
    u64::try_from(secs).unwrap_or(u64::MAX).max(1)
}

pub struct KeyedRateLimiter<K: Eq + Hash> {
    windows: DashMap<K, RateWindow>,
    limit: RateLimitConfig,
}

impl<K: Eq + Hash + Clone> KeyedRateLimiter<K> {
    pub fn new(limit: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
        }
    }

    pub fn check(&self, key: &K, now: Instant) -> Result<(), u64> {
        let mut window = self.windows.entry(key.clone()).or_default();
        window.try_admit(now, self.limit)
    }

    // Drops keys whose windows have fully drained
    pub fn evict_idle(&self, now: Instant) {
        let window = self.limit.window;
        self.windows.retain(|_, w| {
            w.prune(now, window);
            !w.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
