use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::models::Post;

// Cache entry with fetch timestamp, replaced wholesale on refresh
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub posts: Arc<Vec<Post>>,
    pub fetched_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    Fresh(Arc<Vec<Post>>),
    // stale, but still inside the cooldown
    Cooling(Arc<Vec<Post>>),
    Expired(Arc<Vec<Post>>),
}

impl CacheEntry {
    pub fn new(posts: Vec<Post>, fetched_at: Instant) -> Self {
        Self {
            posts: Arc::new(posts),
            fetched_at,
        }
    }

    // An empty batch never counts as a hit
    pub fn classify(&self, now: Instant, cache_duration: Duration, cooldown: Duration) -> Freshness {
        let age = now.saturating_duration_since(self.fetched_at);
        let posts = Arc::clone(&self.posts);

        if !posts.is_empty() && age < cache_duration {
            Freshness::Fresh(posts)
        } else if age < cooldown {
            Freshness::Cooling(posts)
        } else {
            Freshness::Expired(posts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CACHE: Duration = Duration::from_secs(60);
    const COOLDOWN: Duration = Duration::from_secs(15);

    fn entry(posts: Vec<Post>) -> (CacheEntry, Instant) {
        let t0 = Instant::now();
        (CacheEntry::new(posts, t0), t0)
    }

    #[test]
    fn fresh_within_cache_duration() {
        let (entry, t0) = entry(vec![Post::new("1", "hi")]);
        let at = t0 + Duration::from_secs(30);
        assert!(matches!(entry.classify(at, CACHE, COOLDOWN), Freshness::Fresh(_)));
    }

    #[test]
    fn expired_after_cache_duration() {
        let (entry, t0) = entry(vec![Post::new("1", "hi")]);
        let at = t0 + CACHE;
        assert!(matches!(entry.classify(at, CACHE, COOLDOWN), Freshness::Expired(_)));
    }

    #[test]
    fn cooldown_outlasting_cache_keeps_stale_posts() {
        let (entry, t0) = entry(vec![Post::new("1", "hi")]);
        let short_cache = Duration::from_secs(1);
        let at = t0 + Duration::from_secs(5);
        assert!(matches!(
            entry.classify(at, short_cache, COOLDOWN),
            Freshness::Cooling(_)
        ));
    }

    #[test]
    fn empty_batch_is_never_fresh() {
        let (entry, t0) = entry(Vec::new());
        let at = t0 + Duration::from_secs(1);
        assert!(matches!(entry.classify(at, CACHE, COOLDOWN), Freshness::Cooling(_)));

        let at = t0 + COOLDOWN;
        assert!(matches!(entry.classify(at, CACHE, COOLDOWN), Freshness::Expired(_)));
    }
}
