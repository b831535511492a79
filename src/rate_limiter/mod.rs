//! Outbound throttle for storefront API calls.
//!
//! Storefront platforms enforce per-shop call budgets, so every call the
//! engine makes (sweeps, toggles, undo) goes through one shared token
//! bucket per store. The bucket refills continuously at `rate_per_sec`
//! and holds at most `burst` tokens.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(burst: f64) -> Self {
        Self {
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, rate_per_sec: f64, burst: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate_per_sec).min(burst);
        self.last_refill = now;
    }
}

/// Per-store token bucket shared by every code path that talks to the
/// storefront.
#[derive(Debug, Clone)]
pub struct StorefrontThrottle {
    buckets: Arc<DashMap<Uuid, Arc<Mutex<TokenBucket>>>>,
    rate_per_sec: f64,
    burst: f64,
}

impl StorefrontThrottle {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rate_per_sec,
            burst: f64::from(burst.max(1)),
        }
    }

    /// Takes one token for the store, waiting for a refill when the bucket
    /// is empty. Callers for the same store queue behind the bucket lock,
    /// which keeps their calls in arrival order.
    pub async fn acquire(&self, store_id: Uuid) {
        let bucket = self
            .buckets
            .entry(store_id)
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(self.burst))))
            .clone();

        let mut bucket = bucket.lock().await;
        loop {
            bucket.refill(self.rate_per_sec, self.burst);
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return;
            }

            let shortfall = 1.0 - bucket.tokens;
            let wait = Duration::from_secs_f64(shortfall / self.rate_per_sec);
            debug!(
                "Storefront throttle exhausted for store {}, waiting {:?}",
                store_id, wait
            );
            crate::metrics::increment_counter("storefront_throttle_waits_total");
            tokio::time::sleep(wait).await;
        }
    }
}
