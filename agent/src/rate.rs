//! Per-peer request throttling.
//!
//! Each peer (the host portion of the remote address) gets a token bucket
//! created lazily on first arrival. Buckets refill continuously and are
//! never evicted; state is process-local, so replicas do not coordinate.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

pub const DEFAULT_RATE: f64 = 10.0;
pub const DEFAULT_BURST: f64 = 10.0;

#[derive(Debug)]
pub struct RateGovernor {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rate: f64,
    burst: f64,
}

impl RateGovernor {
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate,
            burst,
        }
    }

    /// Takes one token from `peer`'s bucket, returning false when the
    /// bucket is empty.
    pub fn allow(&self, peer: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(peer.to_string())
            .or_insert_with(|| TokenBucket::full(self.burst, now));
        bucket.take(now, self.rate, self.burst)
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_RATE, DEFAULT_BURST)
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    refreshed: Instant,
}

impl TokenBucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            refreshed: now,
        }
    }

    fn take(&mut self, now: Instant, rate: f64, burst: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.refreshed).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.refreshed = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn burst_then_exhausted() {
        let governor = RateGovernor::new(1.0, 1.0);
        assert!(governor.allow("10.0.0.1"));
        assert!(!governor.allow("10.0.0.1"), "second call within the refill window");
    }

    #[test]
    fn peers_are_independent() {
        let governor = RateGovernor::new(1.0, 1.0);
        assert!(governor.allow("10.0.0.1"));
        assert!(governor.allow("10.0.0.2"));
        assert!(!governor.allow("10.0.0.1"));
    }

    #[test]
    fn refills_over_time() {
        let governor = RateGovernor::new(50.0, 1.0);
        assert!(governor.allow("10.0.0.1"));
        assert!(!governor.allow("10.0.0.1"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(governor.allow("10.0.0.1"));
    }

    #[test]
    fn default_burst_admits_ten() {
        let governor = RateGovernor::default();
        for i in 0..10 {
            assert!(governor.allow("10.0.0.1"), "request {i}");
        }
        assert!(!governor.allow("10.0.0.1"));
    }
}
