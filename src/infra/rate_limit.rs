//! [`RateLimiter`] implementations: an in-process sliding window and a Redis fixed window
//! shared by every instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::time::timeout;

use crate::application::gateways::{RateDecision, RateLimitError, RateLimiter};

/// Sliding window kept in process memory. Counts are per instance.
///
/// Keys whose hits have all left the window are swept at most once per window, so the
/// map stays bounded by the callers seen in the last window.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    started: Instant,
    last_sweep_ms: Arc<AtomicU64>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            started: Instant::now(),
            last_sweep_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn allow(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let window = self.window;
        self.sweep_idle(now);

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            let retry_after = entry
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after: retry_after.max(Duration::from_secs(1)),
            };
        }

        entry.push(now);
        // after push, one fewer slot remains
        RateDecision {
            allowed: true,
            remaining: remaining - 1,
            retry_after: Duration::ZERO,
        }
    }

    // Must run before any entry guard is taken: `retain` locks every shard.
    fn sweep_idle(&self, now: Instant) {
        let elapsed_ms = now.duration_since(self.started).as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if elapsed_ms.saturating_sub(last) < self.window.as_millis() as u64 {
            return;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, elapsed_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.last()
                .is_some_and(|latest| now.duration_since(*latest) < window)
        });
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision, RateLimitError> {
        Ok(self.allow(key))
    }
}

/// Fixed window counter in Redis. The key is created with its TTL and incremented in one
/// `MULTI`/`EXEC`, so a cancelled call can never leave a counter without expiry.
#[derive(Clone)]
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    window: Duration,
    max_requests: u32,
    op_timeout: Duration,
    prefix: String,
}

impl RedisRateLimiter {
    pub fn new(manager: ConnectionManager, window: Duration, max_requests: u32) -> Self {
        Self {
            manager,
            window,
            max_requests,
            op_timeout: Duration::from_millis(200),
            prefix: "ratelimit".to_string(),
        }
    }

    async fn hit(&self, key: &str) -> Result<(u32, Option<i64>), redis::RedisError> {
        let mut conn = self.manager.clone();
        let key = format!("{}:{key}", self.prefix);
        let window_secs = self.window.as_secs().max(1);

        let (count, ttl): (u32, i64) = window_pipeline(&key, window_secs)
            .query_async(&mut conn)
            .await?;
        if ttl < 0 {
            // counter written before expiry was set atomically
            let _: () = conn.expire(&key, window_secs as i64).await?;
            return Ok((count, Some(window_secs as i64)));
        }
        Ok((count, (ttl > 0).then_some(ttl)))
    }
}

/// `SET key 0 EX <window> NX`, `INCR key`, `TTL key` as one transaction.
fn window_pipeline(key: &str, window_secs: u64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window_secs)
        .arg("NX")
        .ignore()
        .incr(key, 1)
        .ttl(key);
    pipe
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision, RateLimitError> {
        let (count, ttl) = timeout(self.op_timeout, self.hit(key))
            .await
            .map_err(|_| RateLimitError::Backend("redis timed out".to_string()))?
            .map_err(|err| RateLimitError::Backend(err.to_string()))?;

        Ok(fixed_window_decision(
            count,
            self.max_requests,
            ttl.map(|secs| Duration::from_secs(secs as u64))
                .unwrap_or(self.window),
        ))
    }
}

fn fixed_window_decision(count: u32, max_requests: u32, resets_in: Duration) -> RateDecision {
    if count > max_requests {
        RateDecision {
            allowed: false,
            remaining: 0,
            retry_after: resets_in.max(Duration::from_secs(1)),
        }
    } else {
        RateDecision {
            allowed: true,
            remaining: max_requests - count,
            retry_after: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_blocks_after_ceiling() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);
        let first = limiter.allow("k");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.allow("k").allowed);

        let blocked = limiter.allow("k");
        assert!(!blocked.allowed);
        assert!(blocked.retry_after >= Duration::from_secs(1));
        assert!(blocked.retry_after <= Duration::from_secs(60));

        assert!(limiter.allow("other").allowed);
    }

    #[test]
    fn sliding_window_frees_slots_after_window() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(20), 1);
        assert!(limiter.allow("k").allowed);
        assert!(!limiter.allow("k").allowed);
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.allow("k").allowed);
    }

    #[test]
    fn idle_keys_are_swept_once_their_window_passes() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(5), 3);
        for n in 0..10_000 {
            limiter.allow(&format!("guestbook:read:10.0.{}.{}", n / 256, n % 256));
        }
        std::thread::sleep(Duration::from_millis(20));

        assert!(limiter.allow("guestbook:read:192.0.2.1").allowed);
        assert_eq!(limiter.buckets.len(), 1);
    }

    #[test]
    fn active_keys_survive_a_sweep() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(50), 1);
        assert!(limiter.allow("busy").allowed);
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.allow("fresh").allowed);
        assert!(!limiter.allow("fresh").allowed);
        assert!(limiter.buckets.contains_key("fresh"));
        assert!(!limiter.buckets.contains_key("busy"));
    }

    #[test]
    fn window_counter_sets_expiry_in_the_same_transaction() {
        let packed = window_pipeline("ratelimit:guestbook:write:u1", 60).get_packed_pipeline();
        let wire = String::from_utf8(packed).expect("resp is ascii here");
        let order: Vec<usize> = ["MULTI", "SET", "EX", "NX", "INCR", "TTL", "EXEC"]
            .iter()
            .map(|word| wire.find(&format!("\r\n{word}\r\n")).expect(word))
            .collect();
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{wire:?}");
        assert!(wire.contains("\r\n60\r\n"));
    }

    #[test]
    fn fixed_window_decision_reports_remaining() {
        let ok = fixed_window_decision(3, 5, Duration::from_secs(10));
        assert!(ok.allowed);
        assert_eq!(ok.remaining, 2);

        let at_limit = fixed_window_decision(5, 5, Duration::from_secs(10));
        assert!(at_limit.allowed);
        assert_eq!(at_limit.remaining, 0);

        let over = fixed_window_decision(6, 5, Duration::from_secs(10));
        assert!(!over.allowed);
        assert_eq!(over.retry_after, Duration::from_secs(10));
    }
}
