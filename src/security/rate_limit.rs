//! Token-bucket limiter for inbound chat requests
//!
//! Every chat request can fan out into many model calls and shell commands,
//! so the endpoint admits a burst of `capacity` requests and then
//! `refill_rate` requests per second.
//!
//! ```text
//!   capacity=4, rate=1/sec
//!
//!   t=0.0  ● ● ● ●   4 requests pass, bucket empty
//!   t=0.1            5th request → 429, retry after ~0.9s
//!   t=1.0  ●         one token refilled
//! ```

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token count and the instant it was last topped up
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

// ═══════════════════════════════════════════════════════════════════════════
// RateLimiter (Token Bucket)
// ═══════════════════════════════════════════════════════════════════════════
// WHAT IT IS:
//   A token bucket shared by every /ai/chat handler through AppState.
//
// HOW TO USE:
//   1. Build one from Settings::rate_limiter() (None when --rate-burst 0)
//   2. Call try_acquire() before running the orchestrator
//   3. On Err, answer 429 with Retry-After = retry_after
//
// EXAMPLE:
//   let limiter = RateLimiter::new(20, 2.0);  // 20 burst, 2/sec
//   if let Err(e) = limiter.try_acquire() {
//       return Err(ServerError::RateLimited(e.retry_after));
//   }
// ═══════════════════════════════════════════════════════════════════════════
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    // ═══════════════════════════════════════════════════════════════════════
    // new(capacity, refill_rate) - Constructor
    // ═══════════════════════════════════════════════════════════════════════
    // ARGUMENTS:
    //   capacity: u32 - Burst size; the bucket starts full
    //   refill_rate: f64 - Tokens added per second (negative clamps to 0)
    //
    // EXAMPLE:
    //   RateLimiter::new(4, 1.0)
    //   → 4 requests pass at once, then one per second
    // ═══════════════════════════════════════════════════════════════════════
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_rate: refill_rate.max(0.0),
            bucket: Mutex::new(Bucket {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // with_defaults() - Defaults for the chat endpoint
    // ═══════════════════════════════════════════════════════════════════════
    // Default: 20 burst, 2 requests/sec
    // One chat request can run dozens of model calls, so the sustained rate
    // stays low.
    // ═══════════════════════════════════════════════════════════════════════
    pub fn with_defaults() -> Self {
        Self::new(20, 2.0)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // try_acquire() - Take one token
    // ═══════════════════════════════════════════════════════════════════════
    // WHAT IT DOES:
    //   1. Refill tokens for the time elapsed since the last call
    //   2. If a whole token is available, consume it and return Ok
    //   3. Otherwise return how long until the next token arrives
    //      (1s when refill_rate is 0)
    // ═══════════════════════════════════════════════════════════════════════
    pub fn try_acquire(&self) -> Result<(), RateLimitError> {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let missing = 1.0 - bucket.tokens;
        let retry_after = if self.refill_rate > 0.0 {
            Duration::from_secs_f64(missing / self.refill_rate)
        } else {
            Duration::from_secs(1)
        };
        Err(RateLimitError { retry_after })
    }

    /// Whole tokens currently available (for monitoring)
    pub fn available_tokens(&self) -> u32 {
        let bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.tokens.floor() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

/// Error returned when a request is rate limited
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitError {
    /// How long to wait before retrying
    pub retry_after: Duration,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rate limited. Retry after {:.1}s", self.retry_after.as_secs_f64())
    }
}

impl std::error::Error for RateLimitError {}
