// Jitter Source Port (for deterministic testing)

use rand::Rng;

/// Source of the random component added to retry backoff
pub trait JitterSource: Send + Sync {
    /// Uniform sample in `0..=max_ms`
    fn jitter_ms(&self, max_ms: u64) -> u64;
}

/// Thread-local RNG jitter (production)
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter_ms(&self, max_ms: u64) -> u64 {
        if max_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=max_ms)
    }
}

/// Constant jitter (tests)
pub struct FixedJitter(pub u64);

impl JitterSource for FixedJitter {
    fn jitter_ms(&self, max_ms: u64) -> u64 {
        self.0.min(max_ms)
    }
}
