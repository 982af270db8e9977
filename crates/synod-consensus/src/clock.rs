//! Time and backoff abstractions used by the proposer.
//!
//! Production code sleeps on the tokio timer; tests run the same timer on
//! tokio's paused clock.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of delays for timeouts, scripted pauses and backoff
#[async_trait]
pub trait Clock: Send + Sync {
    /// Sleep for the specified duration
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Randomized retry delay, drawn independently for every retry.
///
/// The delay is uniform in `[min, max)` and scaled by the attempt number,
/// capped at four times the base range.
pub struct Backoff {
    min: Duration,
    max: Duration,
    rng: Mutex<StdRng>,
}

impl Backoff {
    const MAX_SCALE: u32 = 4;

    /// Create a backoff; a fixed `seed` makes the delay sequence reproducible
    pub fn new(min: Duration, max: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Backoff {
            min,
            max: max.max(min),
            rng: Mutex::new(rng),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let scale = attempt.clamp(1, Self::MAX_SCALE);

        let low = self.min.as_micros() as u64;
        let high = self.max.as_micros() as u64;
        let base = if high > low {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            Duration::from_micros(rng.gen_range(low..high))
        } else {
            self.min
        };

        base * scale
    }
}
