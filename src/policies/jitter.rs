//! # Jitter for retry delays.
//!
//! Workers that lose the same input tend to fail together (every worker reading
//! one dropped API connection, say). [`JitterPolicy`] spreads their retries so
//! they do not hammer the dependency in lockstep.

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay/2, delay]`.
    Equal,
    /// Uniform in `[floor, min(3 × delay, max)]`; may exceed the base delay.
    Decorrelated,
}

impl JitterPolicy {
    /// Jitters `delay`. `floor` and `max` bound the decorrelated range only.
    pub fn spread(self, delay: Duration, floor: Duration, max: Duration) -> Duration {
        let ms = millis(delay);
        let (lo, hi) = match self {
            JitterPolicy::None => return delay,
            JitterPolicy::Full => (0, ms),
            JitterPolicy::Equal => (ms / 2, ms),
            JitterPolicy::Decorrelated => {
                let lo = millis(floor);
                (lo, ms.saturating_mul(3).min(millis(max)).max(lo))
            }
        };
        if lo >= hi {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
