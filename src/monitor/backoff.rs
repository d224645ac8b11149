//! Fixed-range jitter between checks.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::MonitorError;

/// Longest wait a generator may produce: one day.
pub const MAX_WAIT_SECS: u64 = 86_400;

/// Draws each wait uniformly from `[min_wait, max_wait]` whole seconds.
///
/// The range never widens or narrows with failures; an irregular cadence is the
/// only thing it is for.
#[derive(Debug)]
pub struct BackoffGenerator<R = StdRng> {
    min_wait_secs: u64,
    max_wait_secs: u64,
    rng: R,
}

impl BackoffGenerator<StdRng> {
    pub fn new(min_wait_secs: u64, max_wait_secs: u64) -> Result<Self, MonitorError> {
        Self::with_rng(min_wait_secs, max_wait_secs, StdRng::from_os_rng())
    }

    pub fn seeded(min_wait_secs: u64, max_wait_secs: u64, seed: u64) -> Result<Self, MonitorError> {
        Self::with_rng(min_wait_secs, max_wait_secs, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> BackoffGenerator<R> {
    pub fn with_rng(min_wait_secs: u64, max_wait_secs: u64, rng: R) -> Result<Self, MonitorError> {
        if min_wait_secs > max_wait_secs || max_wait_secs > MAX_WAIT_SECS {
            return Err(MonitorError::InvalidBackoff {
                min_wait_secs,
                max_wait_secs,
            });
        }
        Ok(Self {
            min_wait_secs,
            max_wait_secs,
            rng,
        })
    }

    pub fn next(&mut self) -> Duration {
        Duration::from_secs(self.rng.random_range(self.min_wait_secs..=self.max_wait_secs))
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.min_wait_secs),
            Duration::from_secs(self.max_wait_secs),
        )
    }
}
