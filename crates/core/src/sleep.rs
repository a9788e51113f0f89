use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{Error, Result};

const SLICE: Duration = Duration::from_millis(20);

/// Shared abort flag. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Aborted)` once the flag is raised.
    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `ms` milliseconds in short slices, returning early with
    /// `Err(Aborted)` if the flag is raised meanwhile.
    pub fn sleep_ms(&self, ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(ms);
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(SLICE.min(deadline - now));
        }
    }

    /// Sleep a uniformly random duration in `[lower, upper]` ms.
    pub fn sleep_between(&self, lower: u64, upper: u64) -> Result<()> {
        self.sleep_ms(jitter_ms(lower, upper))
    }
}

/// Uniform pick in `[lower, upper]`; `lower` when the range is empty.
pub fn jitter_ms(lower: u64, upper: u64) -> u64 {
    if upper <= lower {
        return lower;
    }
    rand::thread_rng().gen_range(lower..=upper)
}
