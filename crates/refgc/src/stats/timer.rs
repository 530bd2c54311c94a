//! GC Timer - Timing Utilities

use std::time::{Duration, Instant};

/// GcTimer - wall-clock timer for cycles, phases and finalizers
#[derive(Debug, Clone, Copy)]
pub struct GcTimer {
    start: Instant,
}

impl GcTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }
}

impl Default for GcTimer {
    fn default() -> Self {
        Self::new()
    }
}
