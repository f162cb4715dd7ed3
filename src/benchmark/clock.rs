//! Frame timing
//!
//! All timing goes through the [`Clock`] trait so the render loop can be driven
//! by a manual clock in tests. Production code uses [`SystemClock`].

use std::time::{Duration, Instant};

/// Monotonic time source measured from an arbitrary fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall-clock time backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Measures the duration of one complete render iteration, present included.
#[derive(Debug, Default)]
pub struct FrameClock {
    frame_start: Option<Duration>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, clock: &impl Clock) {
        self.frame_start = Some(clock.now());
    }

    /// Frame duration in seconds; zero if `begin` was never called.
    pub fn end(&mut self, clock: &impl Clock) -> f64 {
        match self.frame_start.take() {
            Some(start) => clock.now().saturating_sub(start).as_secs_f64(),
            None => 0.0,
        }
    }
}
