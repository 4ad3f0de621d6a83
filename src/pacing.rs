//! Pacing between chapter calls, to stay under the text provider's rate limit.

use std::time::Duration;
use tracing::info;

/// Delay after each chapter when nothing else is configured.
pub const DEFAULT_CHAPTER_DELAY_SECS: u64 = 65;

/// Called by the sequencer after every chapter, including the last one.
pub trait Pacer {
    fn wait(&mut self);
}

/// Sleep a fixed duration. Not adaptive to rate-limit headers.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::from_secs(DEFAULT_CHAPTER_DELAY_SECS)
    }
}

impl Pacer for FixedDelay {
    fn wait(&mut self) {
        if self.delay.is_zero() {
            return;
        }
        info!(secs = self.delay.as_secs(), "Waiting before next call");
        std::thread::sleep(self.delay);
    }
}

/// No waiting at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn wait(&mut self) {}
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn wait(&mut self) {
        (**self).wait()
    }
}

impl<P: Pacer + ?Sized> Pacer for Box<P> {
    fn wait(&mut self) {
        (**self).wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn default_delay_is_65_seconds() {
        assert_eq!(FixedDelay::default().delay(), Duration::from_secs(65));
    }

    #[test]
    fn fixed_delay_sleeps_at_least_the_delay() {
        let mut pacer = FixedDelay::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn zero_delay_returns_immediately() {
        let mut pacer = FixedDelay::from_secs(0);
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
