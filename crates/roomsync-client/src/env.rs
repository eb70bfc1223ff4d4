//! Production environment backed by tokio time.
//!
//! Uses `tokio::time::Instant` rather than `std::time::Instant` so that tests
//! running on a paused tokio clock observe the same time the state machines
//! are driven with.

use std::time::Duration;

use roomsync_core::Environment;

/// Environment reading the tokio clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_the_clock() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_millis(50)).await;

        assert!(env.now() - start >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn until_saturates_at_zero() {
        let env = SystemEnv::new();
        let past = env.now();
        env.sleep(Duration::from_secs(1)).await;

        assert_eq!(env.until(past), Duration::ZERO);
        assert_eq!(env.until(env.now() + Duration::from_secs(2)), Duration::from_secs(2));
    }
}
