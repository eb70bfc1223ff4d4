//! Environment abstraction for deterministic testing.
//!
//! Decouples synchronization logic from wall-clock time. The state machines in
//! this crate never read a clock themselves; callers pass `now` in. Drivers
//! read it from an [`Environment`], which is backed by tokio time in
//! production and by paused or virtual time in tests.

use std::{
    fmt::Debug,
    ops::{Add, Sub},
    time::Duration,
};

/// Bounds every instant type used by the state machines must satisfy.
///
/// Blanket-implemented for anything that qualifies, including
/// `std::time::Instant` and `tokio::time::Instant`.
pub trait MonotonicInstant:
    Copy + Ord + Send + Sync + Debug + Sub<Output = Duration> + Add<Duration, Output = Self>
{
}

impl<T> MonotonicInstant for T where
    T: Copy + Ord + Send + Sync + Debug + Sub<Output = Duration> + Add<Duration, Output = Self>
{
}

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    type Instant: MonotonicInstant;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this. State machines receive deadlines as data.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Time remaining until `deadline`, zero if it already passed.
    fn until(&self, deadline: Self::Instant) -> Duration {
        let now = self.now();
        if deadline > now { deadline - now } else { Duration::ZERO }
    }
}
