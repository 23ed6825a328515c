//! monotonic time source used by the reactor's timer wheel and by [`crate::net::IdleTimeout`].

use std::time::Duration;

use tokio::time::Instant;

/// `now() -> monotonic instant`, required monotonic, need not be high resolution beyond 1ms.
///
/// Mirrors the `Clock` collaborator interface of the spec (`spec.md` §6). `Instant` is
/// `tokio::time::Instant` rather than `std::time::Instant` since the reactor's timer wheel is
/// built on `tokio::time` and the two must compare against the same epoch.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// default [`Clock`] backed by the OS monotonic clock (via tokio).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// a [`Clock`] that can be advanced manually, for deterministic tests of idle-timeout and
/// keep-alive behavior without sleeping real wall-clock time.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    pub struct FakeClock {
        base: Instant,
        offset_millis: AtomicU64,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset_millis: AtomicU64::new(0),
            }
        }

        pub fn advance(&self, dur: Duration) {
            self.offset_millis
                .fetch_add(dur.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
        }
    }
}
