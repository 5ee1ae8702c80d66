//! Time source for the watchdog, mockable in tests.
//!
//! Tick counts drive most of the controllers. Wall-clock time is only needed
//! where a rule is stated in milliseconds (EDCA minimum switch interval).

use std::fmt::Debug;
use std::time::Instant;

/// Abstracts "now" so time-dependent rules can be exercised deterministically.
pub trait Clock: Send + Sync + Debug {
    /// Current `Instant`.
    fn now(&self) -> Instant;
}

/// The default system clock implementation using `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock for tests and the simulator.
pub mod mock_clock {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct MockClock {
        current_time: Mutex<Instant>,
    }

    impl MockClock {
        /// Creates a new `MockClock` starting at the given `start_time`.
        pub fn new(start_time: Instant) -> Self {
            Self {
                current_time: Mutex::new(start_time),
            }
        }

        /// Advances the clock by `duration`.
        pub fn advance(&self, duration: Duration) {
            let mut current = self
                .current_time
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current += duration;
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new(Instant::now())
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            *self
                .current_time
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }
}
