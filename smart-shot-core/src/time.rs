//! Monotonic time as seen by the control loop
//!
//! Timestamps are microseconds since an arbitrary epoch (boot, on the device).
//! Spans use `core::time::Duration`.

use core::ops::Add;
use core::time::Duration;

/// Point in time with microsecond resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant {
    micros: u64,
}

impl Instant {
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self {
            micros: millis.saturating_mul(1_000),
        }
    }

    pub const fn as_micros(&self) -> u64 {
        self.micros
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_micros(self.micros.saturating_sub(earlier.micros))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Instant::from_micros(self.micros.saturating_add(micros))
    }
}

/// Source of the current time
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
