//! Time source for the core, backed by the embassy time driver

use smart_shot_core::{Clock, Instant};

/// Microseconds since boot
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::from_micros(embassy_time::Instant::now().as_micros())
    }
}

/// Converts a core span into an embassy one
pub fn to_embassy(duration: core::time::Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}
