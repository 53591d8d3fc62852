//! Notification throttling
//!
//! Two separate questions are answered here:
//! - [`NotificationThrottle::should_send`]: is this measurement worth pushing?
//!   Yes on a hit edge, on a distance change above `min_delta_cm`, or when the
//!   heartbeat is due.
//! - [`NotificationThrottle::rate_floor_open`]: has enough time passed since
//!   the last notification? A worthwhile measurement is still held back while
//!   the floor is closed.
//!
//! Only [`NotificationThrottle::record_sent`] moves the throttle state, and the
//! caller invokes it once per notification that actually went out.

use crate::config::ThrottleConfig;
use crate::sampler::Measurement;
use crate::time::Instant;

pub struct NotificationThrottle {
    config: ThrottleConfig,
    last_sent_distance: Option<f32>,
    last_sent_time: Option<Instant>,
}

impl NotificationThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            last_sent_distance: None,
            last_sent_time: None,
        }
    }

    pub fn should_send(&self, measurement: &Measurement, edge_fired: bool, now: Instant) -> bool {
        edge_fired || self.distance_changed(measurement) || self.heartbeat_due(now)
    }

    /// False while the last notification is more recent than `min_interval`
    pub fn rate_floor_open(&self, now: Instant) -> bool {
        self.last_sent_time
            .map_or(true, |sent| now.saturating_duration_since(sent) >= self.config.min_interval)
    }

    pub fn record_sent(&mut self, measurement: &Measurement, now: Instant) {
        self.last_sent_distance = Some(measurement.distance);
        self.last_sent_time = Some(now);
    }

    pub fn last_sent_distance(&self) -> Option<f32> {
        self.last_sent_distance
    }

    pub fn last_sent_time(&self) -> Option<Instant> {
        self.last_sent_time
    }

    fn distance_changed(&self, measurement: &Measurement) -> bool {
        self.last_sent_distance.map_or(true, |last| {
            libm::fabsf(measurement.distance - last) > self.config.min_delta_cm
        })
    }

    fn heartbeat_due(&self, now: Instant) -> bool {
        self.last_sent_time
            .map_or(true, |sent| now.saturating_duration_since(sent) > self.config.heartbeat)
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
