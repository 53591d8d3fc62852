//! Tunables
//!
//! Every constant the loop depends on, with the defaults the device ships with.
//! The firmware uses `DeviceConfig::default()`; tests build their own.

use core::time::Duration;

/// Sub-samples averaged into one measurement
pub const SAMPLES_PER_MEASUREMENT: u8 = 3;

/// Upper bound for each echo wait (rise and fall). An HC-SR04 echo never
/// lasts longer than ~25ms, so 30ms also covers a disconnected sensor.
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(30);

/// Trigger held low before the pulse
pub const TRIGGER_SETTLE: Duration = Duration::from_micros(2);

/// Trigger pulse width (datasheet minimum is 10us)
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Pause between sub-samples so late echoes of the previous ping die out
pub const SAMPLE_PAUSE: Duration = Duration::from_millis(10);

/// Anything at or beyond this is treated as "nothing in front of the sensor" (cm)
pub const MAX_VALID_DISTANCE: f32 = 400.0;

/// Speed of sound at roughly 20°C (cm/us)
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;

/// Closer than this counts as a hit (cm)
pub const HIT_THRESHOLD: f32 = 20.0;

/// Distance change that is worth a notification (cm)
pub const MIN_DISTANCE_DELTA: f32 = 0.5;

/// Heartbeat: notify at least this often, even with a static target
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Hard floor between two notifications
pub const MIN_NOTIFICATION_INTERVAL: Duration = Duration::from_millis(100);

/// Delay between control loop ticks
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Ultrasonic sampler configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Sub-samples per measurement, at least 1
    pub samples: u8,
    pub echo_timeout: Duration,
    pub trigger_settle: Duration,
    pub trigger_pulse: Duration,
    pub sample_pause: Duration,
    pub max_distance_cm: f32,
    pub speed_of_sound_cm_per_us: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples: SAMPLES_PER_MEASUREMENT,
            echo_timeout: ECHO_TIMEOUT,
            trigger_settle: TRIGGER_SETTLE,
            trigger_pulse: TRIGGER_PULSE,
            sample_pause: SAMPLE_PAUSE,
            max_distance_cm: MAX_VALID_DISTANCE,
            speed_of_sound_cm_per_us: SPEED_OF_SOUND_CM_PER_US,
        }
    }
}

impl SamplerConfig {
    pub fn with_samples(mut self, samples: u8) -> Self {
        self.samples = samples.max(1);
        self
    }

    pub fn with_echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    pub fn with_max_distance(mut self, max_distance_cm: f32) -> Self {
        self.max_distance_cm = max_distance_cm;
        self
    }

    /// Derives the speed of sound from the ambient temperature (°C)
    pub fn with_temperature(mut self, celsius: f32) -> Self {
        let meters_per_second = 331.3 + 0.606 * celsius;
        // m/s -> cm/us
        self.speed_of_sound_cm_per_us = meters_per_second / 10_000.0;
        self
    }

    /// Sub-samples actually taken; a zero setting still takes one
    pub fn sample_count(&self) -> u8 {
        self.samples.max(1)
    }

    /// Converts a round-trip echo width into a one-way distance (cm)
    pub fn distance_from_echo(&self, echo: Duration) -> f32 {
        echo.as_micros() as f32 * self.speed_of_sound_cm_per_us / 2.0
    }

    /// Longest time a single `measure()` can block
    pub fn worst_case_measurement(&self) -> Duration {
        let per_sample = self.trigger_settle + self.trigger_pulse + self.echo_timeout * 2 + self.sample_pause;
        per_sample * u32::from(self.sample_count())
    }
}

/// Hit detector configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitConfig {
    pub threshold_cm: f32,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            threshold_cm: HIT_THRESHOLD,
        }
    }
}

/// Notification throttle configuration.
///
/// The rate floor and the heartbeat are unrelated knobs; changing one never
/// implies changing the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleConfig {
    pub min_delta_cm: f32,
    pub heartbeat: Duration,
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_delta_cm: MIN_DISTANCE_DELTA,
            heartbeat: HEARTBEAT_INTERVAL,
            min_interval: MIN_NOTIFICATION_INTERVAL,
        }
    }
}

/// Everything the device loop needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    pub sampler: SamplerConfig,
    pub hit: HitConfig,
    pub throttle: ThrottleConfig,
    pub tick_interval: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            hit: HitConfig::default(),
            throttle: ThrottleConfig::default(),
            tick_interval: TICK_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_width_maps_to_half_the_round_trip() {
        let config = SamplerConfig::default();
        // 1000us at 0.0343 cm/us is 34.3cm there and back
        let distance = config.distance_from_echo(Duration::from_micros(1_000));
        assert!((distance - 17.15).abs() < 1e-3);
    }

    #[test]
    fn temperature_changes_the_speed_of_sound() {
        let cold = SamplerConfig::default().with_temperature(0.0);
        let warm = SamplerConfig::default().with_temperature(30.0);
        assert!((cold.speed_of_sound_cm_per_us - 0.03313).abs() < 1e-5);
        assert!(warm.speed_of_sound_cm_per_us > cold.speed_of_sound_cm_per_us);
    }

    #[test]
    fn zero_samples_still_measures_once() {
        let mut config = SamplerConfig::default();
        config.samples = 0;
        assert_eq!(config.sample_count(), 1);
        assert_eq!(SamplerConfig::default().with_samples(0).samples, 1);
    }

    #[test]
    fn worst_case_is_bounded_by_timeouts() {
        let config = SamplerConfig::default();
        // 3 * (2us + 10us + 60ms + 10ms)
        assert_eq!(config.worst_case_measurement(), Duration::from_micros(3 * 70_012));
    }

    #[test]
    fn device_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.hit.threshold_cm, 20.0);
        assert_eq!(config.throttle.min_interval, Duration::from_millis(100));
        assert_eq!(config.throttle.heartbeat, Duration::from_millis(500));
    }
}
