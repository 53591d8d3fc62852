//! Ultrasonic range sampling
//!
//! Drives an HC-SR04 style sensor: a trigger pulse starts a ping, the echo line
//! stays high for the round-trip time of the sound.
//!
//! # Sampling
//! - Each measurement averages up to `samples` pings
//! - Every echo wait (rise and fall) is bounded by `echo_timeout`, checked
//!   against the clock on every poll, so an unplugged sensor cannot hang the loop
//! - Pings that time out or land outside `0 < d < max_distance_cm` are dropped
//!
//! # No echo at all
//! If every ping is dropped the measurement saturates to `max_distance_cm`
//! and is still reported as valid: nothing in range is a normal reading.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::SamplerConfig;
use crate::time::{Clock, Instant};
use core::time::Duration;

/// Why a single ping was dropped
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleError {
    /// Echo line did not change level within the timeout
    #[error("echo wait timed out")]
    Timeout,
    /// Echo decoded to a distance outside the sensor's range
    #[error("distance {0} cm out of range")]
    OutOfRange(f32),
    /// Trigger or echo pin reported an error
    #[error("sensor pin error")]
    Pin,
}

/// One distance reading, produced once per control loop tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Distance in centimeters
    pub distance: f32,
    /// Whether the reading may be used for classification
    pub valid: bool,
    /// Pings that contributed to `distance`, 0 when saturated
    pub accepted: u8,
}

impl Measurement {
    pub fn new(distance: f32, accepted: u8) -> Self {
        Self {
            distance,
            valid: true,
            accepted,
        }
    }

    /// "Nothing detected" reading at the given range limit
    pub fn saturated(max_distance_cm: f32) -> Self {
        Self::new(max_distance_cm, 0)
    }

    pub fn invalid() -> Self {
        Self {
            distance: 0.0,
            valid: false,
            accepted: 0,
        }
    }
}

/// Anything that can produce a distance measurement per tick
pub trait DistanceSensor {
    fn measure(&mut self) -> Measurement;
}

impl<S: DistanceSensor + ?Sized> DistanceSensor for &mut S {
    fn measure(&mut self) -> Measurement {
        (**self).measure()
    }
}

/// Trigger/echo driver with averaging and timeout rejection
pub struct RangeSampler<T, E, D, C> {
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
    config: SamplerConfig,
}

impl<T, E, D, C> RangeSampler<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: Clock,
{
    pub fn new(trigger: T, echo: E, delay: D, clock: C, config: SamplerConfig) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Fires one ping and converts its echo into a distance
    pub fn sample(&mut self) -> Result<f32, SampleError> {
        self.fire_trigger()?;

        let timeout = self.config.echo_timeout;
        let rise = self.wait_for_echo(true, timeout)?;
        let fall = self.wait_for_echo(false, timeout)?;

        let distance = self.config.distance_from_echo(fall.saturating_duration_since(rise));
        if distance > 0.0 && distance < self.config.max_distance_cm {
            Ok(distance)
        } else {
            Err(SampleError::OutOfRange(distance))
        }
    }

    fn fire_trigger(&mut self) -> Result<(), SampleError> {
        self.trigger.set_low().map_err(|_| SampleError::Pin)?;
        self.delay.delay_us(micros(self.config.trigger_settle));
        self.trigger.set_high().map_err(|_| SampleError::Pin)?;
        self.delay.delay_us(micros(self.config.trigger_pulse));
        self.trigger.set_low().map_err(|_| SampleError::Pin)
    }

    /// Polls the echo line until it reads `high`, giving up after `timeout`.
    /// Returns the time the level was first seen.
    fn wait_for_echo(&mut self, high: bool, timeout: Duration) -> Result<Instant, SampleError> {
        let deadline = self.clock.now() + timeout;
        loop {
            if self.echo.is_high().map_err(|_| SampleError::Pin)? == high {
                return Ok(self.clock.now());
            }
            if self.clock.now() > deadline {
                return Err(SampleError::Timeout);
            }
        }
    }
}

impl<T, E, D, C> DistanceSensor for RangeSampler<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: Clock,
{
    fn measure(&mut self) -> Measurement {
        let samples = self.config.sample_count();
        let mut sum = 0.0;
        let mut accepted: u8 = 0;

        for index in 0..samples {
            match self.sample() {
                Ok(distance) => {
                    sum += distance;
                    accepted += 1;
                }
                Err(e) => debug!("ping {} dropped: {}", index, e),
            }
            if index + 1 < samples {
                self.delay.delay_us(micros(self.config.sample_pause));
            }
        }

        if accepted == 0 {
            debug!("no valid echo, reporting {} cm", self.config.max_distance_cm);
            return Measurement::saturated(self.config.max_distance_cm);
        }
        Measurement::new(sum / f32::from(accepted), accepted)
    }
}

fn micros(duration: Duration) -> u32 {
    u32::try_from(duration.as_micros()).unwrap_or(u32::MAX)
}

#[cfg(test)]
pub(crate) mod bench {
    //! Simulated sensor wiring: the echo pin answers each trigger pulse with a
    //! scripted echo, and every pin poll or delay advances a shared clock.

    use super::*;
    use core::cell::{Cell, RefCell};
    use core::convert::Infallible;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Time between the trigger falling edge and the echo rising
    pub const ECHO_LATENCY_US: u64 = 200;

    #[derive(Debug, Clone, Copy)]
    pub enum Echo {
        /// Echo high for this many microseconds
        Pulse(u64),
        /// Echo never rises
        Silent,
        /// Echo rises and never falls
        Stuck,
    }

    #[derive(Default)]
    pub struct Bench {
        now_us: Cell<u64>,
        trigger_high: Cell<bool>,
        pulses: Cell<usize>,
        last_fall_us: Cell<u64>,
        script: RefCell<Vec<Echo>>,
    }

    impl Bench {
        pub fn new(script: &[Echo]) -> Rc<Self> {
            let bench = Rc::new(Self::default());
            bench.script.borrow_mut().extend_from_slice(script);
            bench
        }

        pub fn now_us(&self) -> u64 {
            self.now_us.get()
        }

        pub fn pulses(&self) -> usize {
            self.pulses.get()
        }

        fn advance(&self, us: u64) {
            self.now_us.set(self.now_us.get() + us);
        }

        fn echo_level(&self) -> bool {
            let Some(index) = self.pulses.get().checked_sub(1) else {
                return false;
            };
            let start = self.last_fall_us.get() + ECHO_LATENCY_US;
            let now = self.now_us.get();
            match self.script.borrow().get(index) {
                Some(Echo::Pulse(width)) => now >= start && now < start + width,
                Some(Echo::Stuck) => now >= start,
                Some(Echo::Silent) | None => false,
            }
        }
    }

    pub struct Trigger(pub Rc<Bench>);
    pub struct EchoPin(pub Rc<Bench>);
    pub struct BenchDelay(pub Rc<Bench>);
    pub struct BenchClock(pub Rc<Bench>);

    impl embedded_hal::digital::ErrorType for Trigger {
        type Error = Infallible;
    }

    impl OutputPin for Trigger {
        fn set_low(&mut self) -> Result<(), Infallible> {
            if self.0.trigger_high.replace(false) {
                self.0.pulses.set(self.0.pulses.get() + 1);
                self.0.last_fall_us.set(self.0.now_us.get());
            }
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.trigger_high.set(true);
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for EchoPin {
        type Error = Infallible;
    }

    impl InputPin for EchoPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            // each poll costs a microsecond
            self.0.advance(1);
            Ok(self.0.echo_level())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    impl DelayNs for BenchDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.advance(u64::from(ns).div_ceil(1_000));
        }
    }

    impl Clock for BenchClock {
        fn now(&self) -> Instant {
            Instant::from_micros(self.0.now_us())
        }
    }

    pub type BenchSampler = RangeSampler<Trigger, EchoPin, BenchDelay, BenchClock>;

    pub fn sampler(bench: &Rc<Bench>, config: SamplerConfig) -> BenchSampler {
        RangeSampler::new(
            Trigger(bench.clone()),
            EchoPin(bench.clone()),
            BenchDelay(bench.clone()),
            BenchClock(bench.clone()),
            config,
        )
    }

    /// Echo width for a target at `cm` with the default speed of sound
    pub fn echo_for(cm: f32) -> Echo {
        Echo::Pulse((cm * 2.0 / crate::config::SPEED_OF_SOUND_CM_PER_US) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::bench::*;
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 0.05, "expected ~{expected}, got {actual}");
    }

    #[test]
    fn single_ping_converts_echo_width() {
        let bench = Bench::new(&[echo_for(25.0)]);
        let mut sampler = sampler(&bench, SamplerConfig::default().with_samples(1));
        assert_close(sampler.sample().unwrap(), 25.0);
        assert_eq!(bench.pulses(), 1);
    }

    #[test]
    fn measurement_averages_accepted_pings() {
        let bench = Bench::new(&[echo_for(10.0), echo_for(20.0), echo_for(30.0)]);
        let m = sampler(&bench, SamplerConfig::default()).measure();
        assert!(m.valid);
        assert_eq!(m.accepted, 3);
        assert_close(m.distance, 20.0);
        assert_eq!(bench.pulses(), 3);
    }

    #[test]
    fn timed_out_pings_do_not_count() {
        let bench = Bench::new(&[echo_for(12.0), Echo::Silent, echo_for(14.0)]);
        let m = sampler(&bench, SamplerConfig::default()).measure();
        assert_eq!(m.accepted, 2);
        assert_close(m.distance, 13.0);
    }

    #[test]
    fn out_of_range_pings_do_not_count() {
        // 25ms of echo is ~429cm, beyond the 400cm limit
        let bench = Bench::new(&[Echo::Pulse(25_000), echo_for(50.0), Echo::Pulse(25_000)]);
        let m = sampler(&bench, SamplerConfig::default()).measure();
        assert_eq!(m.accepted, 1);
        assert_close(m.distance, 50.0);
    }

    #[test]
    fn out_of_range_is_reported_per_ping() {
        let bench = Bench::new(&[Echo::Pulse(25_000)]);
        let mut sampler = sampler(&bench, SamplerConfig::default());
        assert!(matches!(sampler.sample(), Err(SampleError::OutOfRange(d)) if d > 400.0));
    }

    #[test]
    fn no_valid_ping_saturates_to_max_distance() {
        let bench = Bench::new(&[Echo::Silent, Echo::Stuck, Echo::Pulse(25_000)]);
        let m = sampler(&bench, SamplerConfig::default()).measure();
        assert_eq!(m, Measurement::saturated(400.0));
        assert!(m.valid);
        assert_eq!(m.accepted, 0);
    }

    #[test]
    fn saturation_follows_configured_limit() {
        let bench = Bench::new(&[Echo::Silent]);
        let config = SamplerConfig::default().with_samples(1).with_max_distance(250.0);
        assert_eq!(sampler(&bench, config).measure().distance, 250.0);
    }

    #[test]
    fn disconnected_sensor_blocks_for_a_bounded_time() {
        let bench = Bench::new(&[Echo::Stuck, Echo::Silent, Echo::Stuck]);
        let config = SamplerConfig::default();
        let _ = sampler(&bench, config).measure();
        let bound = config.worst_case_measurement().as_micros() as u64;
        // latency plus a poll or two of slack per wait
        let slack = 3 * (ECHO_LATENCY_US + 10);
        assert!(bench.now_us() <= bound + slack, "took {}us", bench.now_us());
    }

    #[test]
    fn stuck_echo_times_out_on_the_fall() {
        let bench = Bench::new(&[Echo::Stuck]);
        let mut sampler = sampler(&bench, SamplerConfig::default());
        assert_eq!(sampler.sample(), Err(SampleError::Timeout));
    }
}
