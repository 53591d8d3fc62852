//! Hit detection
//!
//! Turns the stream of distance measurements into discrete hits.
//!
//! # Hysteresis
//! - `Clear -> Hit` when the distance drops below the threshold; counts one hit
//! - `Hit -> Clear` when the distance is back at or above the threshold
//! - Repeated readings in the same zone change nothing, so a target that
//!   lingers in front of the sensor is still a single hit
//!
//! The counter only moves on the `Clear -> Hit` edge and only goes back to
//! zero through [`HitDetector::reset`].

use crate::config::HitConfig;
use crate::sampler::Measurement;

/// Edge reported by [`HitDetector::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HitEvent {
    /// Target entered the hit zone; `count` is the new total
    HitDetected { count: u32 },
    /// Target left the hit zone
    HitCleared,
}

/// Current classification and running total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HitState {
    pub is_hit: bool,
    pub hit_count: u32,
}

pub struct HitDetector {
    threshold_cm: f32,
    state: HitState,
}

impl HitDetector {
    pub fn new(config: HitConfig) -> Self {
        Self {
            threshold_cm: config.threshold_cm,
            state: HitState::default(),
        }
    }

    pub fn state(&self) -> HitState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_cm
    }

    /// Feeds one measurement, returning the edge it caused, if any
    pub fn update(&mut self, measurement: &Measurement) -> Option<HitEvent> {
        if !measurement.valid {
            return None;
        }

        let in_zone = measurement.distance < self.threshold_cm;
        match (self.state.is_hit, in_zone) {
            (false, true) => {
                self.state.is_hit = true;
                self.state.hit_count = self.state.hit_count.saturating_add(1);
                Some(HitEvent::HitDetected {
                    count: self.state.hit_count,
                })
            }
            (true, false) => {
                self.state.is_hit = false;
                Some(HitEvent::HitCleared)
            }
            _ => None,
        }
    }

    /// Zeroes the counter; the current zone is kept
    pub fn reset(&mut self) {
        self.state.hit_count = 0;
    }
}

impl Default for HitDetector {
    fn default() -> Self {
        Self::new(HitConfig::default())
    }
}
