//! SmartShot core logic
//!
//! Everything the hit counter decides lives here: ultrasonic sampling,
//! hit detection with hysteresis, notification throttling, telemetry
//! encoding and the control loop tying them together.
//!
//! Hardware is reached through `embedded-hal` traits and the small traits
//! in this crate ([`time::Clock`], [`sampler::DistanceSensor`],
//! [`transport::Transport`]), so the crate builds for the firmware target
//! and for the host test runner alike.

#![cfg_attr(not(test), no_std)]

// must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod control;
pub mod detector;
pub mod sampler;
pub mod telemetry;
pub mod throttle;
pub mod time;
pub mod transport;

pub use config::DeviceConfig;
pub use control::{ControlLoop, DeviceState, SendOutcome, Tick};
pub use detector::{HitDetector, HitEvent, HitState};
pub use sampler::{DistanceSensor, Measurement, RangeSampler};
pub use telemetry::{JsonEncoder, Status, TelemetryEncoder, TelemetryRecord};
pub use throttle::NotificationThrottle;
pub use time::{Clock, Instant};
pub use transport::{ConnectionEvent, Transport, TransportError};
