//! Control loop
//!
//! One [`ControlLoop`] owns the sensor, the transport, the status LED and the
//! [`DeviceState`]. Each tick it measures, classifies and, when the throttle
//! agrees and an observer is attached, pushes a sensor record.
//!
//! # Events
//! Connection events and commands only flip flags in [`DeviceState`]
//! ([`ControlLoop::handle_event`]); [`ControlLoop::on_event`] then runs the
//! follow-up the flags ask for:
//! - `Connected`: an immediate measure+send cycle so the observer sees the
//!   current state right away
//! - `Disconnected`: the transport goes back to advertising; counting goes on
//! - `reset`: counter to zero, then an immediate measure+send cycle
//! - `led` / `status`: LED record back to the observer

use embedded_hal::digital::{OutputPin, PinState};

use crate::command::{self, Command};
use crate::config::DeviceConfig;
use crate::detector::{HitDetector, HitEvent, HitState};
use crate::sampler::{DistanceSensor, Measurement};
use crate::telemetry::{EncodeError, JsonEncoder, TelemetryEncoder, TelemetryRecord, PAYLOAD_CAPACITY};
use crate::throttle::NotificationThrottle;
use crate::time::Instant;
use crate::transport::{ConnectionEvent, Transport, TransportError};

/// Why a record did not make it out
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}

/// What happened to the sensor record on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendOutcome {
    /// Nothing worth pushing
    NotDue,
    /// Worth pushing but nobody is listening
    NotConnected,
    /// Worth pushing but the last notification is too recent
    RateLimited,
    Sent,
    /// Encoding or the transport failed; the next trigger tries again
    Failed,
}

/// Result of one control loop tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick {
    pub measurement: Measurement,
    pub event: Option<HitEvent>,
    pub outcome: SendOutcome,
}

/// All mutable device state, owned by the control loop
pub struct DeviceState {
    pub detector: HitDetector,
    pub throttle: NotificationThrottle,
    /// LED level last driven successfully
    pub led_on: bool,
    refresh_requested: bool,
    led_report_requested: bool,
}

impl DeviceState {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            detector: HitDetector::new(config.hit),
            throttle: NotificationThrottle::new(config.throttle),
            led_on: false,
            refresh_requested: false,
            led_report_requested: false,
        }
    }

    pub fn hits(&self) -> HitState {
        self.detector.state()
    }

    /// An immediate measure+send cycle is pending
    pub fn refresh_requested(&self) -> bool {
        self.refresh_requested
    }

    pub fn led_report_requested(&self) -> bool {
        self.led_report_requested
    }
}

pub struct ControlLoop<S, T, L, E = JsonEncoder> {
    sensor: S,
    transport: T,
    led: L,
    encoder: E,
    state: DeviceState,
    payload: [u8; PAYLOAD_CAPACITY],
}

impl<S, T, L> ControlLoop<S, T, L, JsonEncoder>
where
    S: DistanceSensor,
    T: Transport,
    L: OutputPin,
{
    pub fn new(sensor: S, transport: T, led: L, config: &DeviceConfig) -> Self {
        Self::with_encoder(sensor, transport, led, JsonEncoder, config)
    }
}

impl<S, T, L, E> ControlLoop<S, T, L, E>
where
    S: DistanceSensor,
    T: Transport,
    L: OutputPin,
    E: TelemetryEncoder,
{
    pub fn with_encoder(sensor: S, transport: T, led: L, encoder: E, config: &DeviceConfig) -> Self {
        Self {
            sensor,
            transport,
            led,
            encoder,
            state: DeviceState::new(config),
            payload: [0; PAYLOAD_CAPACITY],
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// One loop iteration: measure, classify, and push if worthwhile
    pub async fn tick(&mut self, now: Instant) -> Tick {
        let measurement = self.sensor.measure();
        let event = self.state.detector.update(&measurement);
        match event {
            Some(HitEvent::HitDetected { count }) => info!("hit #{} at {} cm", count, measurement.distance),
            Some(HitEvent::HitCleared) => debug!("hit cleared at {} cm", measurement.distance),
            None => {}
        }

        let refresh = self.state.refresh_requested;
        let worthwhile = refresh || self.state.throttle.should_send(&measurement, event.is_some(), now);
        let outcome = if !worthwhile {
            SendOutcome::NotDue
        } else if !self.transport.is_connected() {
            self.state.refresh_requested = false;
            SendOutcome::NotConnected
        } else if !self.state.throttle.rate_floor_open(now) {
            // a pending refresh stays pending until the floor opens
            SendOutcome::RateLimited
        } else {
            self.state.refresh_requested = false;
            let hits = self.state.detector.state();
            match self.transmit(&TelemetryRecord::sensor(measurement.distance, hits.hit_count)).await {
                Ok(()) => {
                    self.state.throttle.record_sent(&measurement, now);
                    SendOutcome::Sent
                }
                Err(e) => {
                    warn!("sensor notification dropped: {}", e);
                    SendOutcome::Failed
                }
            }
        };

        Tick {
            measurement,
            event,
            outcome,
        }
    }

    /// Applies an event to the device state; nothing is pushed to the observer here
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => {
                info!("observer connected");
                self.state.refresh_requested = true;
            }
            ConnectionEvent::Disconnected => {
                info!("observer disconnected, advertising");
                self.state.refresh_requested = false;
                self.state.led_report_requested = false;
                self.transport.start_advertising();
            }
            ConnectionEvent::CommandReceived(bytes) => match command::parse(&bytes) {
                Some(Command::Reset) => {
                    info!("hit counter reset");
                    self.state.detector.reset();
                    self.state.refresh_requested = true;
                }
                Some(Command::Led(on)) => {
                    match self.led.set_state(PinState::from(on)) {
                        Ok(()) => self.state.led_on = on,
                        Err(_) => warn!("status led could not be driven"),
                    }
                    self.state.led_report_requested = true;
                }
                Some(Command::Status) => {
                    self.state.led_report_requested = true;
                }
                None => debug!("ignoring unrecognized command ({} bytes)", bytes.len()),
            },
        }
    }

    /// Applies an event and runs whatever it asked for.
    /// Returns the tick if an immediate measure+send cycle ran.
    pub async fn on_event(&mut self, event: ConnectionEvent, now: Instant) -> Option<Tick> {
        self.handle_event(event);

        if self.state.led_report_requested {
            self.report_led().await;
        }
        if self.state.refresh_requested {
            return Some(self.tick(now).await);
        }
        None
    }

    async fn report_led(&mut self) {
        self.state.led_report_requested = false;
        if !self.transport.is_connected() {
            return;
        }
        if let Err(e) = self.transmit(&TelemetryRecord::led(self.state.led_on)).await {
            warn!("led report dropped: {}", e);
        }
    }

    async fn transmit(&mut self, record: &TelemetryRecord) -> Result<(), SendError> {
        let len = self.encoder.encode(record, &mut self.payload)?;
        self.transport.notify(&self.payload[..len]).await?;
        trace!("notified {} bytes", len);
        Ok(())
    }
}
