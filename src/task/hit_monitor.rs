//! Hit monitor
//!
//! Runs the control loop: one measurement every tick, link events in between.
//!
//! # Sensor Operation
//! - HC-SR04 driven directly from two GPIOs, 3 pings averaged per tick
//! - Echo waits are bounded at 30ms each, so an unplugged sensor costs at most
//!   a few hundred milliseconds and never blocks the executor for good
//! - No echo reads as 400cm ("nothing there")
//!
//! # Hit Detection
//! - Anything closer than 20cm is a hit, counted once per entry
//! - The counter survives disconnects and is only cleared by a `reset` command
//!
//! # Notifications
//! - Sent on hit edges, distance changes above 0.5cm and every 500ms otherwise
//! - Never more often than every 100ms
//! - A newly connected observer gets the current state right away

use defmt::{debug, info};
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_time::{Delay, Ticker};
use smart_shot_core::{Clock, ControlLoop, DeviceConfig, RangeSampler, SendOutcome};

use crate::system::clock::{self, SystemClock};
use crate::system::event;
use crate::system::resources::{DistanceSensorResources, StatusLedResources};
use crate::task::usb_link::UsbTransport;

/// Control loop task, sole owner of the device state
#[embassy_executor::task]
pub async fn hit_monitor(sensor: DistanceSensorResources, led: StatusLedResources, transport: UsbTransport) {
    let config = DeviceConfig::default();
    info!(
        "Hit monitor started: threshold {} cm, {} pings per tick",
        config.hit.threshold_cm,
        config.sampler.samples
    );

    let trigger = Output::new(sensor.trigger_pin, Level::Low);
    let echo = Input::new(sensor.echo_pin, Pull::None);
    let led = Output::new(led.led_pin, Level::Low);
    let sampler = RangeSampler::new(trigger, echo, Delay, SystemClock, config.sampler);

    let mut control = ControlLoop::new(sampler, transport, led, &config);
    let mut ticker = Ticker::every(clock::to_embassy(config.tick_interval));

    loop {
        match select(ticker.next(), event::wait()).await {
            Either::First(_) => {
                let tick = control.tick(SystemClock.now()).await;
                if tick.outcome == SendOutcome::Sent {
                    debug!("{} cm, {} hits", tick.measurement.distance, control.state().hits().hit_count);
                }
            }
            Either::Second(event) => {
                if let Some(tick) = control.on_event(event, SystemClock.now()).await {
                    debug!("refresh: {}", tick.outcome);
                }
            }
        }
    }
}
