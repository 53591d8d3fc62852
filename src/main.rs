//! SmartShot firmware entry point
//!
//! Brings up the USB link and spawns the hit monitor.

#![no_std]
#![no_main]

use crate::task::{
    hit_monitor::hit_monitor,
    usb_link::{self, link_events, usb_device},
};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use system::resources::{
    AssignedResources, DistanceSensorResources, StatusLedResources, UsbResources,
};
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Firmware plumbing
mod system;
/// Task implementations
mod task;

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Split the resources into separate groups for each task
    let r = split_resources!(p);

    let link = usb_link::init(r.usb);

    // USB must be running before the monitor starts pushing notifications
    spawner.spawn(usb_device(link.device)).unwrap();
    spawner.spawn(link_events(link.receiver, link.control)).unwrap();
    spawner
        .spawn(hit_monitor(r.distance_sensor, r.status_led, link.transport))
        .unwrap();
}
