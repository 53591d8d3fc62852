//! Hardware Resource Management
//!
//! Assigns the pins and peripherals the firmware uses to the tasks that own them.
//!
//! # Resource Groups
//! - Distance Sensor: HC-SR04 trigger and echo pins
//! - Status LED: on-board LED driven by the `led` command
//! - USB: the CDC-ACM link the observer connects through
//!
//! Nothing is shared between tasks, so no resource needs a mutex.

use assign_resources::assign_resources;
use embassy_rp::peripherals::{self, USB};
use embassy_rp::usb::InterruptHandler as UsbInterruptHandler;
use embassy_rp::{bind_interrupts, Peri};

assign_resources! {
    /// HC-SR04 ultrasonic distance sensor pins
    distance_sensor: DistanceSensorResources {
        trigger_pin: PIN_15,
        echo_pin: PIN_14,
    },
    /// On-board status LED
    status_led: StatusLedResources {
        led_pin: PIN_25,
    },
    /// USB device peripheral
    usb: UsbResources {
        usb: USB,
    },
}

bind_interrupts!(pub struct Irqs {
    USBCTRL_IRQ => UsbInterruptHandler<USB>;
});
