//! USB link
//!
//! The observer talks to the device through a USB CDC-ACM serial port.
//!
//! # Outbound
//! - Every notification is one JSON record followed by `\n`
//! - Records longer than a packet are split into max-size packets, with a
//!   zero-length packet when the frame ends on a packet boundary
//! - Writes are bounded by a timeout so a host that stops reading cannot stall
//!   the hit monitor
//!
//! # Inbound
//! - Commands are newline-delimited; a short packet also ends a command
//! - An overlong command is dropped up to its line end
//! - Each complete command is queued as a `CommandReceived` event
//!
//! # Connection
//! The port counts as connected once the host has configured the device and
//! asserted DTR (a terminal or app opened the port). Opening or closing the
//! port and losing the configuration are reported as `Connected`/`Disconnected`
//! events, from the same two signals `UsbTransport::is_connected` reads.

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_time::{with_timeout, Duration};
use embassy_usb::class::cdc_acm::{CdcAcmClass, ControlChanged, Receiver, Sender, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config, UsbDevice};
use heapless::Vec;
use smart_shot_core::telemetry::PAYLOAD_CAPACITY;
use smart_shot_core::command::LineBuffer;
use smart_shot_core::transport::PortMonitor;
use smart_shot_core::{ConnectionEvent, Transport, TransportError};
use static_cell::StaticCell;

use crate::system::event;
use crate::system::resources::{Irqs, UsbResources};

pub type UsbDriver = Driver<'static, USB>;

/// Full-speed bulk endpoint size
const MAX_PACKET_SIZE: u16 = 64;

/// Longest a single packet write may take before the notification is dropped
const WRITE_TIMEOUT: Duration = Duration::from_millis(20);

/// Payload plus the trailing newline
const FRAME_CAPACITY: usize = PAYLOAD_CAPACITY + 1;

/// Set while the host has the device configured
static CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Parts of the USB stack handed to the tasks
pub struct UsbLink {
    pub device: UsbDevice<'static, UsbDriver>,
    pub receiver: Receiver<'static, UsbDriver>,
    pub control: ControlChanged<'static>,
    pub transport: UsbTransport,
}

/// Builds the USB device with a single CDC-ACM function
pub fn init(r: UsbResources) -> UsbLink {
    let driver = Driver::new(r.usb, Irqs);

    let mut config = Config::new(0xc0de, 0x5307);
    config.manufacturer = Some("SmartShot");
    config.product = Some("SmartShot hit counter");
    config.serial_number = Some("00000001");
    config.max_power = 100;
    config.max_packet_size_0 = 64;

    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
    static CDC_STATE: StaticCell<State> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUF.init([0; 64]),
    );
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), MAX_PACKET_SIZE);
    let device = builder.build();
    let (sender, receiver, control) = class.split_with_control();

    UsbLink {
        device,
        receiver,
        control,
        transport: UsbTransport { sender },
    }
}

/// Runs the USB device state machine
#[embassy_executor::task]
pub async fn usb_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Turns USB configuration, DTR changes and host writes into link events
#[embassy_executor::task]
pub async fn link_events(mut receiver: Receiver<'static, UsbDriver>, control: ControlChanged<'static>) {
    let mut packet = [0u8; MAX_PACKET_SIZE as usize];
    let mut lines = LineBuffer::new();
    let mut port = PortMonitor::new();

    loop {
        receiver.wait_connection().await;
        CONFIGURED.store(true, Ordering::Release);

        loop {
            if let Some(change) = port.update(true, receiver.dtr()) {
                event::send(change).await;
            }

            match select(receiver.read_packet(&mut packet), control.control_changed()).await {
                Either::First(Ok(len)) => collect_commands(&packet[..len], &mut lines).await,
                Either::First(Err(EndpointError::BufferOverflow)) => {
                    warn!("USB packet larger than {} bytes dropped", MAX_PACKET_SIZE)
                }
                Either::First(Err(EndpointError::Disabled)) => break,
                // DTR is read again at the top of the loop
                Either::Second(()) => {}
            }
        }

        CONFIGURED.store(false, Ordering::Release);
        lines.clear();
        if let Some(change) = port.update(false, false) {
            event::send(change).await;
        }
    }
}

async fn collect_commands(bytes: &[u8], lines: &mut LineBuffer) {
    for &byte in bytes {
        if let Some(command) = lines.push(byte) {
            event::send(ConnectionEvent::CommandReceived(command)).await;
        }
    }
    // hosts that write without a newline end the command with a short packet
    if bytes.len() < MAX_PACKET_SIZE as usize {
        if let Some(command) = lines.finish() {
            event::send(ConnectionEvent::CommandReceived(command)).await;
        }
    }
}

/// Notification side of the CDC-ACM port
pub struct UsbTransport {
    sender: Sender<'static, UsbDriver>,
}

impl UsbTransport {
    async fn write(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        match with_timeout(WRITE_TIMEOUT, self.sender.write_packet(packet)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(EndpointError::Disabled)) => Err(TransportError::Disconnected),
            Ok(Err(EndpointError::BufferOverflow)) => Err(TransportError::PayloadTooLarge),
            Err(_) => Err(TransportError::Io),
        }
    }
}

impl Transport for UsbTransport {
    fn is_connected(&self) -> bool {
        CONFIGURED.load(Ordering::Acquire) && self.sender.dtr()
    }

    async fn notify(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut frame: Vec<u8, FRAME_CAPACITY> = Vec::new();
        frame
            .extend_from_slice(payload)
            .map_err(|_| TransportError::PayloadTooLarge)?;
        frame.push(b'\n').map_err(|_| TransportError::PayloadTooLarge)?;

        let max = MAX_PACKET_SIZE as usize;
        for packet in frame.chunks(max) {
            self.write(packet).await?;
        }
        if frame.len() % max == 0 {
            self.write(&[]).await?;
        }
        Ok(())
    }

    fn start_advertising(&mut self) {
        info!("USB port closed, waiting for the host to reopen it");
    }
}
