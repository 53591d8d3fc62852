//! Notification transport seam
//!
//! The control loop only needs to know whether an observer is attached and how
//! to push bytes to it. Connection changes and inbound writes arrive as
//! [`ConnectionEvent`]s, queued by whoever owns the link.
//!
//! A link that can be up without anyone listening (a configured USB port
//! nobody opened) reports through [`PortMonitor`], so events and
//! [`Transport::is_connected`] follow the same signal.

use heapless::Vec;

/// Longest inbound command kept
pub const COMMAND_CAPACITY: usize = 64;

/// Raw bytes written by the observer
pub type CommandBytes = Vec<u8, COMMAND_CAPACITY>;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    /// An observer attached
    Connected,
    /// The observer went away
    Disconnected,
    /// The observer wrote to the device
    CommandReceived(CommandBytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    #[error("observer disconnected")]
    Disconnected,
    #[error("payload too large for the link")]
    PayloadTooLarge,
    #[error("link i/o failed")]
    Io,
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Pushes one payload to the connected observer
    async fn notify(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Makes the device discoverable again after the observer left
    fn start_advertising(&mut self);
}

/// Turns link level readings into `Connected`/`Disconnected` edges
///
/// The observer is attached while the link is up and the port is open.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortMonitor {
    attached: bool,
}

impl PortMonitor {
    pub const fn new() -> Self {
        Self { attached: false }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Feeds the current link state; returns an event when attachment changed
    pub fn update(&mut self, link_up: bool, port_open: bool) -> Option<ConnectionEvent> {
        let attached = link_up && port_open;
        if attached == self.attached {
            return None;
        }
        self.attached = attached;
        Some(if attached {
            ConnectionEvent::Connected
        } else {
            ConnectionEvent::Disconnected
        })
    }
}
