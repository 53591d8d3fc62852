//! Link Events
//!
//! Connection changes and observer commands travel from the USB link task to
//! the hit monitor through this channel. The link task only queues events; all
//! state changes happen on the hit monitor side.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use smart_shot_core::ConnectionEvent;

/// Single-consumer event channel with capacity of 4
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, ConnectionEvent, 4> = Channel::new();

/// Queues an event for the hit monitor
pub async fn send(event: ConnectionEvent) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Receives the next link event
pub async fn wait() -> ConnectionEvent {
    EVENT_CHANNEL.receiver().receive().await
}
