pub mod hit_monitor;
pub mod usb_link;
