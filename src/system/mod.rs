//! Firmware plumbing shared by the tasks
pub mod clock;
pub mod event;
pub mod resources;
