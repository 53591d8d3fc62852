//! Inbound commands
//!
//! Accepted forms:
//! - `reset` as a bare token
//! - `{"command":"reset"}`
//! - `{"command":"led","state":0|1}`
//! - `{"command":"status"}`
//!
//! Surrounding whitespace (line endings from serial terminals) is ignored.
//! Anything else is not a command and yields `None`.
//!
//! [`LineBuffer`] cuts a byte stream into commands: a command ends at `\n`
//! or `\r`, or where the link says a transfer ended. A line longer than
//! [`COMMAND_CAPACITY`] is dropped as a whole.

use serde::Deserialize;

use crate::transport::{CommandBytes, COMMAND_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Zero the hit counter and push the current state
    Reset,
    /// Drive the status LED and report its state
    Led(bool),
    /// Report the status LED state
    Status,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    command: &'a str,
    #[serde(default)]
    state: Option<u8>,
}

pub fn parse(bytes: &[u8]) -> Option<Command> {
    let text = core::str::from_utf8(bytes).ok()?.trim();
    if text == "reset" {
        return Some(Command::Reset);
    }
    if !text.starts_with('{') {
        return None;
    }

    let (envelope, _) = serde_json_core::from_str::<Envelope>(text).ok()?;
    match (envelope.command, envelope.state) {
        ("reset", _) => Some(Command::Reset),
        ("status", _) => Some(Command::Status),
        ("led", Some(state)) => Some(Command::Led(state != 0)),
        _ => None,
    }
}

/// Collects inbound bytes into newline-delimited commands
#[derive(Debug, Default)]
pub struct LineBuffer {
    line: CommandBytes,
    /// Set after an overflow; everything up to the next line end is dropped
    discarding: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            line: CommandBytes::new(),
            discarding: false,
        }
    }

    /// Feeds one byte; returns the command it completes, if any
    pub fn push(&mut self, byte: u8) -> Option<CommandBytes> {
        if byte == b'\n' || byte == b'\r' {
            return self.finish();
        }
        if self.discarding {
            return None;
        }
        if self.line.push(byte).is_err() {
            warn!("command longer than {} bytes dropped", COMMAND_CAPACITY);
            self.line.clear();
            self.discarding = true;
        }
        None
    }

    /// Ends the current line, e.g. on a short packet
    pub fn finish(&mut self) -> Option<CommandBytes> {
        let discarded = core::mem::replace(&mut self.discarding, false);
        if discarded || self.line.is_empty() {
            self.line.clear();
            return None;
        }
        let line = self.line.clone();
        self.line.clear();
        Some(line)
    }

    /// Drops any partial line
    pub fn clear(&mut self) {
        self.line.clear();
        self.discarding = false;
    }
}
