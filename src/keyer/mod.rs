//! # Keyer Device Link
//!
//! Serial communication with a WinKeyer-compatible keyer module: opening and
//! configuring the port, the session bring-up sequence, command writes, and
//! polling single status bytes back.
//!
//! The byte-level protocol itself lives in two pure submodules:
//!
//! - [`commands`] - host command builders
//! - [`status`] - status byte classification
//!
//! The transport is abstracted behind the [`KeyerPort`] trait so the bridge
//! engine can be exercised against a scripted port in tests; [`SerialLink`]
//! is the real implementation over a serial device.
//!
//! ## Error Handling
//!
//! Transport failures are unrecoverable for the daemon: a keyer that stops
//! responding mid-session leaves the hardware in an unknown keying state, so
//! errors from this module abort the event loop rather than being retried.

use std::io::{self, Read, Write};
use std::time::Duration;

use log::{debug, info};
use serialport::SerialPort;
use thiserror::Error;

use crate::config::CwConfig;

pub mod commands;
pub mod status;

/// Serial read timeout for status polling. The loop must never stall here;
/// one character time at 1200 baud is ~8 ms.
const READ_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum KeyerError {
    #[error("failed to open serial port {device}: {source}")]
    Open {
        device: String,
        source: serialport::Error,
    },
    #[error("keyer write failed: {0}")]
    Write(#[source] io::Error),
    #[error("keyer read failed: {0}")]
    Read(#[source] io::Error),
}

/// Byte transport to the keyer module.
///
/// Implemented by [`SerialLink`] for real hardware and by scripted mocks in
/// the test suite.
pub trait KeyerPort: Send {
    /// Write one command or buffered unit, completely.
    fn write_unit(&mut self, bytes: &[u8]) -> Result<(), KeyerError>;

    /// Read at most one status byte. `Ok(None)` means nothing was pending
    /// within the short read timeout; that is the common case, not an error.
    fn read_status(&mut self) -> Result<Option<u8>, KeyerError>;
}

/// [`KeyerPort`] over a real serial device.
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink {
    /// Open and configure the serial device. The keyer host interface runs
    /// at 1200 baud, 8-N-2.
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, KeyerError> {
        let builder = serialport::new(device, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::Two)
            .parity(serialport::Parity::None);
        let mut port = builder.open().map_err(|e| KeyerError::Open {
            device: device.to_string(),
            source: e,
        })?;
        // Assert DTR/RTS so interfaces powered from the control lines wake up
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        std::thread::sleep(Duration::from_millis(150));
        // Discard anything the keyer emitted before we opened the host session
        let mut purge_buf = [0u8; 512];
        if let Ok(available) = port.bytes_to_read() {
            if available > 0 {
                let _ = port.read(&mut purge_buf);
            }
        }
        debug!("Serial port {} initialized at {} baud", device, baud_rate);
        Ok(SerialLink { port })
    }
}

impl KeyerPort for SerialLink {
    fn write_unit(&mut self, bytes: &[u8]) -> Result<(), KeyerError> {
        self.port.write_all(bytes).map_err(KeyerError::Write)
    }

    fn read_status(&mut self) -> Result<Option<u8>, KeyerError> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(KeyerError::Read(e)),
        }
    }
}

/// A connected keyer module.
///
/// Owns the transport and knows the session bring-up and shutdown sequences.
/// Everything in between (what to send, when) is driven by the bridge.
pub struct KeyerDevice {
    link: Box<dyn KeyerPort>,
}

impl KeyerDevice {
    /// Open the serial device and wrap it.
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, KeyerError> {
        info!("Opening keyer on {} at {} baud", device, baud_rate);
        let link = SerialLink::open(device, baud_rate)?;
        Ok(KeyerDevice {
            link: Box::new(link),
        })
    }

    /// Wrap an already-open transport. Used by tests to run the bridge
    /// against a scripted port.
    pub fn from_port(link: Box<dyn KeyerPort>) -> Self {
        KeyerDevice { link }
    }

    /// Run the session bring-up sequence: open the host interface, then
    /// program mode, weighting, pin config, PTT timing, pot range, and the
    /// initial speed from configuration.
    pub fn initialize(&mut self, cw: &CwConfig) -> Result<(), KeyerError> {
        self.send(&commands::cmd_host_open())?;
        self.send(&commands::cmd_set_mode(cw.echo))?;
        self.send(&commands::cmd_set_weight(cw.weight.clamp(10, 90)))?;
        self.send(&commands::cmd_set_pin_config(cw.mute))?;
        self.send(&commands::cmd_set_ptt_timing(cw.ptt_lead_in_ms.min(50) / 10, 0))?;
        let range = cw.max_speed.saturating_sub(cw.min_speed);
        self.send(&commands::cmd_set_pot_range(cw.min_speed, range))?;
        self.send(&commands::cmd_set_speed(cw.speed))?;
        info!(
            "Keyer initialized: {} WPM, weight {}, pot range {}-{}",
            cw.speed, cw.weight, cw.min_speed, cw.max_speed
        );
        Ok(())
    }

    /// Write one command or buffered unit.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), KeyerError> {
        self.link.write_unit(bytes)
    }

    /// Poll for one status byte; `None` when nothing is pending.
    pub fn poll_status(&mut self) -> Result<Option<u8>, KeyerError> {
        self.link.read_status()
    }

    /// Close the host interface, returning the keyer to standalone use.
    pub fn close(&mut self) -> Result<(), KeyerError> {
        debug!("Closing keyer host interface");
        self.send(&commands::cmd_host_close())
    }
}
