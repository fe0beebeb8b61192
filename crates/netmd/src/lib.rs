//! Transport core for USB-attached NetMD MiniDisc devices
//!
//! NetMD recorders and decks exchange commands over USB vendor-class control
//! transfers instead of bulk endpoints, using a poll-driven flow-control
//! handshake. This crate discovers supported devices, opens exclusive
//! sessions with them and runs that handshake. Command and response bytes
//! are opaque here; the NetMD command set is built on top.
//!
//! # Example
//!
//! ```no_run
//! use netmd::{ExchangeSettings, discover};
//!
//! # fn main() -> netmd::Result<()> {
//! let devices = discover();
//! if let Some(device) = devices.first() {
//!     let mut handle = device.open(ExchangeSettings::default())?;
//!     println!("Connected to {}", handle.device_name());
//!
//!     // Query disc flags
//!     let response = handle.exchange(&[0x00, 0x18, 0x06, 0x01, 0x10, 0x10, 0x00, 0xff, 0x00])?;
//!     println!("{} byte response", response.len());
//!
//!     handle.close();
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod test_utils;
pub mod usb;

pub use config::{ExchangeSettings, LoggingSettings, ProbeConfig, load_config};
pub use error::{DeviceError, Result};
pub use usb::{
    Backoff, ControlPipe, DiscoveredDevice, NetmdHandle, ThreadSleep, discover, discover_with,
    select_known,
};
