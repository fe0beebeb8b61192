//! NetMD sessions
//!
//! A session is an opened device with interface 0 claimed. The claim is the
//! only mutual exclusion there is: while a [`NetmdHandle`] is alive no other
//! process can talk to the same device.
//!
//! Closing releases the interface and then closes the device. `close`
//! consumes the handle, and dropping an unclosed handle runs the same
//! sequence, so a claimed interface is released on every exit path.

use crate::config::ExchangeSettings;
use crate::error::{DeviceError, Result};
use crate::usb::discovery::DiscoveredDevice;
use crate::usb::exchange::{self, Backoff, ThreadSleep};
use crate::usb::pipe::ControlPipe;
use protocol::{NETMD_INTERFACE, PRODUCT_STRING_INDEX, PollStatus};
use rusb::{DeviceHandle, UsbContext};
use tracing::{debug, info, warn};

/// Opened, interface-claimed NetMD device
#[derive(Debug)]
pub struct NetmdHandle<P: ControlPipe, B: Backoff = ThreadSleep> {
    pipe: P,
    backoff: B,
    settings: ExchangeSettings,
    claimed: bool,
}

impl<P: ControlPipe> NetmdHandle<P> {
    /// Claim interface 0 on an opened pipe
    pub fn claim(pipe: P, settings: ExchangeSettings) -> Result<Self> {
        Self::claim_with_backoff(pipe, settings, ThreadSleep)
    }
}

impl<P: ControlPipe, B: Backoff> NetmdHandle<P, B> {
    /// Claim interface 0 on an opened pipe, with a custom backoff
    ///
    /// There is no retry: a failed claim usually means another session owns
    /// the device. The pipe is dropped, closing the device.
    pub fn claim_with_backoff(mut pipe: P, settings: ExchangeSettings, backoff: B) -> Result<Self> {
        pipe.claim_interface(NETMD_INTERFACE).map_err(|e| {
            warn!("Failed to claim interface {}: {}", NETMD_INTERFACE, e);
            DeviceError::Usb(e)
        })?;
        debug!("Claimed interface {}", NETMD_INTERFACE);

        Ok(Self {
            pipe,
            backoff,
            settings,
            claimed: true,
        })
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    /// Product string of the device, or an empty string if it can't be read
    pub fn device_name(&self) -> String {
        match self.pipe.read_string_descriptor(PRODUCT_STRING_INDEX) {
            Ok(name) => name,
            Err(e) => {
                warn!("Failed to read product string: {}", e);
                String::new()
            }
        }
    }

    /// Poll the device up to `max_attempts` times
    pub fn poll(&mut self, max_attempts: u32) -> Result<PollStatus> {
        exchange::poll(&mut self.pipe, &mut self.backoff, &self.settings, max_attempts)
    }

    /// Send a command and wait for its response
    pub fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        exchange::exchange(&mut self.pipe, &mut self.backoff, &self.settings, command)
    }

    /// Release the interface and close the device
    pub fn close(mut self) {
        self.release();
        info!("Closed NetMD session");
    }

    fn release(&mut self) {
        if !self.claimed {
            return;
        }
        self.claimed = false;

        if let Err(e) = self.pipe.release_interface(NETMD_INTERFACE) {
            warn!("Failed to release interface {}: {}", NETMD_INTERFACE, e);
        } else {
            debug!("Released interface {}", NETMD_INTERFACE);
        }
    }
}

impl<P: ControlPipe, B: Backoff> Drop for NetmdHandle<P, B> {
    fn drop(&mut self) {
        // Pipe fields drop after this body, so the device closes post-release
        self.release();
    }
}

impl<C: UsbContext> DiscoveredDevice<C> {
    /// Open the device and claim interface 0
    pub fn open(&self, settings: ExchangeSettings) -> Result<NetmdHandle<DeviceHandle<C>>> {
        let mut handle = self.device().open().map_err(|e| {
            warn!("Failed to open {}: {}", self, e);
            DeviceError::Usb(e)
        })?;

        // Detach kernel driver if active
        match handle.kernel_driver_active(NETMD_INTERFACE) {
            Ok(true) => {
                debug!(
                    "Detaching kernel driver from interface {} on {}",
                    NETMD_INTERFACE, self
                );
                if let Err(e) = handle.detach_kernel_driver(NETMD_INTERFACE) {
                    // Claiming will most likely fail next and report it
                    warn!("Failed to detach kernel driver: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!("Could not check kernel driver status: {}", e);
            }
        }

        let session = NetmdHandle::claim(handle, settings)?;
        info!("Opened {}", self);
        Ok(session)
    }
}
