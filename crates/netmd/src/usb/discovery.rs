//! NetMD device discovery
//!
//! Scans every USB bus and keeps the devices listed in the protocol registry.
//! Discovery is best-effort: if the USB layer cannot be initialized or
//! enumerated, the result is simply empty.

use protocol::{KnownDevice, lookup};
use rusb::{Context, Device, UsbContext};
use std::fmt;
use tracing::{debug, info, warn};

/// A supported device found during a scan
///
/// Holds a reference on the underlying `rusb::Device`, so it can be opened
/// for as long as the caller keeps it. Order of a discovery result carries
/// no meaning.
#[derive(Debug)]
pub struct DiscoveredDevice<C: UsbContext = Context> {
    device: Device<C>,
    known: &'static KnownDevice,
}

impl<C: UsbContext> DiscoveredDevice<C> {
    pub fn vendor_id(&self) -> u16 {
        self.known.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.known.product_id
    }

    /// Model name from the registry
    pub fn model(&self) -> &'static str {
        self.known.model
    }

    pub fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    pub fn address(&self) -> u8 {
        self.device.address()
    }

    pub(crate) fn device(&self) -> &Device<C> {
        &self.device
    }
}

impl<C: UsbContext> fmt::Display for DiscoveredDevice<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x}) on bus {:03} device {:03}",
            self.model(),
            self.vendor_id(),
            self.product_id(),
            self.bus_number(),
            self.address()
        )
    }
}

/// Keep the candidates whose vendor/product pair is in the registry
///
/// Candidates are `(item, vendor_id, product_id)` triples. Matches keep
/// their input order.
pub fn select_known<T>(
    candidates: impl IntoIterator<Item = (T, u16, u16)>,
) -> Vec<(T, &'static KnownDevice)> {
    candidates
        .into_iter()
        .filter_map(|(item, vendor_id, product_id)| {
            lookup(vendor_id, product_id).map(|known| (item, known))
        })
        .collect()
}

/// Discover NetMD devices using a fresh libusb context
pub fn discover() -> Vec<DiscoveredDevice> {
    match Context::new() {
        Ok(context) => discover_with(&context),
        Err(e) => {
            warn!("Failed to initialize USB context: {}", e);
            Vec::new()
        }
    }
}

/// Discover NetMD devices visible to `context`
pub fn discover_with<C: UsbContext>(context: &C) -> Vec<DiscoveredDevice<C>> {
    let devices = match context.devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Failed to enumerate USB devices: {}", e);
            return Vec::new();
        }
    };

    let candidates = devices.iter().filter_map(|device| match device.device_descriptor() {
        Ok(descriptor) => Some((device, descriptor.vendor_id(), descriptor.product_id())),
        Err(e) => {
            debug!(
                "Skipping device on bus {:03} address {:03}: {}",
                device.bus_number(),
                device.address(),
                e
            );
            None
        }
    });

    let found: Vec<DiscoveredDevice<C>> = select_known(candidates)
        .into_iter()
        .map(|(device, known)| DiscoveredDevice { device, known })
        .collect();

    for device in &found {
        debug!("Found {}", device);
    }
    info!("Discovered {} NetMD device(s)", found.len());

    found
}
