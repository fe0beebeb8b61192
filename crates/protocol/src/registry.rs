//! Supported NetMD hardware
//!
//! Vendor/product pairs of the NetMD recorders and decks this driver talks
//! to. The table is only ever used as a membership test during discovery.

/// Sony Corporation
pub const SONY_VENDOR_ID: u16 = 0x054c;

/// A supported vendor/product pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KnownDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Model name(s) sold under this product id
    pub model: &'static str,
}

impl KnownDevice {
    const fn sony(product_id: u16, model: &'static str) -> Self {
        Self {
            vendor_id: SONY_VENDOR_ID,
            product_id,
            model,
        }
    }

    /// Check whether this entry matches a device descriptor
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// All supported devices
pub const KNOWN_DEVICES: &[KnownDevice] = &[
    KnownDevice::sony(0x0075, "Sony MZ-N1"),
    KnownDevice::sony(0x0080, "Sony LAM-1"),
    KnownDevice::sony(0x0081, "Sony MDS-JB980"),
    KnownDevice::sony(0x0084, "Sony MZ-N505"),
    KnownDevice::sony(0x0085, "Sony MZ-S1"),
    KnownDevice::sony(0x0086, "Sony MZ-N707"),
    KnownDevice::sony(0x00c6, "Sony MZ-N10"),
    KnownDevice::sony(0x00c8, "Sony MZ-N710/N810"),
    KnownDevice::sony(0x00c9, "Sony MZ-N510/N610"),
    KnownDevice::sony(0x00ca, "Sony MZ-NE410"),
];

/// Look up the registry entry for a vendor/product pair
pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static KnownDevice> {
    KNOWN_DEVICES
        .iter()
        .find(|device| device.matches(vendor_id, product_id))
}

/// Check whether a vendor/product pair is supported
pub fn is_known(vendor_id: u16, product_id: u16) -> bool {
    lookup(vendor_id, product_id).is_some()
}
