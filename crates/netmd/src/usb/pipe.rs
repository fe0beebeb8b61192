//! Control pipe abstraction
//!
//! NetMD traffic is nothing but control transfers on endpoint 0, so the
//! driver only needs a narrow slice of the USB host library. This trait is
//! that slice. It is implemented for `rusb::DeviceHandle`, and the scripted
//! doubles in `test_utils` implement it for tests.
//!
//! Dropping a pipe closes the underlying device.

use rusb::{DeviceHandle, UsbContext};
use std::time::Duration;

/// Endpoint-0 control channel to a single opened device
pub trait ControlPipe {
    /// Device-to-host control transfer, returns bytes read
    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// Host-to-device control transfer, returns bytes written
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// Fetch an ASCII string descriptor
    fn read_string_descriptor(&self, index: u8) -> rusb::Result<String>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;
}

impl<T: UsbContext> ControlPipe for DeviceHandle<T> {
    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::read_control(self, request_type, request, value, index, buf, timeout)
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::write_control(self, request_type, request, value, index, buf, timeout)
    }

    fn read_string_descriptor(&self, index: u8) -> rusb::Result<String> {
        self.read_string_descriptor_ascii(index)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }
}
