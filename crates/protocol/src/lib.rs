//! Protocol library for netmd-rs
//!
//! This crate defines the wire contract NetMD devices speak over USB
//! vendor-class control transfers, and the registry of supported hardware.
//! It has no USB dependency of its own: the `netmd` crate drives the actual
//! transfers.
//!
//! # Example
//!
//! ```
//! use protocol::{PollStatus, is_known};
//!
//! // Sony MZ-N707
//! assert!(is_known(0x054c, 0x0086));
//!
//! // Device ready to send 5 bytes with request 0x81
//! let status = PollStatus::decode(&[0x01, 0x81, 0x05, 0x00]).unwrap();
//! assert!(status.ready);
//! assert_eq!(status.length, 5);
//! ```

pub mod error;
pub mod registry;
pub mod wire;

pub use error::{ProtocolError, Result};
pub use registry::{KNOWN_DEVICES, KnownDevice, SONY_VENDOR_ID, is_known, lookup};
pub use wire::{
    BUSY_SENTINEL, NETMD_INTERFACE, POLL_REPLY_LEN, POLL_REQUEST, PRODUCT_STRING_INDEX,
    PollStatus, REQUEST_TYPE_IN, REQUEST_TYPE_OUT, SEND_REQUEST, is_busy_response,
};
