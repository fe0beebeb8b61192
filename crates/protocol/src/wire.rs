//! NetMD control-transfer wire contract
//!
//! NetMD devices carry every command and response over vendor-class control
//! transfers on endpoint 0, addressed to interface 0. Flow control is a
//! host-driven poll: the host asks whether the device is ready and how much
//! data it wants to move, then issues a transfer of exactly that size.

/// Interface claimed for every NetMD session
pub const NETMD_INTERFACE: u8 = 0;

/// bmRequestType for device-to-host transfers (IN | VENDOR | INTERFACE)
pub const REQUEST_TYPE_IN: u8 = 0xc1;

/// bmRequestType for host-to-device transfers (OUT | VENDOR | INTERFACE)
pub const REQUEST_TYPE_OUT: u8 = 0x41;

/// Poll request code
pub const POLL_REQUEST: u8 = 0x01;

/// Command send request code
pub const SEND_REQUEST: u8 = 0x80;

/// Length of a poll reply
pub const POLL_REPLY_LEN: usize = 4;

/// First response byte meaning "not the final answer, poll again"
pub const BUSY_SENTINEL: u8 = 0x0f;

/// String descriptor index holding the product name
pub const PRODUCT_STRING_INDEX: u8 = 2;

/// Decoded poll reply
///
/// Layout: `[ready, request, length, reserved]`. A device that is not ready
/// may still report request/length bytes. `length` only counts once the
/// device is ready; `pending` keeps the raw length byte whatever the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollStatus {
    /// Device is ready to move data
    pub ready: bool,
    /// Request code to use for the follow-up IN transfer
    pub request: u8,
    /// Number of bytes the device is ready to move (0 unless `ready`)
    pub length: u8,
    /// Raw length byte as reported, even when not ready
    pub pending: u8,
}

impl PollStatus {
    /// Decode a raw poll reply
    pub fn decode(reply: &[u8]) -> crate::Result<Self> {
        if reply.len() < POLL_REPLY_LEN {
            return Err(crate::ProtocolError::ShortPollReply {
                expected: POLL_REPLY_LEN,
                actual: reply.len(),
            });
        }

        let ready = reply[0] != 0;
        Ok(Self {
            ready,
            request: reply[1],
            length: if ready { reply[2] } else { 0 },
            pending: reply[2],
        })
    }

    /// Status of a device that is not ready and reports nothing queued
    pub fn not_ready() -> Self {
        Self::default()
    }

    /// True when the device reports nothing queued, ready or not
    pub fn is_idle(&self) -> bool {
        self.pending == 0
    }
}

/// True when a response is the busy sentinel rather than a real answer
pub fn is_busy_response(response: &[u8]) -> bool {
    response.first() == Some(&BUSY_SENTINEL)
}
