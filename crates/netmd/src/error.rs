//! Driver error types

use protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced by sessions and message exchanges
///
/// Every variant is terminal for the call that produced it. Retrying a
/// failed exchange as a whole is left to the caller.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The USB layer itself reported a failure
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// Device already had data queued when a command was about to be sent
    #[error("Device not ready: {pending} bytes already pending")]
    NotReady { pending: u8 },

    /// Device never produced a response within the retry budget
    #[error("Device did not respond after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// Device answered with something the wire contract does not allow
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DeviceError {
    /// True for failures of the USB link itself
    pub fn is_transport(&self) -> bool {
        matches!(self, DeviceError::Usb(_))
    }
}

/// Type alias for driver results
pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeviceError::NotReady { pending: 12 };
        assert_eq!(format!("{}", err), "Device not ready: 12 bytes already pending");

        let err = DeviceError::Timeout { attempts: 30 };
        assert!(format!("{}", err).contains("30 attempts"));
    }

    #[test]
    fn test_rusb_conversion() {
        let err: DeviceError = rusb::Error::Pipe.into();
        assert!(err.is_transport());
        assert!(!DeviceError::Timeout { attempts: 1 }.is_transport());
    }
}
