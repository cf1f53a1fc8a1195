//! Error codes returned by the device.
//!
//! These codes travel in `Response::Error` and are propagated to the host unchanged.
//! Messages are kept terse.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Error codes reported by the signing device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    /// User rejected the operation on the device.
    RejectedByUser = 0x01,
    /// Unknown or unsupported command.
    InvalidCommand = 0x02,
    /// Malformed data in the request payload.
    InvalidData = 0x04,
    /// Internal error on the device.
    InternalError = 0x08,
    /// Invalid BIP32/44 derivation path.
    InvalidDerivationPath = 0x0C,
    /// Key derivation failed.
    KeyDerivationFailed = 0x0D,
    /// Signing operation failed.
    SigningFailed = 0x0E,
    /// Invalid transaction format.
    InvalidTransaction = 0x0F,
    /// Buffer overflow or size limit exceeded.
    BufferOverflow = 0x15,
}

impl Error {
    /// Returns the error code as a u8.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RejectedByUser => write!(f, "Rejected by user"),
            Error::InvalidCommand => write!(f, "Invalid command"),
            Error::InvalidData => write!(f, "Invalid data"),
            Error::InternalError => write!(f, "Internal error"),
            Error::InvalidDerivationPath => write!(f, "Invalid derivation path"),
            Error::KeyDerivationFailed => write!(f, "Key derivation failed"),
            Error::SigningFailed => write!(f, "Signing failed"),
            Error::InvalidTransaction => write!(f, "Invalid transaction"),
            Error::BufferOverflow => write!(f, "Buffer overflow"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::RejectedByUser.code(), 0x01);
        assert_eq!(Error::InvalidDerivationPath.code(), 0x0C);
        assert_eq!(Error::BufferOverflow.code(), 0x15);
    }
}
