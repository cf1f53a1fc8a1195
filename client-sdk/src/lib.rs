//! Host-side link to a hardware signing device.
//!
//! The layers, bottom up: APDU framing ([`apdu`]), the byte [`transport`] to a device or an
//! emulator, the chunked message exchange of [`comm`], and the typed [`device`] API used by
//! the signer.

pub mod apdu;
pub mod comm;
pub mod device;
pub mod transport;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use device::{DeviceClient, DeviceError, HardwareWallet};

pub use common::types;
