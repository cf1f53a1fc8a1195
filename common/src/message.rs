//! Request and Response message types of the device protocol.
//!
//! Messages are serialized with postcard and carried by the chunked exchange of the `comm`
//! module. The device validates every field after deserialization.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Bip32Path, EthAddress, Signature, TransactionFields};

/// Request messages from host to device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Derive the address at a single path.
    GetAddress {
        /// BIP32 derivation path of the account.
        path: Bip32Path,
    },

    /// Derive the addresses of a bundle of paths in one round trip.
    GetAddresses {
        /// Paths, answered in the same order.
        paths: Vec<Bip32Path>,
    },

    /// Sign a legacy EIP-155 transaction.
    SignTransaction {
        /// BIP32 derivation path for signing key.
        path: Bip32Path,
        /// Transaction field projection.
        tx: TransactionFields,
    },

    /// Close the session.
    Exit,
}

/// Response messages from device to host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Error response with error code.
    Error(Error),

    /// A single derived address.
    Address(EthAddress),

    /// Derived addresses, in request order.
    Addresses(Vec<EthAddress>),

    /// Detached transaction signature.
    Signature(Signature),
}
