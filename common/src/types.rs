//! Core types of the device protocol.
//!
//! These types are shared between host and device, serialized via postcard.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::hash::{keccak256, Hash256};
use crate::rlp;

/// Maximum BIP32 derivation path depth.
pub const MAX_BIP32_PATH_DEPTH: usize = 10;

/// Ethereum address (20 bytes).
pub type EthAddress = [u8; 20];

/// BIP32 derivation path.
///
/// The path is stored as a vector of u32 values where hardened indices
/// have the 0x80000000 bit set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Bip32Path(pub Vec<u32>);

impl Bip32Path {
    /// Hardened index marker (bit 31).
    pub const HARDENED: u32 = 0x80000000;

    /// Creates a path from a slice.
    pub fn from_slice(path: &[u32]) -> Self {
        Self(path.to_vec())
    }

    /// Creates a standard Ethereum path: m/44'/60'/account'/change/index
    pub fn ethereum(account: u32, change: u32, index: u32) -> Self {
        Self(alloc::vec![
            44 | Self::HARDENED,
            60 | Self::HARDENED,
            account | Self::HARDENED,
            change,
            index,
        ])
    }

    /// Returns the path length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the path as a slice.
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for Bip32Path {
    type Err = String;

    /// Parses a path string like "m/44'/60'/0'/0/0". The leading "m" is optional and
    /// hardened components may be marked with `'` or `h`.
    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let mut components = path.split('/').peekable();
        if components.peek() == Some(&"m") {
            components.next();
        }

        let mut indices = Vec::new();
        for comp in components {
            let hardened = comp.ends_with('\'') || comp.ends_with('h');
            let raw_index = if hardened {
                &comp[..comp.len() - 1]
            } else {
                comp
            };

            let index: u32 = raw_index
                .parse()
                .map_err(|e| format!("Invalid index '{}': {}", comp, e))?;

            if index >= Self::HARDENED {
                return Err(format!("Index overflow for '{}'", comp));
            }
            let child_number = if hardened {
                index | Self::HARDENED
            } else {
                index
            };
            indices.push(child_number);
        }

        if indices.len() > MAX_BIP32_PATH_DEPTH {
            return Err(format!("Path deeper than {} components", MAX_BIP32_PATH_DEPTH));
        }
        Ok(Self(indices))
    }
}

impl fmt::Display for Bip32Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &component in &self.0 {
            if component & Self::HARDENED != 0 {
                write!(f, "/{}'", component & !Self::HARDENED)?;
            } else {
                write!(f, "/{}", component)?;
            }
        }
        Ok(())
    }
}

/// Renders an address in EIP-55 mixed-case checksum form, `0x` prefixed.
pub fn to_checksum_address(address: &EthAddress) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses a hex address, with or without `0x` prefix, in any letter case.
pub fn parse_address(s: &str) -> Result<EthAddress, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() != 40 {
        return Err(format!("Address must be 20 bytes, got '{}'", s));
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(s, &mut address).map_err(|e| e.to_string())?;
    Ok(address)
}

/// ECDSA signature components (v, r, s) as returned by the device.
///
/// For transactions, v follows EIP-155: v = chain_id * 2 + 35 + recovery_id
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    /// Recovery identifier with the EIP-155 chain offset applied.
    pub v: u64,
    /// R component (32 bytes, big-endian).
    pub r: [u8; 32],
    /// S component (32 bytes, big-endian, low-S normalized).
    pub s: [u8; 32],
}

impl Signature {
    /// Recovery id (0 or 1) for a signature made under EIP-155 with `chain_id`.
    pub fn recovery_id(&self, chain_id: u64) -> Option<u8> {
        let base = chain_id.checked_mul(2)?.checked_add(35)?;
        match self.v.checked_sub(base)? {
            id @ (0 | 1) => Some(id as u8),
            _ => None,
        }
    }
}

/// Fields of a legacy transaction as the device consumes them.
///
/// Integers are minimal big-endian byte strings; zero is the empty string.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFields {
    pub nonce: Vec<u8>,
    pub gas_price: Vec<u8>,
    pub gas_limit: Vec<u8>,
    /// Recipient; `None` creates a contract.
    pub to: Option<EthAddress>,
    pub value: Vec<u8>,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl TransactionFields {
    fn encode_common(&self, out: &mut Vec<u8>) {
        out.extend(rlp::encode_bytes(rlp::trim_leading_zeros(&self.nonce)));
        out.extend(rlp::encode_bytes(rlp::trim_leading_zeros(&self.gas_price)));
        out.extend(rlp::encode_bytes(rlp::trim_leading_zeros(&self.gas_limit)));
        match &self.to {
            Some(to) => out.extend(rlp::encode_bytes(to)),
            None => out.extend(rlp::encode_bytes(&[])),
        }
        out.extend(rlp::encode_bytes(rlp::trim_leading_zeros(&self.value)));
        out.extend(rlp::encode_bytes(&self.data));
    }

    /// RLP of the unsigned EIP-155 list `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut items = Vec::new();
        self.encode_common(&mut items);
        items.extend(rlp::encode_u64(self.chain_id));
        items.extend(rlp::encode_u64(0));
        items.extend(rlp::encode_u64(0));
        rlp::encode_list(&items)
    }

    /// Hash the device signs.
    pub fn signing_hash(&self) -> Hash256 {
        keccak256(&self.signing_payload())
    }

    /// RLP of the signed list `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`.
    pub fn encode_signed(&self, signature: &Signature) -> Vec<u8> {
        let mut items = Vec::new();
        self.encode_common(&mut items);
        items.extend(rlp::encode_u64(signature.v));
        items.extend(rlp::encode_bytes(rlp::trim_leading_zeros(&signature.r)));
        items.extend(rlp::encode_bytes(rlp::trim_leading_zeros(&signature.s)));
        rlp::encode_list(&items)
    }
}
