use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash (32 bytes).
pub type Hash256 = [u8; 32];

/// Keccak256 hash function as used by Ethereum.
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}
