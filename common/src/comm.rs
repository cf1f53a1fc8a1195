/// This module contains the constants for the chunked message protocol spoken between the host
/// and the device. Messages are length-prefixed and sent in chunks of `CHUNK_LENGTH` bytes.
/// See the comm module of the client SDK for the host implementation.

/// ACK is a single-byte acknowledgment message.
pub const ACK: [u8; 1] = [0x42];

/// The length of each chunk of data carried by a single APDU.
pub const CHUNK_LENGTH: usize = 250;
