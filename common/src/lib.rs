//! Common types and definitions shared by the host-side signer and the signing device.
//!
//! Everything in this crate is serializable with postcard and usable without `std`, so the same
//! definitions describe both ends of the wire protocol.

#![no_std]

extern crate alloc;

pub mod comm;
pub mod error;
pub mod hash;
pub mod message;
pub mod rlp;
pub mod types;

pub use error::Error;
