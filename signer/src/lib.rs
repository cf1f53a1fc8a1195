//! Transaction signer backed by a hardware wallet.
//!
//! Private keys never leave the device: the host derives addresses and obtains signatures
//! through a [`sdk::HardwareWallet`], caches the addresses it has seen and assembles the
//! signed raw transactions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hwsigner::{HardwareSigner, OfflineProvider, Signer, SignerConfig, TransactionRequest};
//! use sdk::transport::TransportTcp;
//! use sdk::DeviceClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let transport = Arc::new(TransportTcp::new_default().await?);
//!     let signer = HardwareSigner::new(
//!         DeviceClient::new(transport),
//!         Arc::new(OfflineProvider),
//!         SignerConfig::default(),
//!     );
//!
//!     println!("{}", signer.get_address().await?);
//!     let raw = signer
//!         .sign(TransactionRequest::new().gas_price(20_000_000_000u64))
//!         .await?;
//!     println!("{}", raw);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod derivation;
pub mod error;
pub mod normalize;
pub mod protocol;
pub mod provider;
pub mod signer;

#[cfg(test)]
mod mock;

pub use config::SignerConfig;
pub use error::SignerError;
pub use normalize::{Quantity, TransactionRequest};
pub use provider::{OfflineProvider, Provider};
pub use signer::{HardwareSigner, Signer};
