//! The signer facade composing the address cache, normalization and the device protocol.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use sdk::HardwareWallet;

use crate::cache::AddressCache;
use crate::config::SignerConfig;
use crate::derivation::DerivationPathPolicy;
use crate::error::SignerError;
use crate::normalize::{normalize, TransactionRequest};
use crate::protocol::sign_with_device;
use crate::provider::{Provider, TxHash};

/// Anything that can hand out its address and sign transactions for it.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Checksummed address of the active account.
    async fn get_address(&self) -> Result<String, SignerError>;

    /// Signs `request` and returns the `0x`-prefixed raw transaction.
    async fn sign(&self, request: TransactionRequest) -> Result<String, SignerError>;

    /// Fills in missing fields, signs and broadcasts `request`.
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, SignerError>;
}

/// Signer backed by a hardware wallet.
///
/// The active account is selected by an address index; every operation reads the index once
/// when it starts, so a concurrent [`HardwareSigner::set_address_index`] never splits an
/// operation across two accounts.
pub struct HardwareSigner<D: HardwareWallet, P: Provider> {
    device: D,
    provider: Arc<P>,
    config: SignerConfig,
    paths: DerivationPathPolicy,
    address_index: AtomicU32,
    cache: AddressCache,
}

impl<D: HardwareWallet, P: Provider> HardwareSigner<D, P> {
    pub fn new(device: D, provider: Arc<P>, config: SignerConfig) -> Self {
        Self {
            device,
            provider,
            paths: DerivationPathPolicy::new(config.derivation_path.clone()),
            address_index: AtomicU32::new(config.address_index),
            config,
            cache: AddressCache::new(),
        }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn address_index(&self) -> u32 {
        self.address_index.load(Ordering::SeqCst)
    }

    /// Selects the account used by subsequent operations.
    pub fn set_address_index(&self, index: u32) {
        debug!("Switching to address index {}", index);
        self.address_index.store(index, Ordering::SeqCst);
    }

    /// Address at an arbitrary index, through the cache.
    pub async fn address_at(&self, index: u32) -> Result<String, SignerError> {
        self.cache.get_address(&self.device, &self.paths, index).await
    }

    /// A page of addresses for account pickers. `from` defaults to 0 and `page_size` to the
    /// configured page size.
    ///
    /// Best effort: while another page fetch is in flight, only the already cached part is
    /// returned, and a failed fetch is logged and yields an empty page.
    pub async fn get_next_addresses(
        &self,
        from: Option<u32>,
        page_size: Option<u32>,
    ) -> Vec<String> {
        self.cache
            .get_addresses_page_or_empty(
                &self.device,
                &self.paths,
                from.unwrap_or(0),
                page_size.unwrap_or(self.config.page_size),
            )
            .await
    }

    /// Same as [`Self::get_next_addresses`], but a failed fetch is returned to the caller.
    pub async fn try_get_next_addresses(
        &self,
        from: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Vec<String>, SignerError> {
        self.cache
            .get_addresses_page(
                &self.device,
                &self.paths,
                from.unwrap_or(0),
                page_size.unwrap_or(self.config.page_size),
            )
            .await
    }

    async fn sign_at(
        &self,
        index: u32,
        request: TransactionRequest,
    ) -> Result<String, SignerError> {
        let tx = normalize(request, &self.config)?;
        let path = self.paths.bip32_for(index)?;
        let signed = sign_with_device(&self.device, &tx, &path).await?;
        Ok(signed.to_hex())
    }
}

#[async_trait]
impl<D: HardwareWallet, P: Provider> Signer for HardwareSigner<D, P> {
    async fn get_address(&self) -> Result<String, SignerError> {
        self.address_at(self.address_index()).await
    }

    async fn sign(&self, request: TransactionRequest) -> Result<String, SignerError> {
        self.sign_at(self.address_index(), request).await
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, SignerError> {
        let index = self.address_index();
        let from = self.address_at(index).await?;

        let populated = self
            .provider
            .populate_transaction(request, &from)
            .await
            .map_err(SignerError::PopulationFailed)?;
        let raw = self.sign_at(index, populated).await?;

        let hash = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(SignerError::BroadcastFailed)?;
        info!("Broadcast transaction {} from {}", hash, from);
        Ok(hash)
    }
}
