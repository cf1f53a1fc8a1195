//! Addresses already retrieved from the device, by index.
//!
//! Addresses are a deterministic function of the device keys and the index, so entries are
//! never invalidated and an index, once populated, keeps its first value.
//!
//! Bulk fetches are guarded so that at most one is in flight per cache. A page request that
//! finds the guard taken does not wait: it returns whatever part of the page is already cached.
//! Single-address fetches bypass the guard.

use std::collections::BTreeMap;

use common::types::to_checksum_address;
use log::{debug, warn};
use sdk::{DeviceError, HardwareWallet};
use tokio::sync::{Mutex, RwLock};

use crate::derivation::DerivationPathPolicy;
use crate::error::SignerError;

#[derive(Debug, Default)]
pub struct AddressCache {
    entries: RwLock<BTreeMap<u32, String>>,
    bulk_fetch: Mutex<()>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, index: u32) -> Option<String> {
        self.entries.read().await.get(&index).cloned()
    }

    /// Stores `address` at `index` unless the index is already populated.
    /// Returns the address stored at `index` afterwards.
    pub async fn insert(&self, index: u32, address: String) -> String {
        self.entries
            .write()
            .await
            .entry(index)
            .or_insert(address)
            .clone()
    }

    /// The populated run of `[from, from + size)` that starts at `from`, stopping at the first gap.
    pub async fn cached_page(&self, from: u32, size: u32) -> Vec<String> {
        let entries = self.entries.read().await;
        (from..from.saturating_add(size))
            .map_while(|index| entries.get(&index).cloned())
            .collect()
    }

    async fn is_populated(&self, from: u32, end: u32) -> bool {
        let entries = self.entries.read().await;
        (from..end).all(|index| entries.contains_key(&index))
    }

    /// Address at `index`, fetched from the device on a miss.
    pub async fn get_address<D: HardwareWallet + ?Sized>(
        &self,
        device: &D,
        policy: &DerivationPathPolicy,
        index: u32,
    ) -> Result<String, SignerError> {
        if let Some(address) = self.get(index).await {
            debug!("Address cache hit at index {}", index);
            return Ok(address);
        }

        let path = policy.bip32_for(index)?;
        let address = device
            .get_address(&path)
            .await
            .map_err(SignerError::DeviceUnavailable)?;
        Ok(self.insert(index, to_checksum_address(&address)).await)
    }

    /// Up to `size` addresses starting at `from`, in index order.
    ///
    /// Unless every index of the page is already cached, the whole page is requested from the
    /// device in one bundle. If another bulk fetch is in flight, returns the cached part of the
    /// page immediately. The guard is released on every exit path, including when the returned
    /// future is dropped.
    pub async fn get_addresses_page<D: HardwareWallet + ?Sized>(
        &self,
        device: &D,
        policy: &DerivationPathPolicy,
        from: u32,
        size: u32,
    ) -> Result<Vec<String>, SignerError> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let _guard = match self.bulk_fetch.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Bulk fetch in flight, serving cached page at {}", from);
                return Ok(self.cached_page(from, size).await);
            }
        };

        let end = from.checked_add(size).ok_or_else(|| {
            SignerError::InvalidDerivationPath(format!("Page {}+{} is out of range", from, size))
        })?;

        if self.is_populated(from, end).await {
            debug!("Page [{}, {}) already cached", from, end);
            return Ok(self.cached_page(from, size).await);
        }

        let paths = (from..end)
            .map(|index| policy.bip32_for(index))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Fetching addresses [{}, {}) from the device", from, end);
        let addresses = device
            .get_addresses(&paths)
            .await
            .map_err(SignerError::DeviceUnavailable)?;
        if addresses.len() != paths.len() {
            return Err(SignerError::DeviceUnavailable(DeviceError::InvalidResponse(
                format!("Expected {} addresses, got {}", paths.len(), addresses.len()),
            )));
        }

        {
            let mut entries = self.entries.write().await;
            for (index, address) in (from..end).zip(addresses.iter()) {
                entries
                    .entry(index)
                    .or_insert_with(|| to_checksum_address(address));
            }
        }

        Ok(self.cached_page(from, size).await)
    }

    /// Like [`Self::get_addresses_page`], but a failed fetch yields an empty page.
    pub async fn get_addresses_page_or_empty<D: HardwareWallet + ?Sized>(
        &self,
        device: &D,
        policy: &DerivationPathPolicy,
        from: u32,
        size: u32,
    ) -> Vec<String> {
        match self.get_addresses_page(device, policy, from, size).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to fetch addresses [{}, +{}): {}", from, size, e);
                Vec::new()
            }
        }
    }
}
