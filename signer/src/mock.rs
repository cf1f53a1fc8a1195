//! Scriptable in-memory device for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use common::types::{to_checksum_address, Bip32Path, EthAddress, Signature, TransactionFields};
use sdk::{DeviceError, HardwareWallet};
use tokio::sync::Notify;

/// Address the mock reports for the path ending in `index`.
pub fn mock_address(index: u32) -> EthAddress {
    let mut address = [0x11u8; 20];
    address[16..].copy_from_slice(&index.to_be_bytes());
    address
}

pub fn mock_checksummed(index: u32) -> String {
    to_checksum_address(&mock_address(index))
}

fn index_of(path: &Bip32Path) -> u32 {
    path.as_slice().last().copied().unwrap_or_default()
}

#[derive(Default)]
pub struct MockDevice {
    pub single_calls: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    pub bulk_requests: Mutex<Vec<Vec<u32>>>,
    pub signed_paths: Mutex<Vec<Bip32Path>>,
    pub fail: AtomicBool,
    /// Bulk fetches park after notifying `bulk_started` until `release_bulk` is notified.
    pub gated: AtomicBool,
    pub bulk_started: Notify,
    pub release_bulk: Notify,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        let device = Self::default();
        device.gated.store(true, Ordering::SeqCst);
        device
    }

    pub fn failing() -> Self {
        let device = Self::default();
        device.fail.store(true, Ordering::SeqCst);
        device
    }

    fn check_online(&self) -> Result<(), DeviceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeviceError::InvalidResponse("device unplugged".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HardwareWallet for MockDevice {
    async fn get_address(&self, path: &Bip32Path) -> Result<EthAddress, DeviceError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(mock_address(index_of(path)))
    }

    async fn get_addresses(&self, paths: &[Bip32Path]) -> Result<Vec<EthAddress>, DeviceError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.bulk_requests
            .lock()
            .unwrap()
            .push(paths.iter().map(index_of).collect());
        if self.gated.load(Ordering::SeqCst) {
            self.bulk_started.notify_one();
            self.release_bulk.notified().await;
        }
        self.check_online()?;
        Ok(paths.iter().map(|p| mock_address(index_of(p))).collect())
    }

    async fn sign_transaction(
        &self,
        path: &Bip32Path,
        tx: &TransactionFields,
    ) -> Result<Signature, DeviceError> {
        self.check_online()?;
        self.signed_paths.lock().unwrap().push(path.clone());
        Ok(Signature {
            v: tx.chain_id * 2 + 35,
            r: [1u8; 32],
            s: [2u8; 32],
        })
    }
}
