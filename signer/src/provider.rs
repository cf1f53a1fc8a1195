//! The network collaborator: chain parameters, transaction population and broadcast.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::normalize::{Quantity, TransactionRequest};

/// Hash of a broadcast transaction, as reported by the network.
pub type TxHash = String;

/// Read access to chain state and submission of signed transactions.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    async fn gas_price(&self) -> Result<Quantity, ProviderError>;

    /// Number of transactions sent from `address`, i.e. the next nonce.
    async fn transaction_count(&self, address: &str) -> Result<u64, ProviderError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<Quantity, ProviderError>;

    /// Broadcasts a `0x`-prefixed raw signed transaction.
    async fn send_raw_transaction(&self, raw: &str) -> Result<TxHash, ProviderError>;

    /// Fills the fields of `tx` that the caller left out for a transaction sent from `from`.
    ///
    /// Fails if `tx` names a different sender.
    async fn populate_transaction(
        &self,
        mut tx: TransactionRequest,
        from: &str,
    ) -> Result<TransactionRequest, ProviderError> {
        match &tx.from {
            Some(requested) if !requested.eq_ignore_ascii_case(from) => {
                return Err(format!("from address mismatch: {} != {}", requested, from).into());
            }
            Some(_) => {}
            None => tx.from = Some(from.to_string()),
        }

        if tx.nonce.is_none() {
            tx.nonce = Some(self.transaction_count(from).await?.into());
        }
        if tx.gas_price.is_none() {
            tx.gas_price = Some(self.gas_price().await?);
        }
        // chain id 0 means unset
        if matches!(tx.chain_id, None | Some(0)) {
            tx.chain_id = Some(self.chain_id().await?);
        }
        if tx.gas_limit.is_none() {
            tx.gas_limit = Some(self.estimate_gas(&tx).await?);
        }
        Ok(tx)
    }
}

/// Provider for hosts without network access; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

impl OfflineProvider {
    fn unavailable<T>(&self, what: &str) -> Result<T, ProviderError> {
        Err(format!("No network provider configured ({})", what).into())
    }
}

#[async_trait]
impl Provider for OfflineProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        self.unavailable("chain_id")
    }

    async fn gas_price(&self) -> Result<Quantity, ProviderError> {
        self.unavailable("gas_price")
    }

    async fn transaction_count(&self, _address: &str) -> Result<u64, ProviderError> {
        self.unavailable("transaction_count")
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<Quantity, ProviderError> {
        self.unavailable("estimate_gas")
    }

    async fn send_raw_transaction(&self, _raw: &str) -> Result<TxHash, ProviderError> {
        self.unavailable("send_raw_transaction")
    }
}
