//! One signing round trip: project the normalized transaction onto the device's field set, ask
//! the device for a signature and serialize the signed transaction.

use common::types::{parse_address, Bip32Path, Signature, TransactionFields};
use log::debug;
use sdk::{DeviceError, HardwareWallet};

use crate::error::SignerError;
use crate::normalize::{NormalizedTransaction, Quantity};

fn quantity_bytes(quantity: Option<&Quantity>) -> Result<Vec<u8>, SignerError> {
    quantity.map_or(Ok(Vec::new()), Quantity::to_be_bytes)
}

/// The fields of `tx` in the encoding the device signs; missing integers are zero.
pub fn project(tx: &NormalizedTransaction) -> Result<TransactionFields, SignerError> {
    let to = tx
        .to
        .as_deref()
        .map(parse_address)
        .transpose()
        .map_err(SignerError::InvalidTransaction)?;

    Ok(TransactionFields {
        nonce: quantity_bytes(tx.nonce.as_ref())?,
        gas_price: tx.gas_price.to_be_bytes()?,
        gas_limit: quantity_bytes(tx.gas_limit.as_ref())?,
        to,
        value: quantity_bytes(tx.value.as_ref())?,
        data: tx.data.clone().unwrap_or_default(),
        chain_id: tx.chain_id,
    })
}

/// A transaction together with the device's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub fields: TransactionFields,
    pub signature: Signature,
}

impl SignedTransaction {
    /// Raw transaction bytes as the network expects them.
    pub fn raw(&self) -> Vec<u8> {
        self.fields.encode_signed(&self.signature)
    }

    /// `0x`-prefixed hex of [`Self::raw`].
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.raw()))
    }
}

fn check_signature(signature: &Signature, chain_id: u64) -> Result<(), DeviceError> {
    if signature.recovery_id(chain_id).is_none() {
        return Err(DeviceError::InvalidResponse(format!(
            "v = {} does not belong to chain {}",
            signature.v, chain_id
        )));
    }
    if signature.r == [0u8; 32] || signature.s == [0u8; 32] {
        return Err(DeviceError::InvalidResponse(
            "Signature has a zero component".to_string(),
        ));
    }
    Ok(())
}

/// Signs `tx` with the key at `path`. The device is asked exactly once; a rejection or a
/// malformed signature is returned as [`SignerError::SigningFailed`].
pub async fn sign_with_device<D: HardwareWallet + ?Sized>(
    device: &D,
    tx: &NormalizedTransaction,
    path: &Bip32Path,
) -> Result<SignedTransaction, SignerError> {
    let fields = project(tx)?;

    debug!("Requesting signature for chain {} at {}", fields.chain_id, path);
    let signature = device
        .sign_transaction(path, &fields)
        .await
        .map_err(SignerError::SigningFailed)?;
    check_signature(&signature, fields.chain_id).map_err(SignerError::SigningFailed)?;

    Ok(SignedTransaction { fields, signature })
}
