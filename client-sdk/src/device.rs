//! Typed requests to the signing device.
//!
//! [`HardwareWallet`] is the seam the signer talks to; [`DeviceClient`] implements it on top of
//! any [`Transport`] by exchanging postcard-encoded [`Request`]/[`Response`] messages.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use common::error::Error as AppError;
use common::message::{Request, Response};
use common::types::{Bip32Path, EthAddress, Signature, TransactionFields};

use crate::comm::{self, SendMessageError};
use crate::transport::Transport;

/// Errors that can occur when talking to the device.
#[derive(Debug)]
pub enum DeviceError {
    /// Error exchanging the message.
    SendMessage(SendMessageError),
    /// Device returned an error response.
    App(AppError),
    /// Device response was of the wrong type or shape.
    InvalidResponse(String),
    /// Request could not be encoded or response decoded.
    Serialization(String),
}

impl From<SendMessageError> for DeviceError {
    fn from(e: SendMessageError) -> Self {
        Self::SendMessage(e)
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::SendMessage(e) => write!(f, "SendMessageError: {}", e),
            DeviceError::App(e) => write!(f, "DeviceError: {}", e),
            DeviceError::InvalidResponse(e) => write!(f, "InvalidResponse: {}", e),
            DeviceError::Serialization(e) => write!(f, "SerializationError: {}", e),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::SendMessage(e) => Some(e),
            _ => None,
        }
    }
}

/// Operations a hardware signer offers to the host.
///
/// Every call is a round trip to the device and may wait for the user to confirm on the
/// device; callers that need bounded latency wrap the future in a timeout.
#[async_trait]
pub trait HardwareWallet: Send + Sync {
    /// Derives the address at `path`.
    async fn get_address(&self, path: &Bip32Path) -> Result<EthAddress, DeviceError>;

    /// Derives the addresses of all `paths` in one request, in request order.
    async fn get_addresses(&self, paths: &[Bip32Path]) -> Result<Vec<EthAddress>, DeviceError>;

    /// Signs `tx` with the key at `path`.
    async fn sign_transaction(
        &self,
        path: &Bip32Path,
        tx: &TransactionFields,
    ) -> Result<Signature, DeviceError>;
}

#[async_trait]
impl<W: HardwareWallet + ?Sized> HardwareWallet for Arc<W> {
    async fn get_address(&self, path: &Bip32Path) -> Result<EthAddress, DeviceError> {
        (**self).get_address(path).await
    }

    async fn get_addresses(&self, paths: &[Bip32Path]) -> Result<Vec<EthAddress>, DeviceError> {
        (**self).get_addresses(paths).await
    }

    async fn sign_transaction(
        &self,
        path: &Bip32Path,
        tx: &TransactionFields,
    ) -> Result<Signature, DeviceError> {
        (**self).sign_transaction(path, tx).await
    }
}

/// Device client over an APDU transport.
///
/// Each request runs to completion on its own task, so a caller that drops the returned future
/// (e.g. on a timeout) never leaves a half-read response on the link for the next request.
pub struct DeviceClient<T: Transport> {
    transport: Arc<T>,
    // a request and its response chunks must not interleave with another request
    exchange_lock: Arc<Mutex<()>>,
}

impl<T: Transport + 'static> DeviceClient<T> {
    /// Creates a new device client with the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            exchange_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Sends a request and parses the response, turning device errors into `DeviceError::App`.
    async fn request(&self, request: &Request) -> Result<Response, DeviceError> {
        let msg = postcard::to_allocvec(request)
            .map_err(|e| DeviceError::Serialization(format!("{:?}: {}", request, e)))?;

        let transport = self.transport.clone();
        let exchange_lock = self.exchange_lock.clone();
        let exchange = tokio::spawn(async move {
            let _guard = exchange_lock.lock_owned().await;
            comm::send_message(transport.as_ref(), &msg).await
        });
        let response_raw = exchange
            .await
            .map_err(|e| SendMessageError::Transport(format!("exchange task failed: {}", e)))??;

        let resp: Response = postcard::from_bytes(&response_raw)
            .map_err(|_| DeviceError::Serialization("Failed to parse response".to_string()))?;

        if let Response::Error(e) = resp {
            return Err(DeviceError::App(e));
        }
        Ok(resp)
    }

    async fn request_address(&self, path: &Bip32Path) -> Result<EthAddress, DeviceError> {
        log::debug!("get address {}", path);
        let request = Request::GetAddress { path: path.clone() };
        match self.request(&request).await? {
            Response::Address(address) => Ok(address),
            e => Err(DeviceError::InvalidResponse(format!(
                "Invalid response: {:?}",
                e
            ))),
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> HardwareWallet for DeviceClient<T> {
    async fn get_address(&self, path: &Bip32Path) -> Result<EthAddress, DeviceError> {
        self.request_address(path).await
    }

    async fn get_addresses(&self, paths: &[Bip32Path]) -> Result<Vec<EthAddress>, DeviceError> {
        log::debug!("get {} addresses starting at {:?}", paths.len(), paths.first());
        let request = Request::GetAddresses {
            paths: paths.to_vec(),
        };
        match self.request(&request).await? {
            Response::Addresses(addresses) if addresses.len() == paths.len() => Ok(addresses),
            Response::Addresses(addresses) => Err(DeviceError::InvalidResponse(format!(
                "Expected {} addresses, got {}",
                paths.len(),
                addresses.len()
            ))),
            e => Err(DeviceError::InvalidResponse(format!(
                "Invalid response: {:?}",
                e
            ))),
        }
    }

    async fn sign_transaction(
        &self,
        path: &Bip32Path,
        tx: &TransactionFields,
    ) -> Result<Signature, DeviceError> {
        log::debug!("sign transaction with {} on chain {}", path, tx.chain_id);
        let request = Request::SignTransaction {
            path: path.clone(),
            tx: tx.clone(),
        };
        match self.request(&request).await? {
            Response::Signature(sig) => Ok(sig),
            e => Err(DeviceError::InvalidResponse(format!(
                "Invalid response: {:?}",
                e
            ))),
        }
    }
}
