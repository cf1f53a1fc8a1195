use sdk::DeviceError;

/// Error type of the network provider collaborator.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the signer.
#[derive(Debug)]
pub enum SignerError {
    /// The transaction request is missing a required field or holds an unparsable one.
    InvalidTransaction(String),
    /// The derivation path for an index cannot be built.
    InvalidDerivationPath(String),
    /// The device could not be reached or answered nonsense while fetching addresses.
    DeviceUnavailable(DeviceError),
    /// The device rejected or failed a signing request.
    SigningFailed(DeviceError),
    /// The provider failed to fill in nonce, gas or chain id.
    PopulationFailed(ProviderError),
    /// The provider failed to broadcast the signed transaction.
    BroadcastFailed(ProviderError),
}

impl std::fmt::Display for SignerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerError::InvalidTransaction(e) => write!(f, "Invalid transaction: {}", e),
            SignerError::InvalidDerivationPath(e) => write!(f, "Invalid derivation path: {}", e),
            SignerError::DeviceUnavailable(e) => write!(f, "Device unavailable: {}", e),
            SignerError::SigningFailed(e) => write!(f, "Signing failed: {}", e),
            SignerError::PopulationFailed(e) => write!(f, "Population failed: {}", e),
            SignerError::BroadcastFailed(e) => write!(f, "Broadcast failed: {}", e),
        }
    }
}

impl std::error::Error for SignerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignerError::DeviceUnavailable(e) | SignerError::SigningFailed(e) => Some(e),
            SignerError::PopulationFailed(e) | SignerError::BroadcastFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
