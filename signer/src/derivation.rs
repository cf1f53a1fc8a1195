use std::str::FromStr;

use common::types::Bip32Path;

use crate::error::SignerError;

/// Maps an address index to its derivation path by appending it to a base template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPathPolicy {
    base: String,
}

impl DerivationPathPolicy {
    /// `base` must end in an open component, e.g. `m/44'/60'/0'/0/`.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path string of the account at `index`.
    pub fn path_for(&self, index: u32) -> String {
        format!("{}{}", self.base, index)
    }

    /// Path of the account at `index`, in the form the device consumes.
    pub fn bip32_for(&self, index: u32) -> Result<Bip32Path, SignerError> {
        let path = self.path_for(index);
        Bip32Path::from_str(&path)
            .map_err(|e| SignerError::InvalidDerivationPath(format!("{}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DERIVATION_PATH;

    #[test]
    fn test_path_for() {
        let policy = DerivationPathPolicy::new(DEFAULT_DERIVATION_PATH);
        assert_eq!(policy.path_for(0), "m/44'/60'/0'/0/0");
        assert_eq!(policy.path_for(17), "m/44'/60'/0'/0/17");
    }

    #[test]
    fn test_bip32_for() {
        let policy = DerivationPathPolicy::new(DEFAULT_DERIVATION_PATH);
        assert_eq!(policy.bip32_for(3).unwrap(), Bip32Path::ethereum(0, 0, 3));
    }

    #[test]
    fn test_index_out_of_range() {
        let policy = DerivationPathPolicy::new(DEFAULT_DERIVATION_PATH);
        assert!(matches!(
            policy.bip32_for(0x8000_0000),
            Err(SignerError::InvalidDerivationPath(_))
        ));
    }

    #[test]
    fn test_custom_base() {
        let policy = DerivationPathPolicy::new("m/44'/60'/");
        assert_eq!(policy.path_for(2), "m/44'/60'/2");
        assert!(policy.bip32_for(2).is_ok());
    }

    #[test]
    fn test_malformed_base() {
        let policy = DerivationPathPolicy::new("m/44'/sixty'/0'/0/");
        assert!(matches!(
            policy.bip32_for(0),
            Err(SignerError::InvalidDerivationPath(_))
        ));
    }
}
