/// Derivation path template of the standard Ethereum account; the address index is appended.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/";

/// Chain id used when neither the request nor the provider sets one.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Number of addresses returned by a page request that does not name a size.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Signer settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    pub chain_id: u64,
    pub derivation_path: String,
    /// Index the signer starts on; `HardwareSigner::set_address_index` moves it.
    pub address_index: u32,
    pub page_size: u32,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            address_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SignerConfig {
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_derivation_path(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = path.into();
        self
    }

    pub fn with_address_index(mut self, index: u32) -> Self {
        self.address_index = index;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}
