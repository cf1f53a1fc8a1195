//! Transaction requests and their normalization into the form the device protocol expects.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::config::SignerConfig;
use crate::error::SignerError;

/// An arbitrary-precision non-negative integer, either as a number or as hex text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quantity {
    Int(BigUint),
    /// `0x`-prefixed hex digits.
    Hex(String),
}

impl Quantity {
    /// Numeric value; hex text must be `0x` followed by at least one hex digit.
    pub fn to_biguint(&self) -> Result<BigUint, SignerError> {
        match self {
            Quantity::Int(n) => Ok(n.clone()),
            Quantity::Hex(s) => {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .ok_or_else(|| SignerError::InvalidTransaction(format!("'{}' lacks 0x", s)))?;
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(SignerError::InvalidTransaction(format!(
                        "'{}' is not a hex quantity",
                        s
                    )));
                }
                BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| {
                    SignerError::InvalidTransaction(format!("'{}' is not a hex quantity", s))
                })
            }
        }
    }

    /// Lowercase `0x` hex without leading zeros; zero is `0x0`.
    pub fn to_canonical_hex(&self) -> Result<String, SignerError> {
        Ok(format!("0x{:x}", self.to_biguint()?))
    }

    /// Minimal big-endian bytes; zero is the empty string.
    pub fn to_be_bytes(&self) -> Result<Vec<u8>, SignerError> {
        let n = self.to_biguint()?;
        if n.is_zero() {
            return Ok(Vec::new());
        }
        Ok(n.to_bytes_be())
    }

    fn canonical(&self) -> Result<Quantity, SignerError> {
        self.to_canonical_hex().map(Quantity::Hex)
    }
}

impl From<u64> for Quantity {
    fn from(n: u64) -> Self {
        Quantity::Int(BigUint::from(n))
    }
}

impl From<u128> for Quantity {
    fn from(n: u128) -> Self {
        Quantity::Int(BigUint::from(n))
    }
}

impl From<BigUint> for Quantity {
    fn from(n: BigUint) -> Self {
        Quantity::Int(n)
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Quantity::Hex(s.to_string())
    }
}

impl From<String> for Quantity {
    fn from(s: String) -> Self {
        Quantity::Hex(s)
    }
}

/// A transaction as the application describes it. Only `gas_price` is required for signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<Quantity>,
    pub gas_price: Option<Quantity>,
    pub gas_limit: Option<Quantity>,
    pub nonce: Option<Quantity>,
    pub data: Option<Vec<u8>>,
    pub chain_id: Option<u64>,
}

impl TransactionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn value(mut self, value: impl Into<Quantity>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn gas_price(mut self, gas_price: impl Into<Quantity>) -> Self {
        self.gas_price = Some(gas_price.into());
        self
    }

    pub fn gas_limit(mut self, gas_limit: impl Into<Quantity>) -> Self {
        self.gas_limit = Some(gas_limit.into());
        self
    }

    pub fn nonce(mut self, nonce: impl Into<Quantity>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
}

/// A request whose value and gas price are canonical hex and whose chain id is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTransaction {
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<Quantity>,
    pub gas_price: Quantity,
    pub gas_limit: Option<Quantity>,
    pub nonce: Option<Quantity>,
    pub data: Option<Vec<u8>>,
    pub chain_id: u64,
}

impl From<NormalizedTransaction> for TransactionRequest {
    fn from(tx: NormalizedTransaction) -> Self {
        Self {
            from: tx.from,
            to: tx.to,
            value: tx.value,
            gas_price: Some(tx.gas_price),
            gas_limit: tx.gas_limit,
            nonce: tx.nonce,
            data: tx.data,
            chain_id: Some(tx.chain_id),
        }
    }
}

/// Brings `request` into the field set the device protocol expects.
///
/// A numeric `value` becomes canonical hex (hex text is kept as given), `gas_price` always
/// becomes canonical hex and a missing or zero `chain_id` is taken from `config`. Everything else
/// passes through.
pub fn normalize(
    request: TransactionRequest,
    config: &SignerConfig,
) -> Result<NormalizedTransaction, SignerError> {
    let gas_price = request
        .gas_price
        .as_ref()
        .ok_or_else(|| SignerError::InvalidTransaction("gas price is required".to_string()))?
        .canonical()?;

    let value = match request.value {
        Some(value @ Quantity::Int(_)) => Some(value.canonical()?),
        other => other,
    };

    Ok(NormalizedTransaction {
        from: request.from,
        to: request.to,
        value,
        gas_price,
        gas_limit: request.gas_limit,
        nonce: request.nonce,
        data: request.data,
        chain_id: request
            .chain_id
            .filter(|&id| id != 0)
            .unwrap_or(config.chain_id),
    })
}
