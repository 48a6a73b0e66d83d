//! Core data types for the ledger replayer

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use crate::error::KeyError;

/// Monotonically increasing block-time index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalSlot(pub u64);

impl fmt::Display for GlobalSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a row in the archive's public key table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub i64);

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u64);

impl TokenId {
    /// The native token every fee is paid in
    pub const DEFAULT: TokenId = TokenId(1);

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fee(pub u64);

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl From<Fee> for Amount {
    fn from(fee: Fee) -> Self {
        Amount(fee.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub u32);

/// Compressed public key: the x coordinate plus the parity of y.
///
/// Stored and serialized as 66 hex characters, the 32 bytes of `x` followed
/// by a `00` or `01` parity byte.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey {
    pub x: [u8; 32],
    pub is_odd: bool,
}

impl PublicKey {
    pub const ENCODED_LEN: usize = 33;

    pub fn new(x: [u8; 32], is_odd: bool) -> Self {
        Self { x, is_odd }
    }

    /// Decode a key from its stored hex encoding
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(encoded)?;
        if bytes.len() != Self::ENCODED_LEN {
            return Err(KeyError::InvalidLength {
                expected: Self::ENCODED_LEN,
                actual: bytes.len(),
            });
        }

        let is_odd = match bytes[32] {
            0 => false,
            1 => true,
            other => return Err(KeyError::InvalidParity(other)),
        };

        let mut x = [0u8; 32];
        x.copy_from_slice(&bytes[..32]);
        Ok(Self { x, is_odd })
    }

    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(Self::ENCODED_LEN);
        bytes.extend_from_slice(&self.x);
        bytes.push(u8::from(self.is_odd));
        hex::encode(bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PublicKey::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// A single ledger account, identified by `(public_key, token_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub public_key: PublicKey,
    #[serde(default)]
    pub token_id: TokenId,
    pub balance: Amount,
    #[serde(default)]
    pub nonce: Nonce,
    #[serde(default)]
    pub delegate: Option<PublicKey>,
    #[serde(default)]
    pub token_owner: bool,
}

impl Account {
    /// An empty account holding `token_id`
    pub fn empty(public_key: PublicKey, token_id: TokenId) -> Self {
        Self {
            public_key,
            token_id,
            balance: Amount::ZERO,
            nonce: Nonce::default(),
            delegate: None,
            token_owner: false,
        }
    }

    pub fn with_balance(public_key: PublicKey, balance: Amount) -> Self {
        Self {
            balance,
            ..Self::empty(public_key, TokenId::DEFAULT)
        }
    }
}

/// Blake3 digest of a ledger snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerHash(pub [u8; 32]);

impl fmt::Display for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Input record for a replay run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayInput {
    pub target_state_hash: String,
    pub target_proof: serde_json::Value,
    pub genesis_ledger: Vec<Account>,
}

/// Output record, produced only when a replay completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutput {
    pub target_state_hash: String,
    pub target_proof: serde_json::Value,
    pub target_ledger: Vec<Account>,
}

/// Counts and metrics for a completed replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub internal_commands_applied: usize,
    pub combined_fee_transfers_applied: usize,
    pub user_commands_applied: usize,
    pub records_skipped: usize,
    pub ledger_hash: LedgerHash,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub performance_metrics: PerformanceMetrics,
}

impl ReplayReport {
    /// Number of ledger calls made during the run
    pub fn transactions_applied(&self) -> usize {
        self.internal_commands_applied + self.combined_fee_transfers_applied + self.user_commands_applied
    }
}

/// Performance metrics for a replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_duration_ms: u64,
    pub transactions_per_second: f64,
}
