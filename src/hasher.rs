//! Ledger snapshot hashing using Blake3

use blake3::Hasher as Blake3Hasher;
use crate::error::SerializationError;
use crate::types::{Account, LedgerHash};

/// LedgerHasher digests an account snapshot
///
/// Accounts are put in canonical `(public_key, token_id)` order and encoded
/// with bincode before hashing, so two ledgers holding the same accounts hash
/// identically regardless of how the ledger enumerates them.
#[derive(Debug, Clone, Default)]
pub struct LedgerHasher;

impl LedgerHasher {
    pub fn new() -> Self {
        Self
    }

    /// Compute the hash of an account snapshot
    ///
    /// # Arguments
    /// * `accounts` - The accounts to hash, in any order
    ///
    /// # Returns
    /// A LedgerHash containing the 32-byte Blake3 digest
    ///
    /// # Errors
    /// `SerializationFailed` if an account cannot be bincode encoded
    pub fn hash(&self, accounts: &[Account]) -> Result<LedgerHash, SerializationError> {
        let mut sorted: Vec<&Account> = accounts.iter().collect();
        sorted.sort_by(|a, b| (a.public_key, a.token_id).cmp(&(b.public_key, b.token_id)));

        let mut hasher = Blake3Hasher::new();
        for account in sorted {
            let encoded = bincode::serialize(account).map_err(|e| SerializationError::SerializationFailed {
                reason: format!("Bincode serialization failed: {}", e),
            })?;
            hasher.update(&encoded);
        }

        Ok(LedgerHash(*hasher.finalize().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, PublicKey};

    fn account(byte: u8, balance: u64) -> Account {
        Account::with_balance(PublicKey::new([byte; 32], false), Amount(balance))
    }

    #[test]
    fn test_hash_consistency() {
        let hasher = LedgerHasher::new();
        let accounts = vec![account(1, 10), account(2, 20)];

        assert_eq!(hasher.hash(&accounts).unwrap(), hasher.hash(&accounts).unwrap());
    }

    #[test]
    fn test_hash_ignores_enumeration_order() {
        let hasher = LedgerHasher::new();
        let forward = vec![account(1, 10), account(2, 20)];
        let backward = vec![account(2, 20), account(1, 10)];

        assert_eq!(hasher.hash(&forward).unwrap(), hasher.hash(&backward).unwrap());
    }

    #[test]
    fn test_hash_different_balances() {
        let hasher = LedgerHasher::new();
        let a = hasher.hash(&[account(1, 10)]).unwrap();
        let b = hasher.hash(&[account(1, 11)]).unwrap();

        assert_ne!(a, b, "Different balances should produce different hashes");
    }
}
