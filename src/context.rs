//! Per-run replay state
//!
//! Everything a replay run caches lives in a [`ReplayContext`]. A context is
//! built fresh for each run and dropped with it, so nothing leaks from one run
//! into the next.

use std::collections::HashMap;
use crate::error::ReplayError;
use crate::key_resolver::KeyResolver;
use crate::records::OrderKey;
use crate::transaction::CoinbaseFeeTransfer;

/// Fee transfers attached to coinbases, keyed by the coinbase's order key
#[derive(Debug, Default)]
pub struct CoinbaseFeeTransfers {
    entries: HashMap<OrderKey, CoinbaseFeeTransfer>,
}

impl CoinbaseFeeTransfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fee transfer; a second transfer under the same key is an error
    pub fn insert(&mut self, key: OrderKey, fee_transfer: CoinbaseFeeTransfer) -> Result<(), ReplayError> {
        if self.entries.contains_key(&key) {
            return Err(ReplayError::DuplicateCombinedKey {
                global_slot: key.global_slot,
                sequence_no: key.sequence_no,
            });
        }
        self.entries.insert(key, fee_transfer);
        Ok(())
    }

    pub fn get(&self, key: &OrderKey) -> Option<&CoinbaseFeeTransfer> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State owned by a single replay run
#[derive(Debug, Default)]
pub struct ReplayContext {
    keys: KeyResolver,
    coinbase_fee_transfers: CoinbaseFeeTransfers,
}

impl ReplayContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyResolver {
        &mut self.keys
    }

    pub fn coinbase_fee_transfers(&self) -> &CoinbaseFeeTransfers {
        &self.coinbase_fee_transfers
    }

    pub fn coinbase_fee_transfers_mut(&mut self) -> &mut CoinbaseFeeTransfers {
        &mut self.coinbase_fee_transfers
    }
}
