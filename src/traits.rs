//! Boundaries between the replay engine and the systems it drives

use crate::error::{ArchiveError, LedgerError};
use crate::records::{InternalCommandRow, UserCommandRow};
use crate::transaction::{Coinbase, FeeTransfer, ValidatedUserCommand};
use crate::types::{Account, GlobalSlot, KeyId};

/// Identity store mapping key ids to encoded public keys
pub trait KeyStore: Sync {
    /// Fetch the stored encoding of a public key, `None` if there is no row
    fn encoded_public_key(&self, id: KeyId) -> Result<Option<String>, ArchiveError>;
}

/// Archive query layer
///
/// Implementations must be safe to query from several threads at once; the
/// loader may fetch rows in parallel.
pub trait ArchiveStore: KeyStore {
    fn user_command_ids(&self, target_state_hash: &str) -> Result<Vec<i64>, ArchiveError>;

    fn internal_command_ids(&self, target_state_hash: &str) -> Result<Vec<i64>, ArchiveError>;

    /// Rows for a user command; empty if the command was never applied on chain
    fn user_command(&self, id: i64) -> Result<Vec<UserCommandRow>, ArchiveError>;

    /// Rows for an internal command; an empty result is an archive inconsistency
    fn internal_command(&self, id: i64) -> Result<Vec<InternalCommandRow>, ArchiveError>;
}

/// Mutable account store the engine replays into
pub trait Ledger {
    /// Whatever the ledger hands back to reverse an application
    type Undo;

    /// Create a ledger seeded with the genesis accounts
    fn from_genesis(accounts: &[Account]) -> Result<Self, LedgerError>
    where
        Self: Sized;

    fn apply_fee_transfer(&mut self, slot: GlobalSlot, fee_transfer: &FeeTransfer) -> Result<Self::Undo, LedgerError>;

    fn apply_coinbase(&mut self, slot: GlobalSlot, coinbase: &Coinbase) -> Result<Self::Undo, LedgerError>;

    fn apply_user_command(&mut self, slot: GlobalSlot, command: &ValidatedUserCommand) -> Result<Self::Undo, LedgerError>;

    /// Every account currently in the ledger
    fn accounts(&self) -> Vec<Account>;
}
