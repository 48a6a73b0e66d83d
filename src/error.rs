//! Error types for the ledger replayer
//!
//! Every error is fatal to a replay run. Nothing in the engine recovers,
//! retries, or skips past a failure.

use thiserror::Error;
use crate::records::UserCommandKind;
use crate::types::{Amount, Fee, GlobalSlot, KeyId, PublicKey, TokenId};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Unresolved key: no public key stored for key id {key_id}")]
    UnresolvedKey { key_id: KeyId },

    #[error("Malformed key: key id {key_id} could not be decoded: {source}")]
    MalformedKey {
        key_id: KeyId,
        #[source]
        source: KeyError,
    },

    #[error("Missing amount: {kind} at slot {global_slot}, sequence {sequence_no}")]
    MissingAmount {
        kind: UserCommandKind,
        global_slot: GlobalSlot,
        sequence_no: u32,
    },

    #[error("Unknown command kind: {tag}")]
    UnknownCommandKind { tag: String },

    #[error("Invalid coinbase at slot {global_slot}, sequence {sequence_no}: {source}")]
    InvalidCoinbase {
        global_slot: GlobalSlot,
        sequence_no: u32,
        #[source]
        source: TransactionError,
    },

    #[error("Invalid combined fee transfer at slot {global_slot}, sequence {sequence_no}: {source}")]
    InvalidCombinedFeeTransfer {
        global_slot: GlobalSlot,
        sequence_no: u32,
        #[source]
        source: TransactionError,
    },

    #[error("Conflicting order keys: internal and user commands both at slot {global_slot}, sequence {sequence_no}")]
    ConflictingOrderKeys { global_slot: GlobalSlot, sequence_no: u32 },

    #[error("Ledger application failed for sequence {sequence_no} at slot {global_slot}: {source}")]
    LedgerApplicationFailed {
        global_slot: GlobalSlot,
        sequence_no: u32,
        #[source]
        source: LedgerError,
    },

    #[error("Archive query failed: {0}")]
    ArchiveQueryFailed(#[from] ArchiveError),

    #[error("Empty internal command group: archive returned no rows for internal command {command_id}")]
    EmptyInternalCommandGroup { command_id: i64 },

    #[error("Duplicate combined key: two coinbase fee transfers at slot {global_slot}, sequence {sequence_no}")]
    DuplicateCombinedKey { global_slot: GlobalSlot, sequence_no: u32 },

    #[error("Unordered records: {stream} commands are not strictly ordered at position {position}")]
    UnorderedRecords { stream: &'static str, position: usize },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Ledger initialization failed: {0}")]
    Genesis(#[source] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

/// Errors reported by the ledger boundary.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found: {public_key} (token {token_id})")]
    AccountNotFound { public_key: PublicKey, token_id: TokenId },

    #[error("Account already exists: {public_key} (token {token_id})")]
    AccountExists { public_key: PublicKey, token_id: TokenId },

    #[error("Insufficient balance for {public_key} (token {token_id}): required {required}, available {available}")]
    InsufficientBalance {
        public_key: PublicKey,
        token_id: TokenId,
        required: Amount,
        available: Amount,
    },

    #[error("Balance overflow crediting {public_key} (token {token_id})")]
    Overflow { public_key: PublicKey, token_id: TokenId },

    #[error("Token {token_id} is not owned by {public_key}")]
    NotTokenOwner { public_key: PublicKey, token_id: TokenId },

    #[error("Duplicate genesis account: {public_key} (token {token_id})")]
    DuplicateGenesisAccount { public_key: PublicKey, token_id: TokenId },
}

/// Errors from the archive store.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{query} failed: {reason}")]
    QueryFailed { query: &'static str, reason: String },

    #[error("{query} timed out")]
    Timeout { query: &'static str },
}

/// Value constraints violated while building a transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("attached fee {fee} exceeds coinbase amount {amount}")]
    FeeExceedsCoinbase { fee: Fee, amount: Amount },

    #[error("coinbase fee transfer must use the default token, got token {token_id}")]
    NonDefaultCoinbaseToken { token_id: TokenId },

    #[error("cannot combine fee transfers with different tokens {first} and {second}")]
    MismatchedFeeTokens { first: TokenId, second: TokenId },
}

/// Failures decoding a stored public key.
#[derive(Debug, Error, PartialEq)]
pub enum KeyError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid parity byte {0:#04x}")]
    InvalidParity(u8),
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}
