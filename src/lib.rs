//! Archive ledger replay
//!
//! Rebuilds the ledger at a target state hash by applying every archived
//! internal and user command, in canonical order, to a ledger seeded from
//! genesis. The same archive and genesis always produce the same ledger.

pub mod archive;
pub mod config;
pub mod context;
pub mod error;
pub mod hasher;
pub mod key_resolver;
pub mod ledger;
pub mod loader;
pub mod logging;
pub mod merger;
pub mod precollector;
pub mod records;
pub mod replay_engine;
pub mod serialization;
pub mod trace;
pub mod traits;
pub mod transaction;
pub mod translator;
pub mod types;

pub use archive::InMemoryArchive;
pub use config::ReplayConfig;
pub use context::ReplayContext;
pub use error::{ArchiveError, KeyError, LedgerError, ReplayError, SerializationError, TransactionError};
pub use hasher::LedgerHasher;
pub use key_resolver::KeyResolver;
pub use ledger::{InMemoryLedger, LedgerUndo};
pub use loader::{ArchiveLoader, LoadedCommands};
pub use merger::{MergeStep, OrderingMerger};
pub use precollector::FeeTransferPrecollector;
pub use records::{
    InternalCommandKind, InternalCommandRecord, InternalCommandRow, OrderKey, UserCommandKind, UserCommandRecord,
    UserCommandRow,
};
pub use replay_engine::{ReplayEngine, ReplayEngineBuilder, ReplayOutcome, ReplayPhase};
pub use trace::{ReplayTrace, TraceEvent, TraceEventType};
pub use traits::{ArchiveStore, KeyStore, Ledger};
pub use transaction::{
    Coinbase, CoinbaseFeeTransfer, CommandBody, FeeTransfer, SingleFeeTransfer, ValidatedUserCommand,
};
pub use translator::{CommandTranslator, InternalTransaction};
pub use types::{
    Account, Amount, Fee, GlobalSlot, KeyId, LedgerHash, Nonce, PublicKey, ReplayInput, ReplayOutput, ReplayReport,
    TokenId,
};
