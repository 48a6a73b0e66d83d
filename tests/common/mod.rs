#![allow(dead_code)]

use ledger_replay::error::LedgerError;
use ledger_replay::transaction::CommandBody;
use ledger_replay::{
    Account, Amount, Coinbase, Fee, FeeTransfer, GlobalSlot, InMemoryArchive, InternalCommandRow, KeyId, Ledger,
    PublicKey, TokenId, UserCommandRow, ValidatedUserCommand,
};

pub const TARGET: &str = "3NKtargetStateHash";

/// One call across the ledger boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    FeeTransfer {
        slot: GlobalSlot,
        receivers: Vec<(PublicKey, Fee)>,
    },
    Coinbase {
        slot: GlobalSlot,
        receiver: PublicKey,
        amount: Amount,
        fee_transfer: Option<(PublicKey, Fee)>,
    },
    UserCommand {
        slot: GlobalSlot,
        fee_payer: PublicKey,
        fee: Fee,
        body: CommandBody,
    },
}

/// Ledger that accepts everything and records each call
#[derive(Debug, Default)]
pub struct RecordingLedger {
    pub genesis: Vec<Account>,
    pub calls: Vec<LedgerCall>,
}

impl Ledger for RecordingLedger {
    type Undo = ();

    fn from_genesis(accounts: &[Account]) -> Result<Self, LedgerError> {
        Ok(Self {
            genesis: accounts.to_vec(),
            calls: Vec::new(),
        })
    }

    fn apply_fee_transfer(&mut self, slot: GlobalSlot, fee_transfer: &FeeTransfer) -> Result<(), LedgerError> {
        self.calls.push(LedgerCall::FeeTransfer {
            slot,
            receivers: fee_transfer.receivers().map(|s| (s.receiver, s.fee)).collect(),
        });
        Ok(())
    }

    fn apply_coinbase(&mut self, slot: GlobalSlot, coinbase: &Coinbase) -> Result<(), LedgerError> {
        self.calls.push(LedgerCall::Coinbase {
            slot,
            receiver: *coinbase.receiver(),
            amount: coinbase.amount(),
            fee_transfer: coinbase.fee_transfer().map(|ft| (ft.receiver, ft.fee)),
        });
        Ok(())
    }

    fn apply_user_command(&mut self, slot: GlobalSlot, command: &ValidatedUserCommand) -> Result<(), LedgerError> {
        let payload = command.payload();
        self.calls.push(LedgerCall::UserCommand {
            slot,
            fee_payer: payload.fee_payer,
            fee: payload.fee,
            body: payload.body.clone(),
        });
        Ok(())
    }

    fn accounts(&self) -> Vec<Account> {
        self.genesis.clone()
    }
}

pub fn key(id: i64) -> PublicKey {
    let mut x = [0u8; 32];
    x[..8].copy_from_slice(&id.to_be_bytes());
    PublicKey::new(x, id % 2 == 1)
}

/// Archive that knows the keys for every id in `ids`
pub fn archive_with_keys(ids: impl IntoIterator<Item = i64>) -> InMemoryArchive {
    ids.into_iter()
        .fold(InMemoryArchive::new().with_chain(TARGET), |archive, id| {
            archive.with_public_key(KeyId(id), &key(id))
        })
}

pub fn internal_row(kind: &str, slot: u64, seq: u32, secondary: u32, receiver: i64, fee: u64) -> InternalCommandRow {
    InternalCommandRow {
        kind: kind.to_string(),
        global_slot: GlobalSlot(slot),
        sequence_no: seq,
        secondary_sequence_no: secondary,
        receiver_id: KeyId(receiver),
        fee: Fee(fee),
        token_id: TokenId::DEFAULT,
    }
}

pub fn user_row(kind: &str, slot: u64, seq: u32, source: i64, receiver: i64, fee: u64, amount: Option<u64>) -> UserCommandRow {
    UserCommandRow {
        kind: kind.to_string(),
        global_slot: GlobalSlot(slot),
        sequence_no: seq,
        source_id: KeyId(source),
        receiver_id: KeyId(receiver),
        fee_payer_id: KeyId(source),
        token_id: TokenId::DEFAULT,
        fee_token_id: TokenId::DEFAULT,
        fee: Fee(fee),
        amount: amount.map(Amount),
    }
}

pub fn funded(ids: impl IntoIterator<Item = i64>, balance: u64) -> Vec<Account> {
    ids.into_iter()
        .map(|id| Account::with_balance(key(id), Amount(balance)))
        .collect()
}
