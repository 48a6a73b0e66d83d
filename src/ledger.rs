//! Reference in-memory ledger
//!
//! Plain balance arithmetic over a map of accounts. It does not check nonces
//! or signatures, charge account creation fees, or maintain a Merkle tree;
//! archived commands were already validated when they were included.

use std::collections::BTreeMap;
use tracing::trace;
use crate::error::LedgerError;
use crate::traits::Ledger;
use crate::transaction::{Coinbase, CommandBody, FeeTransfer, ValidatedUserCommand};
use crate::types::{Account, Amount, GlobalSlot, Nonce, PublicKey, TokenId};

type AccountId = (PublicKey, TokenId);

/// Prior state of every account an application touched, `None` where the
/// application created the account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerUndo {
    previous: Vec<(AccountId, Option<Account>)>,
}

impl LedgerUndo {
    pub fn touched(&self) -> usize {
        self.previous.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: BTreeMap<AccountId, Account>,
    next_token_id: u64,
}

impl InMemoryLedger {
    pub fn get(&self, public_key: &PublicKey, token_id: TokenId) -> Option<&Account> {
        self.accounts.get(&(*public_key, token_id))
    }

    pub fn balance(&self, public_key: &PublicKey, token_id: TokenId) -> Option<Amount> {
        self.get(public_key, token_id).map(|a| a.balance)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Put the touched accounts back the way they were
    fn revert(&mut self, undo: LedgerUndo) {
        for (id, previous) in undo.previous.into_iter().rev() {
            match previous {
                Some(account) => {
                    self.accounts.insert(id, account);
                }
                None => {
                    self.accounts.remove(&id);
                }
            }
        }
    }

    /// Run `f` as one atomic application
    fn atomically<F>(&mut self, f: F) -> Result<LedgerUndo, LedgerError>
    where
        F: FnOnce(&mut Self, &mut LedgerUndo) -> Result<(), LedgerError>,
    {
        let mut undo = LedgerUndo::default();
        match f(self, &mut undo) {
            Ok(()) => Ok(undo),
            Err(e) => {
                self.revert(undo);
                Err(e)
            }
        }
    }

    fn remember(&self, undo: &mut LedgerUndo, id: AccountId) {
        undo.previous.push((id, self.accounts.get(&id).cloned()));
    }

    fn credit(&mut self, undo: &mut LedgerUndo, public_key: PublicKey, token_id: TokenId, amount: Amount) -> Result<(), LedgerError> {
        let id = (public_key, token_id);
        self.remember(undo, id);
        let account = self
            .accounts
            .entry(id)
            .or_insert_with(|| Account::empty(public_key, token_id));
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { public_key, token_id })?;
        Ok(())
    }

    fn debit(&mut self, undo: &mut LedgerUndo, public_key: PublicKey, token_id: TokenId, amount: Amount) -> Result<(), LedgerError> {
        let id = (public_key, token_id);
        self.remember(undo, id);
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound { public_key, token_id })?;
        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                public_key,
                token_id,
                required: amount,
                available: account.balance,
            })?;
        Ok(())
    }

    fn require_owner(&self, public_key: PublicKey, token_id: TokenId) -> Result<(), LedgerError> {
        match self.accounts.get(&(public_key, token_id)) {
            Some(account) if account.token_owner => Ok(()),
            _ => Err(LedgerError::NotTokenOwner { public_key, token_id }),
        }
    }

    fn apply_body(&mut self, undo: &mut LedgerUndo, body: &CommandBody) -> Result<(), LedgerError> {
        match body {
            CommandBody::Payment { source, receiver, token_id, amount } => {
                self.debit(undo, *source, *token_id, *amount)?;
                self.credit(undo, *receiver, *token_id, *amount)
            }
            CommandBody::StakeDelegation { delegator, new_delegate } => {
                let id = (*delegator, TokenId::DEFAULT);
                self.remember(undo, id);
                let account = self.accounts.get_mut(&id).ok_or(LedgerError::AccountNotFound {
                    public_key: *delegator,
                    token_id: TokenId::DEFAULT,
                })?;
                account.delegate = Some(*new_delegate);
                Ok(())
            }
            CommandBody::CreateNewToken { token_owner } => {
                let token_id = TokenId(self.next_token_id);
                self.next_token_id += 1;
                let id = (*token_owner, token_id);
                self.remember(undo, id);
                let mut account = Account::empty(*token_owner, token_id);
                account.token_owner = true;
                self.accounts.insert(id, account);
                Ok(())
            }
            CommandBody::CreateTokenAccount { token_id, token_owner, receiver } => {
                self.require_owner(*token_owner, *token_id)?;
                let id = (*receiver, *token_id);
                if self.accounts.contains_key(&id) {
                    return Err(LedgerError::AccountExists { public_key: *receiver, token_id: *token_id });
                }
                self.remember(undo, id);
                self.accounts.insert(id, Account::empty(*receiver, *token_id));
                Ok(())
            }
            CommandBody::MintTokens { token_id, token_owner, receiver, amount } => {
                self.require_owner(*token_owner, *token_id)?;
                if !self.accounts.contains_key(&(*receiver, *token_id)) {
                    return Err(LedgerError::AccountNotFound { public_key: *receiver, token_id: *token_id });
                }
                self.credit(undo, *receiver, *token_id, *amount)
            }
        }
    }
}

impl Ledger for InMemoryLedger {
    type Undo = LedgerUndo;

    fn from_genesis(accounts: &[Account]) -> Result<Self, LedgerError> {
        let mut ledger = InMemoryLedger::default();
        for account in accounts {
            let id = (account.public_key, account.token_id);
            if ledger.accounts.insert(id, account.clone()).is_some() {
                return Err(LedgerError::DuplicateGenesisAccount {
                    public_key: account.public_key,
                    token_id: account.token_id,
                });
            }
        }

        let highest_token = ledger
            .accounts
            .keys()
            .map(|(_, token_id)| token_id.0)
            .max()
            .unwrap_or(TokenId::DEFAULT.0);
        ledger.next_token_id = highest_token.max(TokenId::DEFAULT.0) + 1;
        Ok(ledger)
    }

    fn apply_fee_transfer(&mut self, slot: GlobalSlot, fee_transfer: &FeeTransfer) -> Result<LedgerUndo, LedgerError> {
        trace!(global_slot = %slot, receivers = fee_transfer.receivers().count(), "applying fee transfer");
        self.atomically(|ledger, undo| {
            for single in fee_transfer.receivers() {
                ledger.credit(undo, single.receiver, single.fee_token, single.fee.into())?;
            }
            Ok(())
        })
    }

    fn apply_coinbase(&mut self, slot: GlobalSlot, coinbase: &Coinbase) -> Result<LedgerUndo, LedgerError> {
        trace!(global_slot = %slot, receiver = %coinbase.receiver(), amount = %coinbase.amount(), "applying coinbase");
        self.atomically(|ledger, undo| {
            let mut reward = coinbase.amount();
            if let Some(ft) = coinbase.fee_transfer() {
                let fee = Amount::from(ft.fee);
                // Coinbase::new guarantees the fee fits in the amount
                reward = reward.checked_sub(fee).unwrap_or(Amount::ZERO);
                ledger.credit(undo, ft.receiver, TokenId::DEFAULT, fee)?;
            }
            ledger.credit(undo, *coinbase.receiver(), TokenId::DEFAULT, reward)
        })
    }

    fn apply_user_command(&mut self, slot: GlobalSlot, command: &ValidatedUserCommand) -> Result<LedgerUndo, LedgerError> {
        let payload = command.payload();
        trace!(global_slot = %slot, fee_payer = %payload.fee_payer, fee = %payload.fee, "applying user command");
        self.atomically(|ledger, undo| {
            ledger.debit(undo, payload.fee_payer, payload.fee_token, payload.fee.into())?;
            if let Some(account) = ledger.accounts.get_mut(&(payload.fee_payer, payload.fee_token)) {
                account.nonce = Nonce(account.nonce.0.wrapping_add(1));
            }
            ledger.apply_body(undo, &payload.body)
        })
    }

    fn accounts(&self) -> Vec<Account> {
        self.accounts.values().cloned().collect()
    }
}
