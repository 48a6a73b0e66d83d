//! Translation of archive records into transaction values

use crate::context::ReplayContext;
use crate::error::ReplayError;
use crate::records::{InternalCommandKind, InternalCommandRecord, UserCommandKind, UserCommandRecord};
use crate::traits::KeyStore;
use crate::transaction::{
    Coinbase, CommandBody, CommandPayload, FeeTransfer, Memo, SignedCommand, SingleFeeTransfer, Signature,
    ValidatedUserCommand,
};
use crate::types::{Amount, Nonce};

/// Transaction produced from a single internal command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalTransaction {
    FeeTransfer(FeeTransfer),
    Coinbase(Coinbase),
}

/// Maps records plus resolved keys to transaction values
pub struct CommandTranslator<'a, K: KeyStore + ?Sized> {
    store: &'a K,
}

impl<'a, K: KeyStore + ?Sized> CommandTranslator<'a, K> {
    pub fn new(store: &'a K) -> Self {
        Self { store }
    }

    /// Translate one internal command.
    ///
    /// `FeeTransferViaCoinbase` yields `None`: the coinbase at the same order
    /// key already carries it.
    pub fn translate_internal(
        &self,
        context: &mut ReplayContext,
        record: &InternalCommandRecord,
    ) -> Result<Option<InternalTransaction>, ReplayError> {
        match record.kind {
            InternalCommandKind::FeeTransfer => {
                let single = self.single_fee_transfer(context, record)?;
                Ok(Some(InternalTransaction::FeeTransfer(FeeTransfer::of_single(single))))
            }
            InternalCommandKind::Coinbase => {
                let receiver = context.keys_mut().resolve(self.store, record.receiver_id)?;
                let fee_transfer = context
                    .coinbase_fee_transfers()
                    .get(&record.order_key())
                    .cloned();

                let coinbase = Coinbase::new(receiver, Amount::from(record.fee), record.token_id, fee_transfer)
                    .map_err(|source| ReplayError::InvalidCoinbase {
                        global_slot: record.global_slot,
                        sequence_no: record.sequence_no,
                        source,
                    })?;
                Ok(Some(InternalTransaction::Coinbase(coinbase)))
            }
            InternalCommandKind::FeeTransferViaCoinbase => Ok(None),
        }
    }

    /// Translate two same-key `FeeTransfer` records into one transaction
    pub fn translate_combined(
        &self,
        context: &mut ReplayContext,
        first: &InternalCommandRecord,
        second: &InternalCommandRecord,
    ) -> Result<FeeTransfer, ReplayError> {
        let first_single = self.single_fee_transfer(context, first)?;
        let second_single = self.single_fee_transfer(context, second)?;

        FeeTransfer::of_pair(first_single, second_single).map_err(|source| ReplayError::InvalidCombinedFeeTransfer {
            global_slot: first.global_slot,
            sequence_no: first.sequence_no,
            source,
        })
    }

    /// Translate a user command into a command the ledger can apply
    pub fn translate_user(
        &self,
        context: &mut ReplayContext,
        record: &UserCommandRecord,
    ) -> Result<ValidatedUserCommand, ReplayError> {
        let keys = context.keys_mut();
        let source = keys.resolve(self.store, record.source_id)?;
        let receiver = keys.resolve(self.store, record.receiver_id)?;
        let fee_payer = keys.resolve(self.store, record.fee_payer_id)?;

        let body = match record.kind {
            UserCommandKind::Payment => CommandBody::Payment {
                source,
                receiver,
                token_id: record.token_id,
                amount: required_amount(record)?,
            },
            UserCommandKind::Delegation => CommandBody::StakeDelegation {
                delegator: source,
                new_delegate: receiver,
            },
            UserCommandKind::CreateToken => CommandBody::CreateNewToken { token_owner: source },
            UserCommandKind::CreateAccount => CommandBody::CreateTokenAccount {
                token_id: record.token_id,
                token_owner: source,
                receiver,
            },
            UserCommandKind::MintTokens => CommandBody::MintTokens {
                token_id: record.token_id,
                token_owner: source,
                receiver,
                amount: required_amount(record)?,
            },
        };

        let payload = CommandPayload {
            fee: record.fee,
            fee_token: record.fee_token_id,
            fee_payer,
            nonce: Nonce(0),
            valid_until: None,
            memo: Memo::empty(),
            body,
        };

        let command = SignedCommand {
            payload,
            signer: fee_payer,
            signature: Signature::PLACEHOLDER,
        };
        Ok(ValidatedUserCommand::trust_archived_signature(command))
    }

    fn single_fee_transfer(
        &self,
        context: &mut ReplayContext,
        record: &InternalCommandRecord,
    ) -> Result<SingleFeeTransfer, ReplayError> {
        let receiver = context.keys_mut().resolve(self.store, record.receiver_id)?;
        Ok(SingleFeeTransfer::new(receiver, record.fee, record.token_id))
    }
}

fn required_amount(record: &UserCommandRecord) -> Result<Amount, ReplayError> {
    record.amount.ok_or(ReplayError::MissingAmount {
        kind: record.kind,
        global_slot: record.global_slot,
        sequence_no: record.sequence_no,
    })
}
