//! Transaction values handed to the ledger
//!
//! Constructors enforce the value-level constraints of each transaction kind.
//! Anything built here is well formed; whether it applies cleanly is up to
//! the ledger.

use serde::{Deserialize, Serialize};
use crate::error::TransactionError;
use crate::types::{Amount, Fee, GlobalSlot, Nonce, PublicKey, TokenId};

/// Fee paid to one receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleFeeTransfer {
    pub receiver: PublicKey,
    pub fee: Fee,
    pub fee_token: TokenId,
}

impl SingleFeeTransfer {
    pub fn new(receiver: PublicKey, fee: Fee, fee_token: TokenId) -> Self {
        Self { receiver, fee, fee_token }
    }
}

/// A fee transfer to one or two receivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTransfer {
    first: SingleFeeTransfer,
    second: Option<SingleFeeTransfer>,
}

impl FeeTransfer {
    pub fn of_single(single: SingleFeeTransfer) -> Self {
        Self { first: single, second: None }
    }

    /// Combine two singles into one transaction; both must pay in the same token
    pub fn of_pair(first: SingleFeeTransfer, second: SingleFeeTransfer) -> Result<Self, TransactionError> {
        if first.fee_token != second.fee_token {
            return Err(TransactionError::MismatchedFeeTokens {
                first: first.fee_token,
                second: second.fee_token,
            });
        }
        Ok(Self { first, second: Some(second) })
    }

    pub fn fee_token(&self) -> TokenId {
        self.first.fee_token
    }

    pub fn receivers(&self) -> impl Iterator<Item = &SingleFeeTransfer> {
        std::iter::once(&self.first).chain(self.second.iter())
    }

    pub fn is_combined(&self) -> bool {
        self.second.is_some()
    }
}

/// Fee transfer paid out of a coinbase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseFeeTransfer {
    pub receiver: PublicKey,
    pub fee: Fee,
}

impl CoinbaseFeeTransfer {
    pub fn new(receiver: PublicKey, fee: Fee) -> Self {
        Self { receiver, fee }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coinbase {
    receiver: PublicKey,
    amount: Amount,
    fee_transfer: Option<CoinbaseFeeTransfer>,
}

impl Coinbase {
    /// Build a coinbase in `token_id`, optionally carrying a fee transfer.
    ///
    /// The attached fee comes out of the coinbase amount, so it may not exceed
    /// it. A transfer back to the coinbase receiver is dropped; it nets to zero.
    pub fn new(
        receiver: PublicKey,
        amount: Amount,
        token_id: TokenId,
        fee_transfer: Option<CoinbaseFeeTransfer>,
    ) -> Result<Self, TransactionError> {
        if !token_id.is_default() {
            return Err(TransactionError::NonDefaultCoinbaseToken { token_id });
        }

        let fee_transfer = match fee_transfer {
            Some(ft) if Amount::from(ft.fee) > amount => {
                return Err(TransactionError::FeeExceedsCoinbase { fee: ft.fee, amount });
            }
            Some(ft) if ft.receiver == receiver => None,
            other => other,
        };

        Ok(Self { receiver, amount, fee_transfer })
    }

    pub fn receiver(&self) -> &PublicKey {
        &self.receiver
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn fee_transfer(&self) -> Option<&CoinbaseFeeTransfer> {
        self.fee_transfer.as_ref()
    }
}

/// What a user command does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandBody {
    Payment {
        source: PublicKey,
        receiver: PublicKey,
        token_id: TokenId,
        amount: Amount,
    },
    StakeDelegation {
        delegator: PublicKey,
        new_delegate: PublicKey,
    },
    CreateNewToken {
        token_owner: PublicKey,
    },
    CreateTokenAccount {
        token_id: TokenId,
        token_owner: PublicKey,
        receiver: PublicKey,
    },
    MintTokens {
        token_id: TokenId,
        token_owner: PublicKey,
        receiver: PublicKey,
        amount: Amount,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo(String);

impl Memo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub fee: Fee,
    pub fee_token: TokenId,
    pub fee_payer: PublicKey,
    pub nonce: Nonce,
    pub valid_until: Option<GlobalSlot>,
    pub memo: Memo,
    pub body: CommandBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Stand-in for a signature that was checked when the command was archived
    pub const PLACEHOLDER: Signature = Signature([0u8; 64]);
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(serde::de::Error::custom)?;
        let array: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))?;
        Ok(Signature(array))
    }
}

/// A user command with its signer and signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommand {
    pub payload: CommandPayload,
    /// The fee payer's key; keys are carried in compressed form throughout
    pub signer: PublicKey,
    pub signature: Signature,
}

/// A user command the ledger may apply without checking its signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedUserCommand(SignedCommand);

impl ValidatedUserCommand {
    /// Promote an archived command to validated without verifying its signature.
    ///
    /// Only sound for commands read back from the archive: the block producer
    /// checked every signature before the command was included, and the
    /// archive does not store signatures. Never use this on commands from any
    /// other source.
    pub fn trust_archived_signature(command: SignedCommand) -> Self {
        Self(command)
    }

    pub fn command(&self) -> &SignedCommand {
        &self.0
    }

    pub fn payload(&self) -> &CommandPayload {
        &self.0.payload
    }

    pub fn into_inner(self) -> SignedCommand {
        self.0
    }
}
