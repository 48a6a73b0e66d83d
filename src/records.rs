//! Archive rows and the typed command records the engine replays
//!
//! The archive hands back rows whose kind is a free-form tag. Rows are
//! converted into records with a closed kind enum before anything is sorted,
//! so an unrecognized tag fails the run up front.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::ReplayError;
use crate::types::{Amount, Fee, GlobalSlot, KeyId, TokenId};

/// Position of a command in the global application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub global_slot: GlobalSlot,
    pub sequence_no: u32,
}

impl OrderKey {
    pub fn new(global_slot: GlobalSlot, sequence_no: u32) -> Self {
        Self { global_slot, sequence_no }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.global_slot, self.sequence_no)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalCommandKind {
    FeeTransfer,
    Coinbase,
    FeeTransferViaCoinbase,
}

impl InternalCommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeeTransfer => "fee_transfer",
            Self::Coinbase => "coinbase",
            Self::FeeTransferViaCoinbase => "fee_transfer_via_coinbase",
        }
    }
}

impl FromStr for InternalCommandKind {
    type Err = ReplayError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "fee_transfer" => Ok(Self::FeeTransfer),
            "coinbase" => Ok(Self::Coinbase),
            "fee_transfer_via_coinbase" => Ok(Self::FeeTransferViaCoinbase),
            other => Err(ReplayError::UnknownCommandKind { tag: other.to_string() }),
        }
    }
}

impl fmt::Display for InternalCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCommandKind {
    Payment,
    Delegation,
    CreateToken,
    CreateAccount,
    MintTokens,
}

impl UserCommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Delegation => "delegation",
            Self::CreateToken => "create_token",
            Self::CreateAccount => "create_account",
            Self::MintTokens => "mint_tokens",
        }
    }
}

impl FromStr for UserCommandKind {
    type Err = ReplayError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "payment" => Ok(Self::Payment),
            "delegation" => Ok(Self::Delegation),
            "create_token" => Ok(Self::CreateToken),
            "create_account" => Ok(Self::CreateAccount),
            "mint_tokens" => Ok(Self::MintTokens),
            other => Err(ReplayError::UnknownCommandKind { tag: other.to_string() }),
        }
    }
}

impl fmt::Display for UserCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal command row as stored in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalCommandRow {
    #[serde(rename = "type")]
    pub kind: String,
    pub global_slot: GlobalSlot,
    pub sequence_no: u32,
    pub secondary_sequence_no: u32,
    pub receiver_id: KeyId,
    pub fee: Fee,
    #[serde(default)]
    pub token_id: TokenId,
}

/// User command row as stored in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommandRow {
    #[serde(rename = "type")]
    pub kind: String,
    pub global_slot: GlobalSlot,
    pub sequence_no: u32,
    pub source_id: KeyId,
    pub receiver_id: KeyId,
    pub fee_payer_id: KeyId,
    #[serde(default)]
    pub token_id: TokenId,
    #[serde(default)]
    pub fee_token_id: TokenId,
    pub fee: Fee,
    #[serde(default)]
    pub amount: Option<Amount>,
}

/// Protocol-generated ledger effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalCommandRecord {
    pub kind: InternalCommandKind,
    pub global_slot: GlobalSlot,
    pub sequence_no: u32,
    pub secondary_sequence_no: u32,
    pub receiver_id: KeyId,
    pub fee: Fee,
    pub token_id: TokenId,
}

impl InternalCommandRecord {
    pub fn order_key(&self) -> OrderKey {
        OrderKey::new(self.global_slot, self.sequence_no)
    }

    /// Total order key among internal commands
    pub fn full_key(&self) -> (GlobalSlot, u32, u32) {
        (self.global_slot, self.sequence_no, self.secondary_sequence_no)
    }
}

impl TryFrom<InternalCommandRow> for InternalCommandRecord {
    type Error = ReplayError;

    fn try_from(row: InternalCommandRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: row.kind.parse()?,
            global_slot: row.global_slot,
            sequence_no: row.sequence_no,
            secondary_sequence_no: row.secondary_sequence_no,
            receiver_id: row.receiver_id,
            fee: row.fee,
            token_id: row.token_id,
        })
    }
}

/// User-signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommandRecord {
    pub kind: UserCommandKind,
    pub global_slot: GlobalSlot,
    pub sequence_no: u32,
    pub source_id: KeyId,
    pub receiver_id: KeyId,
    pub fee_payer_id: KeyId,
    pub token_id: TokenId,
    pub fee_token_id: TokenId,
    pub fee: Fee,
    pub amount: Option<Amount>,
}

impl UserCommandRecord {
    pub fn order_key(&self) -> OrderKey {
        OrderKey::new(self.global_slot, self.sequence_no)
    }
}

impl TryFrom<UserCommandRow> for UserCommandRecord {
    type Error = ReplayError;

    fn try_from(row: UserCommandRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: row.kind.parse()?,
            global_slot: row.global_slot,
            sequence_no: row.sequence_no,
            source_id: row.source_id,
            receiver_id: row.receiver_id,
            fee_payer_id: row.fee_payer_id,
            token_id: row.token_id,
            fee_token_id: row.fee_token_id,
            fee: row.fee,
            amount: row.amount,
        })
    }
}
