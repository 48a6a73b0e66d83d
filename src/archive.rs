//! File-backed archive store
//!
//! [`InMemoryArchive`] holds an archive dump: public keys, command rows, and
//! for each state hash the ids of the commands on the chain ending there. It
//! deserializes straight from JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::ArchiveError;
use crate::records::{InternalCommandRow, UserCommandRow};
use crate::traits::{ArchiveStore, KeyStore};
use crate::types::{KeyId, PublicKey};

/// Commands on the chain ending at one state hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCommands {
    #[serde(default)]
    pub user_command_ids: Vec<i64>,
    #[serde(default)]
    pub internal_command_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryArchive {
    #[serde(default)]
    pub public_keys: BTreeMap<KeyId, String>,
    #[serde(default)]
    pub chains: BTreeMap<String, ChainCommands>,
    #[serde(default)]
    pub user_commands: BTreeMap<i64, Vec<UserCommandRow>>,
    #[serde(default)]
    pub internal_commands: BTreeMap<i64, Vec<InternalCommandRow>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_key(mut self, id: KeyId, key: &PublicKey) -> Self {
        self.public_keys.insert(id, key.to_hex());
        self
    }

    /// Store a raw key encoding, valid or not
    pub fn with_encoded_key(mut self, id: KeyId, encoded: impl Into<String>) -> Self {
        self.public_keys.insert(id, encoded.into());
        self
    }

    /// Add an internal command with its rows to the chain ending at `state_hash`
    pub fn with_internal_command(mut self, state_hash: &str, id: i64, rows: Vec<InternalCommandRow>) -> Self {
        self.chains
            .entry(state_hash.to_string())
            .or_default()
            .internal_command_ids
            .push(id);
        self.internal_commands.insert(id, rows);
        self
    }

    /// Add a user command with its rows to the chain ending at `state_hash`
    pub fn with_user_command(mut self, state_hash: &str, id: i64, rows: Vec<UserCommandRow>) -> Self {
        self.chains
            .entry(state_hash.to_string())
            .or_default()
            .user_command_ids
            .push(id);
        self.user_commands.insert(id, rows);
        self
    }

    /// Register a chain with no commands
    pub fn with_chain(mut self, state_hash: &str) -> Self {
        self.chains.entry(state_hash.to_string()).or_default();
        self
    }

    fn chain(&self, query: &'static str, state_hash: &str) -> Result<&ChainCommands, ArchiveError> {
        self.chains.get(state_hash).ok_or_else(|| ArchiveError::QueryFailed {
            query,
            reason: format!("unknown state hash {}", state_hash),
        })
    }
}

impl KeyStore for InMemoryArchive {
    fn encoded_public_key(&self, id: KeyId) -> Result<Option<String>, ArchiveError> {
        Ok(self.public_keys.get(&id).cloned())
    }
}

impl ArchiveStore for InMemoryArchive {
    fn user_command_ids(&self, target_state_hash: &str) -> Result<Vec<i64>, ArchiveError> {
        Ok(self.chain("user_command_ids", target_state_hash)?.user_command_ids.clone())
    }

    fn internal_command_ids(&self, target_state_hash: &str) -> Result<Vec<i64>, ArchiveError> {
        Ok(self.chain("internal_command_ids", target_state_hash)?.internal_command_ids.clone())
    }

    fn user_command(&self, id: i64) -> Result<Vec<UserCommandRow>, ArchiveError> {
        Ok(self.user_commands.get(&id).cloned().unwrap_or_default())
    }

    fn internal_command(&self, id: i64) -> Result<Vec<InternalCommandRow>, ArchiveError> {
        Ok(self.internal_commands.get(&id).cloned().unwrap_or_default())
    }
}
