//! Bulk loading of archived commands
//!
//! Rows may be fetched concurrently, but they are always fully materialized
//! and sorted locally before anything downstream sees them. Fetch order never
//! leaks into application order.

use rayon::prelude::*;
use tracing::{debug, info};
use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::records::{InternalCommandRecord, UserCommandRecord};
use crate::traits::ArchiveStore;
use crate::types::KeyId;

/// Both command streams, sorted by their order keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedCommands {
    pub internal: Vec<InternalCommandRecord>,
    pub user: Vec<UserCommandRecord>,
}

impl LoadedCommands {
    /// Build from unsorted records
    pub fn new(mut internal: Vec<InternalCommandRecord>, mut user: Vec<UserCommandRecord>) -> Self {
        internal.sort_by_key(|r| r.full_key());
        user.sort_by_key(|r| r.order_key());
        Self { internal, user }
    }

    /// Every key id either stream refers to, with repeats
    pub fn key_ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        referenced_key_ids(&self.internal, &self.user)
    }

    pub fn len(&self) -> usize {
        self.internal.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.user.is_empty()
    }
}

/// Key ids referenced by the given records, with repeats
pub fn referenced_key_ids<'a>(
    internal: &'a [InternalCommandRecord],
    user: &'a [UserCommandRecord],
) -> impl Iterator<Item = KeyId> + 'a {
    let internal_ids = internal.iter().map(|r| r.receiver_id);
    let user_ids = user
        .iter()
        .flat_map(|r| [r.source_id, r.receiver_id, r.fee_payer_id]);
    internal_ids.chain(user_ids)
}

/// Check that both streams are strictly increasing in their order keys
pub fn verify_order(internal: &[InternalCommandRecord], user: &[UserCommandRecord]) -> Result<(), ReplayError> {
    if let Some(position) = internal.windows(2).position(|w| w[0].full_key() >= w[1].full_key()) {
        return Err(ReplayError::UnorderedRecords { stream: "internal", position: position + 1 });
    }
    if let Some(position) = user.windows(2).position(|w| w[0].order_key() >= w[1].order_key()) {
        return Err(ReplayError::UnorderedRecords { stream: "user", position: position + 1 });
    }
    Ok(())
}

pub struct ArchiveLoader<'a, A: ArchiveStore + ?Sized> {
    archive: &'a A,
    config: &'a ReplayConfig,
}

impl<'a, A: ArchiveStore + ?Sized> ArchiveLoader<'a, A> {
    pub fn new(archive: &'a A, config: &'a ReplayConfig) -> Self {
        Self { archive, config }
    }

    /// Load and sort every command on the chain ending at `target_state_hash`
    pub fn load(&self, target_state_hash: &str) -> Result<LoadedCommands, ReplayError> {
        let mut user_ids = self.archive.user_command_ids(target_state_hash)?;
        user_ids.sort_unstable();
        user_ids.dedup();

        let mut internal_ids = self.archive.internal_command_ids(target_state_hash)?;
        internal_ids.sort_unstable();
        internal_ids.dedup();

        info!(
            user_commands = user_ids.len(),
            internal_commands = internal_ids.len(),
            parallel = self.config.parallel_fetch,
            "fetching archived commands"
        );

        let (internal, user) = if !self.config.parallel_fetch {
            (self.fetch_internal_all(&internal_ids)?, self.fetch_user_all(&user_ids)?)
        } else if let Some(pool) = self.config.fetch_pool()? {
            pool.install(|| self.fetch_parallel(&internal_ids, &user_ids))?
        } else {
            self.fetch_parallel(&internal_ids, &user_ids)?
        };

        let loaded = LoadedCommands::new(internal, user);
        if self.config.verify_order {
            verify_order(&loaded.internal, &loaded.user)?;
        }

        info!(
            internal_records = loaded.internal.len(),
            user_records = loaded.user.len(),
            "loaded archived commands"
        );
        Ok(loaded)
    }

    fn fetch_parallel(
        &self,
        internal_ids: &[i64],
        user_ids: &[i64],
    ) -> Result<(Vec<InternalCommandRecord>, Vec<UserCommandRecord>), ReplayError> {
        let (internal, user) = rayon::join(
            || {
                internal_ids
                    .par_iter()
                    .map(|&id| self.fetch_internal(id))
                    .collect::<Vec<_>>()
            },
            || user_ids.par_iter().map(|&id| self.fetch_user(id)).collect::<Vec<_>>(),
        );

        // Errors surface in id order, internal before user, as in a sequential fetch.
        let internal = internal.into_iter().collect::<Result<Vec<_>, _>>()?;
        let user = user.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok((
            internal.into_iter().flatten().collect(),
            user.into_iter().flatten().collect(),
        ))
    }

    fn fetch_internal_all(&self, ids: &[i64]) -> Result<Vec<InternalCommandRecord>, ReplayError> {
        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            records.extend(self.fetch_internal(id)?);
        }
        Ok(records)
    }

    fn fetch_user_all(&self, ids: &[i64]) -> Result<Vec<UserCommandRecord>, ReplayError> {
        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            records.extend(self.fetch_user(id)?);
        }
        Ok(records)
    }

    fn fetch_internal(&self, id: i64) -> Result<Vec<InternalCommandRecord>, ReplayError> {
        let rows = self.archive.internal_command(id)?;
        if rows.is_empty() {
            return Err(ReplayError::EmptyInternalCommandGroup { command_id: id });
        }
        rows.into_iter().map(InternalCommandRecord::try_from).collect()
    }

    fn fetch_user(&self, id: i64) -> Result<Vec<UserCommandRecord>, ReplayError> {
        let rows = self.archive.user_command(id)?;
        if rows.is_empty() {
            debug!(command_id = id, "user command was not applied on chain");
        }
        rows.into_iter().map(UserCommandRecord::try_from).collect()
    }
}
