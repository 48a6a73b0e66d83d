//! Key id to public key resolution with a run-scoped cache

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;
use crate::error::ReplayError;
use crate::traits::KeyStore;
use crate::types::{KeyId, PublicKey};

/// Resolves archive key ids, remembering every successful lookup.
///
/// Entries are never evicted or invalidated. That is only sound because a
/// resolver lives for exactly one replay run over immutable archive data.
#[derive(Debug, Default)]
pub struct KeyResolver {
    cache: HashMap<KeyId, PublicKey>,
}

impl KeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a key id, querying the store only on a cache miss
    pub fn resolve<K: KeyStore + ?Sized>(&mut self, store: &K, id: KeyId) -> Result<PublicKey, ReplayError> {
        if let Some(key) = self.cache.get(&id) {
            return Ok(*key);
        }

        let key = fetch_key(store, id)?;
        self.cache.insert(id, key);
        Ok(key)
    }

    /// Warm the cache with every uncached id in one batch.
    ///
    /// Lookups that fail are left out of the cache rather than reported, so
    /// the error comes back from [`resolve`](Self::resolve) at the step that
    /// actually needs the key. Existing entries are kept, first writer wins.
    ///
    /// # Arguments
    /// * `store` - The archive key table
    /// * `ids` - Key ids the run will reference, duplicates allowed
    /// * `parallel` - Run the store lookups on the current rayon pool
    ///
    /// # Returns
    /// The number of keys newly inserted into the cache
    pub fn prefetch<K, I>(&mut self, store: &K, ids: I, parallel: bool) -> usize
    where
        K: KeyStore + ?Sized,
        I: IntoIterator<Item = KeyId>,
    {
        let mut missing: Vec<KeyId> = ids
            .into_iter()
            .filter(|id| !self.cache.contains_key(id))
            .collect();
        missing.sort_unstable();
        missing.dedup();

        let fetched: Vec<(KeyId, Option<PublicKey>)> = if parallel {
            missing
                .par_iter()
                .map(|&id| (id, fetch_key(store, id).ok()))
                .collect()
        } else {
            missing.iter().map(|&id| (id, fetch_key(store, id).ok())).collect()
        };

        let mut inserted = 0;
        for (id, key) in fetched {
            if let Some(key) = key {
                self.cache.entry(id).or_insert(key);
                inserted += 1;
            }
        }

        debug!(
            resolved = inserted,
            deferred = missing.len() - inserted,
            cached = self.cache.len(),
            "prefetched public keys"
        );
        inserted
    }

    pub fn cached(&self, id: KeyId) -> Option<&PublicKey> {
        self.cache.get(&id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn fetch_key<K: KeyStore + ?Sized>(store: &K, id: KeyId) -> Result<PublicKey, ReplayError> {
    let encoded = store
        .encoded_public_key(id)?
        .ok_or(ReplayError::UnresolvedKey { key_id: id })?;

    PublicKey::from_hex(&encoded).map_err(|source| ReplayError::MalformedKey { key_id: id, source })
}
