//! Replay run configuration

use serde::{Deserialize, Serialize};
use crate::error::ReplayError;

/// Tunables for a replay run. None of them change the replay result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Fetch archive rows and public keys on the rayon pool
    pub parallel_fetch: bool,
    /// Thread cap for parallel fetches; rayon's global pool when `None`
    pub fetch_threads: Option<usize>,
    /// Resolve every referenced key before applying anything
    pub prefetch_keys: bool,
    /// Check that both streams are strictly ordered before merging
    pub verify_order: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            parallel_fetch: true,
            fetch_threads: None,
            prefetch_keys: true,
            verify_order: true,
        }
    }
}

impl ReplayConfig {
    /// Everything on the calling thread, keys resolved lazily
    pub fn sequential() -> Self {
        Self {
            parallel_fetch: false,
            prefetch_keys: false,
            ..Self::default()
        }
    }

    pub fn with_parallel_fetch(mut self, parallel: bool) -> Self {
        self.parallel_fetch = parallel;
        self
    }

    pub fn with_fetch_threads(mut self, threads: usize) -> Self {
        self.fetch_threads = Some(threads);
        self
    }

    pub fn with_prefetch_keys(mut self, prefetch: bool) -> Self {
        self.prefetch_keys = prefetch;
        self
    }

    pub fn with_verify_order(mut self, verify: bool) -> Self {
        self.verify_order = verify;
        self
    }

    /// Dedicated rayon pool for parallel fetches when a thread cap is set
    pub fn fetch_pool(&self) -> Result<Option<rayon::ThreadPool>, ReplayError> {
        match self.fetch_threads {
            Some(threads) if self.parallel_fetch => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("replay-fetch-{}", i))
                .build()
                .map(Some)
                .map_err(|e| ReplayError::Config {
                    reason: format!("Failed to build fetch thread pool: {}", e),
                }),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_disables_parallelism() {
        let config = ReplayConfig::sequential();
        assert!(!config.parallel_fetch);
        assert!(!config.prefetch_keys);
        assert!(config.verify_order);
    }

    #[test]
    fn test_fetch_pool_only_with_thread_cap() {
        assert!(ReplayConfig::default().fetch_pool().unwrap().is_none());

        let pool = ReplayConfig::default().with_fetch_threads(2).fetch_pool().unwrap();
        assert_eq!(pool.map(|p| p.current_num_threads()), Some(2));

        let sequential = ReplayConfig::sequential().with_fetch_threads(2);
        assert!(sequential.fetch_pool().unwrap().is_none());
    }
}
