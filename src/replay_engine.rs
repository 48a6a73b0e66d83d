//! Replay engine with builder pattern for deterministic ledger replay

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::{debug, error, info, info_span, trace};
use crate::archive::InMemoryArchive;
use crate::config::ReplayConfig;
use crate::context::ReplayContext;
use crate::error::{LedgerError, ReplayError};
use crate::hasher::LedgerHasher;
use crate::loader::{referenced_key_ids, verify_order, ArchiveLoader};
use crate::merger::{MergeStep, OrderingMerger};
use crate::precollector::FeeTransferPrecollector;
use crate::records::{InternalCommandRecord, OrderKey, UserCommandRecord};
use crate::trace::{ReplayTrace, TraceEventType};
use crate::traits::{ArchiveStore, KeyStore, Ledger};
use crate::translator::{CommandTranslator, InternalTransaction};
use crate::types::{Account, PerformanceMetrics, ReplayInput, ReplayOutput, ReplayReport};

/// Where a replay run currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayPhase {
    Idle,
    Precollecting,
    Merging,
    /// Applying the step at this position in the merged order
    Applying { step: usize },
    Finalized,
    Aborted { reason: String },
}

impl ReplayPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplayPhase::Finalized | ReplayPhase::Aborted { .. })
    }
}

impl fmt::Display for ReplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayPhase::Idle => write!(f, "idle"),
            ReplayPhase::Precollecting => write!(f, "precollecting"),
            ReplayPhase::Merging => write!(f, "merging"),
            ReplayPhase::Applying { step } => write!(f, "applying step {}", step),
            ReplayPhase::Finalized => write!(f, "finalized"),
            ReplayPhase::Aborted { reason } => write!(f, "aborted: {}", reason),
        }
    }
}

/// Everything a successful run produces
#[derive(Debug)]
pub struct ReplayOutcome<L> {
    /// Full account set read back from the ledger
    pub target_ledger: Vec<Account>,
    pub report: ReplayReport,
    pub trace: ReplayTrace,
    /// The ledger the run mutated
    pub ledger: L,
}

impl<L> ReplayOutcome<L> {
    /// Pair the final ledger with the target named by `input`
    pub fn to_output(&self, input: &ReplayInput) -> ReplayOutput {
        ReplayOutput {
            target_state_hash: input.target_state_hash.clone(),
            target_proof: input.target_proof.clone(),
            target_ledger: self.target_ledger.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct StepCounts {
    internal: usize,
    combined: usize,
    user: usize,
    skipped: usize,
}

/// Drives one archive replay from genesis to the target ledger.
///
/// Each run builds a fresh ledger and [`ReplayContext`]; nothing carries over
/// between runs except the engine's configuration.
#[derive(Debug)]
pub struct ReplayEngine<L: Ledger> {
    genesis: Vec<Account>,
    config: ReplayConfig,
    hasher: LedgerHasher,
    phase: ReplayPhase,
    _ledger: PhantomData<L>,
}

impl<L: Ledger> ReplayEngine<L> {
    pub fn new(genesis: Vec<Account>, config: ReplayConfig) -> Self {
        Self {
            genesis,
            config,
            hasher: LedgerHasher::new(),
            phase: ReplayPhase::Idle,
            _ledger: PhantomData,
        }
    }

    pub fn builder() -> ReplayEngineBuilder<L> {
        ReplayEngineBuilder::new()
    }

    pub fn genesis(&self) -> &[Account] {
        &self.genesis
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn phase(&self) -> &ReplayPhase {
        &self.phase
    }

    /// Load every command on the chain ending at `target_state_hash` and replay it
    ///
    /// # Arguments
    /// * `archive` - Archive holding the chain, its command rows and key table
    /// * `target_state_hash` - State hash of the last block to replay
    ///
    /// # Returns
    /// The final ledger, its account snapshot, a report and the step trace.
    /// On any error the engine is left in `ReplayPhase::Aborted` and nothing
    /// from the partial run is returned.
    pub fn replay<A: ArchiveStore + ?Sized>(
        &mut self,
        archive: &A,
        target_state_hash: &str,
    ) -> Result<ReplayOutcome<L>, ReplayError> {
        let span = info_span!("replay", target_state_hash = %target_state_hash);
        let _guard = span.enter();

        self.phase = ReplayPhase::Idle;
        let loaded = ArchiveLoader::new(archive, &self.config).load(target_state_hash);
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => return Err(self.abort(e)),
        };
        self.replay_records(archive, &loaded.internal, &loaded.user)
    }

    /// Replay already-loaded records.
    ///
    /// # Arguments
    /// * `keys` - Key table used to resolve every key id in the records
    /// * `internal` - Internal commands sorted by `(slot, sequence, secondary)`
    /// * `user` - User commands sorted by `(slot, sequence)`
    ///
    /// # Returns
    /// The same outcome as [`replay`](Self::replay). The first error
    /// encountered aborts the run.
    pub fn replay_records<K: KeyStore + ?Sized>(
        &mut self,
        keys: &K,
        internal: &[InternalCommandRecord],
        user: &[UserCommandRecord],
    ) -> Result<ReplayOutcome<L>, ReplayError> {
        self.phase = ReplayPhase::Idle;
        match self.run(keys, internal, user) {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn abort(&mut self, e: ReplayError) -> ReplayError {
        error!(phase = %self.phase, error = %e, "replay aborted");
        self.phase = ReplayPhase::Aborted { reason: e.to_string() };
        e
    }

    fn enter(&mut self, phase: ReplayPhase) {
        info!(from = %self.phase, to = %phase, "replay phase transition");
        self.phase = phase;
    }

    fn run<K: KeyStore + ?Sized>(
        &mut self,
        keys: &K,
        internal: &[InternalCommandRecord],
        user: &[UserCommandRecord],
    ) -> Result<ReplayOutcome<L>, ReplayError> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        if self.config.verify_order {
            verify_order(internal, user)?;
        }

        let mut ledger = L::from_genesis(&self.genesis).map_err(ReplayError::Genesis)?;
        let mut context = ReplayContext::new();

        if self.config.prefetch_keys {
            self.prefetch_keys(keys, &mut context, internal, user)?;
        }

        self.enter(ReplayPhase::Precollecting);
        FeeTransferPrecollector::run(internal, keys, &mut context)?;

        self.enter(ReplayPhase::Merging);
        let translator = CommandTranslator::new(keys);
        let mut trace = ReplayTrace::new(started_at);
        let mut counts = StepCounts::default();

        for (step_index, step) in OrderingMerger::new(internal, user).enumerate() {
            let step = step?;
            let key = step.order_key();
            self.phase = ReplayPhase::Applying { step: step_index };
            debug!(step = step_index, order_key = %key, records = step.record_count(), "applying step");

            let event = match step {
                MergeStep::Internal(record) => match translator.translate_internal(&mut context, record)? {
                    Some(InternalTransaction::FeeTransfer(fee_transfer)) => {
                        ledger
                            .apply_fee_transfer(record.global_slot, &fee_transfer)
                            .map_err(application_failed(key))?;
                        counts.internal += 1;
                        TraceEventType::FeeTransfer
                    }
                    Some(InternalTransaction::Coinbase(coinbase)) => {
                        ledger
                            .apply_coinbase(record.global_slot, &coinbase)
                            .map_err(application_failed(key))?;
                        counts.internal += 1;
                        TraceEventType::Coinbase {
                            with_fee_transfer: coinbase.fee_transfer().is_some(),
                        }
                    }
                    None => {
                        trace!(order_key = %key, kind = %record.kind, "no standalone transaction");
                        counts.skipped += 1;
                        TraceEventType::Skipped(record.kind)
                    }
                },
                MergeStep::CombinedFeeTransfer(first, second) => {
                    let fee_transfer = translator.translate_combined(&mut context, first, second)?;
                    ledger
                        .apply_fee_transfer(first.global_slot, &fee_transfer)
                        .map_err(application_failed(key))?;
                    counts.combined += 1;
                    TraceEventType::CombinedFeeTransfer
                }
                MergeStep::User(record) => {
                    let command = translator.translate_user(&mut context, record)?;
                    ledger
                        .apply_user_command(record.global_slot, &command)
                        .map_err(application_failed(key))?;
                    counts.user += 1;
                    TraceEventType::UserCommand(record.kind)
                }
            };
            trace.record(step_index, key, event);
        }

        let target_ledger = ledger.accounts();
        let ledger_hash = self.hasher.hash(&target_ledger)?;
        trace.complete(Utc::now());

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let applied = counts.internal + counts.combined + counts.user;
        let transactions_per_second = if duration_ms > 0 {
            applied as f64 / (duration_ms as f64 / 1000.0)
        } else {
            0.0
        };

        let report = ReplayReport {
            internal_commands_applied: counts.internal,
            combined_fee_transfers_applied: counts.combined,
            user_commands_applied: counts.user,
            records_skipped: counts.skipped,
            ledger_hash,
            started_at,
            performance_metrics: PerformanceMetrics {
                total_duration_ms: duration_ms,
                transactions_per_second,
            },
        };

        self.enter(ReplayPhase::Finalized);
        info!(
            transactions = report.transactions_applied(),
            skipped = report.records_skipped,
            accounts = target_ledger.len(),
            ledger_hash = %report.ledger_hash,
            duration_ms,
            "replay finalized"
        );

        Ok(ReplayOutcome {
            target_ledger,
            report,
            trace,
            ledger,
        })
    }

    fn prefetch_keys<K: KeyStore + ?Sized>(
        &self,
        keys: &K,
        context: &mut ReplayContext,
        internal: &[InternalCommandRecord],
        user: &[UserCommandRecord],
    ) -> Result<usize, ReplayError> {
        let parallel = self.config.parallel_fetch;
        let resolver = context.keys_mut();
        let ids = referenced_key_ids(internal, user);
        Ok(match self.config.fetch_pool()? {
            Some(pool) => pool.install(|| resolver.prefetch(keys, ids, parallel)),
            None => resolver.prefetch(keys, ids, parallel),
        })
    }
}

impl<L: Ledger> ReplayEngine<L> {
    /// Run a replay described by `input` against a file-backed archive
    pub fn replay_input(
        input: &ReplayInput,
        archive: &InMemoryArchive,
        config: ReplayConfig,
    ) -> Result<(ReplayOutput, ReplayOutcome<L>), ReplayError> {
        let mut engine = ReplayEngine::<L>::new(input.genesis_ledger.clone(), config);
        let outcome = engine.replay(archive, &input.target_state_hash)?;
        Ok((outcome.to_output(input), outcome))
    }
}

fn application_failed(key: OrderKey) -> impl FnOnce(LedgerError) -> ReplayError {
    move |source| ReplayError::LedgerApplicationFailed {
        global_slot: key.global_slot,
        sequence_no: key.sequence_no,
        source,
    }
}

/// Builder for constructing replay engines with a fluent API
pub struct ReplayEngineBuilder<L: Ledger> {
    genesis: Option<Vec<Account>>,
    config: Option<ReplayConfig>,
    _ledger: PhantomData<L>,
}

impl<L: Ledger> ReplayEngineBuilder<L> {
    pub fn new() -> Self {
        Self {
            genesis: None,
            config: None,
            _ledger: PhantomData,
        }
    }

    /// Set the accounts the ledger starts from
    pub fn with_genesis(mut self, genesis: Vec<Account>) -> Self {
        self.genesis = Some(genesis);
        self
    }

    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the replay engine
    pub fn build(self) -> Result<ReplayEngine<L>, String> {
        let genesis = self.genesis.ok_or("Genesis ledger is required")?;
        let config = self.config.unwrap_or_default();
        if config.fetch_threads == Some(0) {
            return Err("Fetch thread count must be positive".to_string());
        }

        Ok(ReplayEngine::new(genesis, config))
    }
}

impl<L: Ledger> Default for ReplayEngineBuilder<L> {
    fn default() -> Self {
        Self::new()
    }
}
