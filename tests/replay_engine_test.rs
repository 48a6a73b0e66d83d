mod common;

use common::*;
use ledger_replay::loader::LoadedCommands;
use ledger_replay::transaction::CommandBody;
use ledger_replay::{
    Amount, Fee, GlobalSlot, InMemoryArchive, InMemoryLedger, InternalCommandRecord, KeyId, ReplayConfig,
    ReplayEngine, ReplayError, ReplayPhase, TokenId, TraceEventType, TransactionError, UserCommandKind,
    UserCommandRecord,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn engine(config: ReplayConfig) -> ReplayEngine<RecordingLedger> {
    ReplayEngine::builder()
        .with_genesis(funded([1], 1_000))
        .with_config(config)
        .build()
        .unwrap()
}

fn replay(archive: &InMemoryArchive) -> Result<RecordingLedger, ReplayError> {
    engine(ReplayConfig::default())
        .replay(archive, TARGET)
        .map(|outcome| outcome.ledger)
}

#[test]
fn test_empty_chain_yields_genesis() {
    let archive = archive_with_keys([1]);
    let mut engine = engine(ReplayConfig::default());

    let outcome = engine.replay(&archive, TARGET).unwrap();

    assert_eq!(outcome.target_ledger, funded([1], 1_000));
    assert!(outcome.ledger.calls.is_empty());
    assert!(outcome.trace.events.is_empty());
    assert_eq!(engine.phase(), &ReplayPhase::Finalized);
}

#[test]
fn test_same_key_fee_transfers_combine_into_one_call() {
    let archive = archive_with_keys([2, 3])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer", 4, 2, 0, 2, 10)])
        .with_internal_command(TARGET, 2, vec![internal_row("fee_transfer", 4, 2, 1, 3, 11)]);

    let outcome = engine(ReplayConfig::default()).replay(&archive, TARGET).unwrap();

    assert_eq!(
        outcome.ledger.calls,
        vec![LedgerCall::FeeTransfer {
            slot: GlobalSlot(4),
            receivers: vec![(key(2), Fee(10)), (key(3), Fee(11))],
        }]
    );
    assert_eq!(outcome.report.combined_fee_transfers_applied, 1);
    assert_eq!(outcome.report.internal_commands_applied, 0);
    assert_eq!(outcome.trace.record_count(), 2);
}

#[test]
fn test_fee_transfers_sharing_sequence_number_combine_across_slots() {
    let archive = archive_with_keys([2, 3])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer", 4, 3, 0, 2, 10)])
        .with_internal_command(TARGET, 2, vec![internal_row("fee_transfer", 5, 3, 0, 3, 11)]);

    let ledger = replay(&archive).unwrap();

    assert_eq!(
        ledger.calls,
        vec![LedgerCall::FeeTransfer {
            slot: GlobalSlot(4),
            receivers: vec![(key(2), Fee(10)), (key(3), Fee(11))],
        }]
    );
}

#[test]
fn test_third_same_key_fee_transfer_applies_alone() {
    let archive = archive_with_keys([2, 3, 4])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer", 4, 2, 0, 2, 10)])
        .with_internal_command(TARGET, 2, vec![internal_row("fee_transfer", 4, 2, 1, 3, 11)])
        .with_internal_command(TARGET, 3, vec![internal_row("fee_transfer", 4, 2, 2, 4, 12)]);

    let ledger = replay(&archive).unwrap();

    assert_eq!(
        ledger.calls,
        vec![
            LedgerCall::FeeTransfer {
                slot: GlobalSlot(4),
                receivers: vec![(key(2), Fee(10)), (key(3), Fee(11))],
            },
            LedgerCall::FeeTransfer {
                slot: GlobalSlot(4),
                receivers: vec![(key(4), Fee(12))],
            },
        ]
    );
}

#[test]
fn test_coinbase_absorbs_preceding_via_coinbase_transfer() {
    let z = 7;
    let w = 8;
    let archive = archive_with_keys([z, w])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer_via_coinbase", 9, 0, 0, z, 5)])
        .with_internal_command(TARGET, 2, vec![internal_row("coinbase", 9, 0, 1, w, 20)]);

    let outcome = engine(ReplayConfig::default()).replay(&archive, TARGET).unwrap();

    assert_eq!(
        outcome.ledger.calls,
        vec![LedgerCall::Coinbase {
            slot: GlobalSlot(9),
            receiver: key(w),
            amount: Amount(20),
            fee_transfer: Some((key(z), Fee(5))),
        }]
    );
    assert_eq!(outcome.report.records_skipped, 1);
    assert_eq!(
        outcome.trace.events_by_type(TraceEventType::Coinbase { with_fee_transfer: true }).len(),
        1
    );
}

#[test]
fn test_coinbase_absorbs_following_via_coinbase_transfer() {
    let archive = archive_with_keys([7, 8])
        .with_internal_command(TARGET, 1, vec![internal_row("coinbase", 9, 0, 0, 8, 20)])
        .with_internal_command(TARGET, 2, vec![internal_row("fee_transfer_via_coinbase", 9, 0, 1, 7, 5)]);

    let ledger = replay(&archive).unwrap();

    assert_eq!(ledger.calls.len(), 1);
    assert!(matches!(
        &ledger.calls[0],
        LedgerCall::Coinbase { fee_transfer: Some((receiver, Fee(5))), .. } if *receiver == key(7)
    ));
}

#[test]
fn test_coinbase_without_attached_transfer() {
    let archive = archive_with_keys([8])
        .with_internal_command(TARGET, 1, vec![internal_row("coinbase", 9, 0, 0, 8, 20)]);

    let ledger = replay(&archive).unwrap();

    assert_eq!(
        ledger.calls,
        vec![LedgerCall::Coinbase {
            slot: GlobalSlot(9),
            receiver: key(8),
            amount: Amount(20),
            fee_transfer: None,
        }]
    );
}

#[test]
fn test_oversized_attached_fee_is_invalid_coinbase() {
    let archive = archive_with_keys([7, 8])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer_via_coinbase", 9, 0, 0, 7, 25)])
        .with_internal_command(TARGET, 2, vec![internal_row("coinbase", 9, 0, 1, 8, 20)]);

    let err = replay(&archive).unwrap_err();

    assert!(matches!(
        err,
        ReplayError::InvalidCoinbase {
            source: TransactionError::FeeExceedsCoinbase { .. },
            ..
        }
    ));
}

#[test]
fn test_two_via_coinbase_transfers_at_one_key() {
    let archive = archive_with_keys([7, 8])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer_via_coinbase", 9, 0, 0, 7, 1)])
        .with_internal_command(TARGET, 2, vec![internal_row("fee_transfer_via_coinbase", 9, 0, 1, 8, 1)]);

    let err = replay(&archive).unwrap_err();

    assert!(matches!(err, ReplayError::DuplicateCombinedKey { global_slot: GlobalSlot(9), sequence_no: 0 }));
}

#[test]
fn test_user_command_payload() {
    let archive = archive_with_keys([1, 2])
        .with_user_command(TARGET, 1, vec![user_row("payment", 3, 0, 1, 2, 4, Some(50))])
        .with_user_command(TARGET, 2, vec![user_row("delegation", 3, 1, 1, 2, 4, None)]);

    let ledger = replay(&archive).unwrap();

    assert_eq!(
        ledger.calls,
        vec![
            LedgerCall::UserCommand {
                slot: GlobalSlot(3),
                fee_payer: key(1),
                fee: Fee(4),
                body: CommandBody::Payment {
                    source: key(1),
                    receiver: key(2),
                    token_id: TokenId::DEFAULT,
                    amount: Amount(50),
                },
            },
            LedgerCall::UserCommand {
                slot: GlobalSlot(3),
                fee_payer: key(1),
                fee: Fee(4),
                body: CommandBody::StakeDelegation {
                    delegator: key(1),
                    new_delegate: key(2),
                },
            },
        ]
    );
}

#[test]
fn test_cross_stream_tie_aborts() {
    let archive = archive_with_keys([1, 2])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer", 3, 0, 0, 2, 1)])
        .with_user_command(TARGET, 1, vec![user_row("payment", 3, 0, 1, 2, 1, Some(5))]);
    let mut engine = engine(ReplayConfig::default());

    let err = engine.replay(&archive, TARGET).unwrap_err();

    assert!(matches!(err, ReplayError::ConflictingOrderKeys { global_slot: GlobalSlot(3), sequence_no: 0 }));
    assert!(matches!(engine.phase(), ReplayPhase::Aborted { .. }));
}

#[test]
fn test_key_prefetch_does_not_change_the_reported_error() {
    // Key 99 has no row, but the tie at (3, 0) is reached first.
    let archive = archive_with_keys([1, 2])
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer", 3, 0, 0, 2, 1)])
        .with_user_command(TARGET, 1, vec![user_row("payment", 3, 0, 1, 2, 1, Some(5))])
        .with_user_command(TARGET, 2, vec![user_row("payment", 9, 0, 1, 99, 1, Some(5))]);

    let prefetched = engine(ReplayConfig::default()).replay(&archive, TARGET).unwrap_err();
    let sequential = engine(ReplayConfig::sequential()).replay(&archive, TARGET).unwrap_err();

    assert!(matches!(
        prefetched,
        ReplayError::ConflictingOrderKeys { global_slot: GlobalSlot(3), sequence_no: 0 }
    ));
    assert_eq!(prefetched.to_string(), sequential.to_string());
}

#[test]
fn test_prefetched_unresolved_key_fails_at_its_step() {
    let archive = archive_with_keys([1, 2])
        .with_user_command(TARGET, 1, vec![user_row("payment", 3, 0, 1, 2, 1, Some(5))])
        .with_user_command(TARGET, 2, vec![user_row("payment", 9, 0, 1, 99, 1, Some(5))]);
    let mut engine = engine(ReplayConfig::default());

    let err = engine.replay(&archive, TARGET).unwrap_err();

    assert!(matches!(err, ReplayError::UnresolvedKey { key_id: KeyId(99) }));
    assert!(matches!(engine.phase(), ReplayPhase::Aborted { .. }));
}

#[test]
fn test_missing_amount_aborts() {
    let archive = archive_with_keys([1, 2])
        .with_user_command(TARGET, 1, vec![user_row("mint_tokens", 3, 0, 1, 2, 1, None)]);

    let err = replay(&archive).unwrap_err();

    assert!(matches!(
        err,
        ReplayError::MissingAmount { kind: UserCommandKind::MintTokens, sequence_no: 0, .. }
    ));
}

#[test]
fn test_unknown_kind_aborts() {
    let archive = archive_with_keys([1, 2])
        .with_user_command(TARGET, 1, vec![user_row("zkapp", 3, 0, 1, 2, 1, None)]);

    let err = replay(&archive).unwrap_err();

    assert!(matches!(err, ReplayError::UnknownCommandKind { ref tag } if tag == "zkapp"));
}

#[test]
fn test_unresolved_and_malformed_keys() {
    let missing = archive_with_keys([1])
        .with_user_command(TARGET, 1, vec![user_row("payment", 3, 0, 1, 99, 1, Some(5))]);
    assert!(matches!(replay(&missing).unwrap_err(), ReplayError::UnresolvedKey { key_id: KeyId(99) }));

    let malformed = archive_with_keys([1])
        .with_encoded_key(KeyId(5), "B62qnotahexkey")
        .with_internal_command(TARGET, 1, vec![internal_row("fee_transfer", 3, 0, 0, 5, 1)]);
    assert!(matches!(replay(&malformed).unwrap_err(), ReplayError::MalformedKey { key_id: KeyId(5), .. }));
}

#[test]
fn test_empty_internal_command_group_aborts() {
    let archive = archive_with_keys([1]).with_internal_command(TARGET, 42, Vec::new());

    let err = replay(&archive).unwrap_err();

    assert!(matches!(err, ReplayError::EmptyInternalCommandGroup { command_id: 42 }));
}

#[test]
fn test_ledger_failure_reports_sequence_number() {
    let archive = archive_with_keys([1, 2])
        .with_user_command(TARGET, 1, vec![user_row("payment", 3, 0, 1, 2, 1, Some(10))])
        .with_user_command(TARGET, 2, vec![user_row("payment", 3, 1, 2, 1, 1, Some(500))]);
    let mut engine = ReplayEngine::<InMemoryLedger>::new(funded([1], 100), ReplayConfig::default());

    let err = engine.replay(&archive, TARGET).unwrap_err();

    assert!(matches!(
        err,
        ReplayError::LedgerApplicationFailed { global_slot: GlobalSlot(3), sequence_no: 1, .. }
    ));
    assert!(matches!(engine.phase(), ReplayPhase::Aborted { reason } if reason.contains("sequence 1")));
}

#[test]
fn test_replay_is_deterministic_across_runs() {
    let archive = archive_with_keys([1, 2, 3])
        .with_internal_command(TARGET, 1, vec![internal_row("coinbase", 1, 0, 0, 2, 720)])
        .with_user_command(TARGET, 1, vec![user_row("payment", 1, 1, 1, 3, 2, Some(40))])
        .with_internal_command(TARGET, 2, vec![internal_row("fee_transfer", 1, 2, 0, 2, 2)]);
    let genesis = funded([1], 1_000);

    let first = ReplayEngine::<InMemoryLedger>::new(genesis.clone(), ReplayConfig::default())
        .replay(&archive, TARGET)
        .unwrap();
    let second = ReplayEngine::<InMemoryLedger>::new(genesis, ReplayConfig::sequential())
        .replay(&archive, TARGET)
        .unwrap();

    assert_eq!(first.target_ledger, second.target_ledger);
    assert_eq!(first.report.ledger_hash, second.report.ledger_hash);
    assert_eq!(first.trace.events, second.trace.events);
}

fn arbitrary_keys() -> impl Strategy<Value = Vec<((u64, u32), bool)>> {
    prop::collection::btree_set((0u64..20, 0u32..8), 0..40)
        .prop_flat_map(|keys: BTreeSet<(u64, u32)>| {
            let len = keys.len();
            (Just(keys), prop::collection::vec(any::<bool>(), len))
        })
        .prop_map(|(keys, sides)| keys.into_iter().zip(sides).collect())
}

fn records_for(keys: &[((u64, u32), bool)]) -> (Vec<InternalCommandRecord>, Vec<UserCommandRecord>) {
    let mut internal = Vec::new();
    let mut user = Vec::new();
    for &((slot, seq), is_internal) in keys {
        if is_internal {
            let row = internal_row("coinbase", slot, seq, 0, 2, seq as u64);
            internal.push(InternalCommandRecord::try_from(row).unwrap());
        } else {
            let row = user_row("payment", slot, seq, 1, 2, seq as u64, Some(1));
            user.push(UserCommandRecord::try_from(row).unwrap());
        }
    }
    (internal, user)
}

fn call_key(call: &LedgerCall) -> (u64, u64) {
    match call {
        LedgerCall::Coinbase { slot, amount, .. } => (slot.0, amount.0),
        LedgerCall::UserCommand { slot, fee, .. } => (slot.0, fee.0),
        LedgerCall::FeeTransfer { slot, receivers } => (slot.0, receivers[0].1 .0),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// With no shared keys across streams, every record becomes exactly one
    /// ledger call, in strictly increasing (slot, sequence) order.
    #[test]
    fn property_merge_applies_every_record_in_order(keys in arbitrary_keys()) {
        let (internal, user) = records_for(&keys);
        let archive = archive_with_keys([1, 2]);
        let mut engine = engine(ReplayConfig::sequential());

        let outcome = engine.replay_records(&archive, &internal, &user);
        prop_assert!(outcome.is_ok(), "replay failed: {:?}", outcome.err());
        let calls = outcome.unwrap().ledger.calls;

        prop_assert_eq!(calls.len(), keys.len());
        let applied: Vec<(u64, u64)> = calls.iter().map(call_key).collect();
        let expected: Vec<(u64, u64)> = keys.iter().map(|&((slot, seq), _)| (slot, seq as u64)).collect();
        prop_assert_eq!(applied, expected);
    }

    /// Loading sorts both streams into a strict total order, whatever order
    /// the archive returns command ids in.
    #[test]
    fn property_loaded_streams_are_strictly_ordered(
        keys in arbitrary_keys(),
        secondaries in prop::collection::vec(0u32..3, 40),
    ) {
        let (internal, user) = records_for(&keys);
        let internal: Vec<InternalCommandRecord> = internal
            .into_iter()
            .zip(secondaries)
            .rev()
            .map(|(mut record, secondary)| { record.secondary_sequence_no = secondary; record })
            .collect();
        let user: Vec<UserCommandRecord> = user.into_iter().rev().collect();

        let loaded = LoadedCommands::new(internal, user);

        prop_assert!(loaded.internal.windows(2).all(|w| w[0].full_key() < w[1].full_key()));
        prop_assert!(loaded.user.windows(2).all(|w| w[0].order_key() < w[1].order_key()));
    }
}
