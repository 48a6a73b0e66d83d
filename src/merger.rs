//! Merge of the internal and user command streams into one application order
//!
//! Both inputs must already be sorted: internal commands by
//! `(global_slot, sequence_no, secondary_sequence_no)`, user commands by
//! `(global_slot, sequence_no)`. The merger never reorders within a stream.

use std::cmp::Ordering;
use tracing::warn;
use crate::error::ReplayError;
use crate::records::{InternalCommandKind, InternalCommandRecord, OrderKey, UserCommandRecord};

/// One unit of work in the application order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep<'a> {
    Internal(&'a InternalCommandRecord),
    CombinedFeeTransfer(&'a InternalCommandRecord, &'a InternalCommandRecord),
    User(&'a UserCommandRecord),
}

impl MergeStep<'_> {
    pub fn order_key(&self) -> OrderKey {
        match self {
            MergeStep::Internal(record) | MergeStep::CombinedFeeTransfer(record, _) => record.order_key(),
            MergeStep::User(record) => record.order_key(),
        }
    }

    /// Number of archive records this step consumes
    pub fn record_count(&self) -> usize {
        match self {
            MergeStep::CombinedFeeTransfer(..) => 2,
            _ => 1,
        }
    }
}

/// Iterator yielding merge steps in global application order.
///
/// A tie between an internal and a user command yields
/// `ConflictingOrderKeys` and ends the iteration.
#[derive(Debug, Clone)]
pub struct OrderingMerger<'a> {
    internal: &'a [InternalCommandRecord],
    user: &'a [UserCommandRecord],
    halted: bool,
}

impl<'a> OrderingMerger<'a> {
    pub fn new(internal: &'a [InternalCommandRecord], user: &'a [UserCommandRecord]) -> Self {
        Self {
            internal,
            user,
            halted: false,
        }
    }

    /// Combine-or-apply on the head of the internal stream
    fn take_internal(&mut self) -> Option<MergeStep<'a>> {
        match self.internal {
            [first, second, rest @ ..] if combines(first, second) => {
                if let Some(third) = rest.first().filter(|third| combines(first, third)) {
                    warn!(
                        global_slot = %third.global_slot,
                        sequence_no = third.sequence_no,
                        secondary_sequence_no = third.secondary_sequence_no,
                        "more than two fee transfers share a sequence number; only the first two are combined"
                    );
                }
                self.internal = rest;
                Some(MergeStep::CombinedFeeTransfer(first, second))
            }
            [first, rest @ ..] => {
                self.internal = rest;
                Some(MergeStep::Internal(first))
            }
            [] => None,
        }
    }
}

impl<'a> Iterator for OrderingMerger<'a> {
    type Item = Result<MergeStep<'a>, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }

        match (self.internal, self.user) {
            ([], []) => None,
            ([], [uc, rest @ ..]) => {
                self.user = rest;
                Some(Ok(MergeStep::User(uc)))
            }
            ([_, ..], []) => self.take_internal().map(Ok),
            ([ic, ..], [uc, rest @ ..]) => match ic.order_key().cmp(&uc.order_key()) {
                Ordering::Greater => {
                    self.user = rest;
                    Some(Ok(MergeStep::User(uc)))
                }
                Ordering::Less => self.take_internal().map(Ok),
                Ordering::Equal => {
                    self.halted = true;
                    Some(Err(ReplayError::ConflictingOrderKeys {
                        global_slot: ic.global_slot,
                        sequence_no: ic.sequence_no,
                    }))
                }
            },
        }
    }
}

/// Two adjacent internal commands form one fee transfer when both are plain
/// fee transfers with the same sequence number. The slot is not compared.
fn combines(first: &InternalCommandRecord, second: &InternalCommandRecord) -> bool {
    first.kind == InternalCommandKind::FeeTransfer
        && second.kind == InternalCommandKind::FeeTransfer
        && first.sequence_no == second.sequence_no
}
