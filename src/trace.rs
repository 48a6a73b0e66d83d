//! Audit trail of a replay run
//!
//! The trace records, in application order, every step the engine took. It
//! is collected in memory and has no effect on the replay itself.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::records::{InternalCommandKind, OrderKey, UserCommandKind};

/// What a step did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEventType {
    FeeTransfer,
    CombinedFeeTransfer,
    Coinbase { with_fee_transfer: bool },
    UserCommand(UserCommandKind),
    /// The record produced no ledger call
    Skipped(InternalCommandKind),
}

impl TraceEventType {
    /// Archive records consumed by a step of this type
    pub fn record_count(&self) -> usize {
        match self {
            TraceEventType::CombinedFeeTransfer => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position of the step in the merged order
    pub step_index: usize,
    pub order_key: OrderKey,
    pub event_type: TraceEventType,
}

impl TraceEvent {
    pub fn is_applied(&self) -> bool {
        !matches!(self.event_type, TraceEventType::Skipped(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayTrace {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub events: Vec<TraceEvent>,
}

impl ReplayTrace {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, step_index: usize, order_key: OrderKey, event_type: TraceEventType) {
        self.events.push(TraceEvent {
            step_index,
            order_key,
            event_type,
        });
    }

    /// Mark the trace as completed
    pub fn complete(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
    }

    /// Events that resulted in a ledger call
    pub fn applied(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(|e| e.is_applied())
    }

    /// Archive records covered by the trace
    pub fn record_count(&self) -> usize {
        self.events.iter().map(|e| e.event_type.record_count()).sum()
    }

    pub fn events_by_type(&self, event_type: TraceEventType) -> Vec<&TraceEvent> {
        self.events.iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}
