//! Precollection of coinbase fee transfers
//!
//! A `FeeTransferViaCoinbase` row may sort before or after the coinbase it
//! belongs to, so every one of them is gathered before anything is applied.

use tracing::debug;
use crate::context::ReplayContext;
use crate::error::ReplayError;
use crate::records::{InternalCommandKind, InternalCommandRecord};
use crate::traits::KeyStore;
use crate::transaction::CoinbaseFeeTransfer;

pub struct FeeTransferPrecollector;

impl FeeTransferPrecollector {
    /// Cache a fee transfer for every `FeeTransferViaCoinbase` record.
    ///
    /// Must see the complete internal command list. Returns how many
    /// transfers were collected.
    pub fn run<K: KeyStore + ?Sized>(
        internal: &[InternalCommandRecord],
        store: &K,
        context: &mut ReplayContext,
    ) -> Result<usize, ReplayError> {
        let mut collected = 0;

        for record in internal
            .iter()
            .filter(|r| r.kind == InternalCommandKind::FeeTransferViaCoinbase)
        {
            let receiver = context.keys_mut().resolve(store, record.receiver_id)?;
            context
                .coinbase_fee_transfers_mut()
                .insert(record.order_key(), CoinbaseFeeTransfer::new(receiver, record.fee))?;
            collected += 1;
        }

        debug!(collected, "precollected coinbase fee transfers");
        Ok(collected)
    }
}
