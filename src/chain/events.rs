//! `Harvested` event extraction from receipt logs.
//!
//! Each log is checked against the engine address and the one expected
//! event signature. Anything else is not ours and is skipped.

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use tracing::debug;

use super::abi::IHarvestEngine::Harvested;

/// Decode a single log as `Harvested(uint256)` emitted by `engine`.
///
/// Returns `None` for logs from other contracts, logs with a different
/// signature, and signature matches whose payload does not decode.
pub fn decode_harvested(log: &Log, engine: Address) -> Option<U256> {
    if log.address != engine {
        return None;
    }
    if log.data.topics().first() != Some(&Harvested::SIGNATURE_HASH) {
        return None;
    }

    match Harvested::decode_log_data(&log.data) {
        Ok(event) => Some(event.amount),
        Err(e) => {
            debug!(error = %e, "Harvested topic matched but payload did not decode");
            None
        }
    }
}

/// Sum of all `Harvested` amounts in a receipt. `None` if there were none.
pub fn harvested_amount(logs: &[Log], engine: Address) -> Option<U256> {
    logs.iter()
        .filter_map(|log| decode_harvested(log, engine))
        .fold(None, |acc: Option<U256>, amount| {
            Some(acc.unwrap_or(U256::ZERO).saturating_add(amount))
        })
}
