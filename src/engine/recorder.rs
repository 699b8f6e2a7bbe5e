//! Outcome recorder.
//!
//! Classifies a confirmed receipt and is the only code path that mutates
//! `KeeperState`.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use crate::chain::events::harvested_amount;
use crate::types::{HarvestReceipt, KeeperState, TickOutcome};

pub struct Recorder;

impl Recorder {
    /// Record a receipt against the keeper state.
    ///
    /// Success: count the harvest and add the decoded `Harvested` amount
    /// (zero when the receipt carries no such event). Failure: nothing changes.
    pub fn record(state: &mut KeeperState, receipt: &HarvestReceipt, engine: Address) -> TickOutcome {
        if !receipt.success {
            warn!(
                tx_hash = %receipt.tx_hash,
                gas_used = receipt.gas_used,
                "Harvest TX reverted."
            );
            return TickOutcome::Reverted {
                tx_hash: receipt.tx_hash,
                gas_used: receipt.gas_used,
            };
        }

        let amount = harvested_amount(&receipt.logs, engine);
        let reward = amount.unwrap_or(U256::ZERO);
        state.record_harvest(reward);

        info!(
            harvest_count = state.harvest_count(),
            tx_hash = %receipt.tx_hash,
            gas_used = receipt.gas_used,
            "Harvest #{} successful!",
            state.harvest_count()
        );
        match amount {
            Some(amount) => info!(
                amount = %format_ether(amount),
                total = %format_ether(state.total_bounty_earned()),
                "Total Harvested"
            ),
            None => warn!(tx_hash = %receipt.tx_hash, "Receipt carried no Harvested event"),
        }

        TickOutcome::Harvested {
            tx_hash: receipt.tx_hash,
            gas_used: receipt.gas_used,
            reward,
        }
    }
}
