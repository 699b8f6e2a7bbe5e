//! Harvest submitter.
//!
//! Broadcasts `harvest()` with a fixed gas limit and waits, with a bound,
//! for the receipt.

use alloy::primitives::TxHash;
use std::time::Duration;
use tracing::{info, warn};

use crate::chain::HarvestTarget;
use crate::types::{HarvestReceipt, KeeperError, Stage};

/// Fixed gas limit for `harvest()`. Generous to tolerate estimation drift.
pub const HARVEST_GAS_LIMIT: u64 = 500_000;

/// Default upper bound on the confirmation wait.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct Submitter {
    gas_limit: u64,
    confirmation_timeout: Duration,
}

impl Default for Submitter {
    fn default() -> Self {
        Self::new(HARVEST_GAS_LIMIT, DEFAULT_CONFIRMATION_TIMEOUT)
    }
}

impl Submitter {
    pub fn new(gas_limit: u64, confirmation_timeout: Duration) -> Self {
        Self {
            gas_limit,
            confirmation_timeout,
        }
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    /// Broadcast the harvest transaction. Logs the hash as soon as it is known.
    pub async fn submit(&self, target: &dyn HarvestTarget) -> Result<TxHash, KeeperError> {
        info!(gas_limit = self.gas_limit, "Executing harvest...");

        let tx_hash = target
            .send_harvest(self.gas_limit)
            .await
            .map_err(|e| KeeperError::rpc(Stage::Submit, &e))?;

        info!(tx_hash = %tx_hash, "TX Hash");
        Ok(tx_hash)
    }

    /// Wait for the receipt of `tx_hash`, giving up after the configured timeout.
    pub async fn confirm(
        &self,
        target: &dyn HarvestTarget,
        tx_hash: TxHash,
    ) -> Result<HarvestReceipt, KeeperError> {
        match tokio::time::timeout(self.confirmation_timeout, target.wait_for_receipt(tx_hash)).await
        {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => Err(KeeperError::rpc(Stage::Confirm, &e)),
            Err(_) => {
                warn!(
                    tx_hash = %tx_hash,
                    timeout_secs = self.confirmation_timeout.as_secs(),
                    "Gave up waiting for harvest receipt"
                );
                Err(KeeperError::ConfirmationTimeout {
                    tx_hash,
                    timeout_secs: self.confirmation_timeout.as_secs(),
                })
            }
        }
    }
}
