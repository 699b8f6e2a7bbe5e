//! Gas guard.
//!
//! Skips the tick when the operator cannot comfortably pay for a harvest,
//! before any simulation or write is attempted.

use alloy::primitives::utils::format_ether;
use alloy::primitives::U256;
use tracing::{info, warn};

use crate::chain::HarvestTarget;
use crate::types::{KeeperError, Stage};

/// Minimum operator balance, in wei, below which ticks are skipped (0.005 native).
pub const DEFAULT_MIN_GAS_BALANCE_WEI: u64 = 5_000_000_000_000_000;

/// Result of the balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasCheck {
    Sufficient { balance: U256 },
    Insufficient { balance: U256 },
}

impl GasCheck {
    pub fn balance(&self) -> U256 {
        match self {
            GasCheck::Sufficient { balance } | GasCheck::Insufficient { balance } => *balance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GasGuard {
    min_balance: U256,
}

impl Default for GasGuard {
    fn default() -> Self {
        Self::new(U256::from(DEFAULT_MIN_GAS_BALANCE_WEI))
    }
}

impl GasGuard {
    pub fn new(min_balance: U256) -> Self {
        Self { min_balance }
    }

    pub fn min_balance(&self) -> U256 {
        self.min_balance
    }

    /// Compare a balance against the threshold. Equal balance passes.
    pub fn evaluate(&self, balance: U256) -> GasCheck {
        if balance < self.min_balance {
            GasCheck::Insufficient { balance }
        } else {
            GasCheck::Sufficient { balance }
        }
    }

    /// Fetch the operator balance fresh and evaluate it.
    pub async fn check(&self, target: &dyn HarvestTarget) -> Result<GasCheck, KeeperError> {
        let balance = target
            .operator_balance()
            .await
            .map_err(|e| KeeperError::rpc(Stage::Balance, &e))?;

        info!(balance = %format_ether(balance), "Gas balance");

        let check = self.evaluate(balance);
        if let GasCheck::Insufficient { .. } = check {
            warn!(
                balance = %format_ether(balance),
                required = %format_ether(self.min_balance),
                operator = %target.operator_address(),
                "Low gas balance. Skipping harvest."
            );
        }
        Ok(check)
    }
}
