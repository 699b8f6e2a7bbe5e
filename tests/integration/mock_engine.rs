//! Mock engine contract for integration testing.
//!
//! Provides a deterministic `HarvestTarget` implementation with scripted
//! balances, dry-run results and receipts, all in-memory. It also records
//! when each call happened so tests can check tick spacing and that no
//! two submission→confirmation windows overlap.

use alloy::primitives::{address, Address, Log, TxHash, U256};
use alloy::sol_types::SolEvent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use harvest_keeper::chain::abi::IHarvestEngine::Harvested;
use harvest_keeper::chain::HarvestTarget;
use harvest_keeper::types::{HarvestReceipt, SimulationResult};

pub const ENGINE: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const OPERATOR: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const ROUTER: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

/// 1 native unit in wei.
pub const ONE: u64 = 1_000_000_000_000_000_000;

/// Balance in wei for a number of thousandths of a native unit.
pub fn milli(n: u64) -> U256 {
    U256::from(n * (ONE / 1_000))
}

/// How the next submitted transaction should confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptPlan {
    /// Success with an optional `Harvested(amount)` event.
    Success(Option<u64>),
    /// On-chain revert.
    Revert,
}

/// One submission→confirmation window.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub sent_at: Instant,
    pub confirmed_at: Instant,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub balance: usize,
    pub simulate: usize,
    pub send: usize,
    pub wait: usize,
}

/// A mock engine for deterministic testing.
///
/// All state is behind `Mutex`es so tests can change behaviour between
/// ticks while the scheduler holds an `Arc` to the same instance.
pub struct MockEngine {
    balance: Mutex<U256>,
    router: Mutex<Address>,
    simulation: Mutex<SimulationResult>,
    receipts: Mutex<VecDeque<ReceiptPlan>>,
    default_receipt: ReceiptPlan,
    confirmation_delay: Mutex<Duration>,
    /// If set, the named stage returns this error once.
    fail_once: Mutex<Option<(&'static str, String)>>,
    counts: Mutex<CallCounts>,
    balance_calls_at: Mutex<Vec<Instant>>,
    windows: Mutex<Vec<Window>>,
    pending: Mutex<Vec<(TxHash, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    nonce: AtomicU64,
}

impl MockEngine {
    /// Healthy defaults: 0.01 balance, dry run succeeds, every receipt
    /// succeeds with `Harvested(1_000_000)`.
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(milli(10)),
            router: Mutex::new(ROUTER),
            simulation: Mutex::new(SimulationResult::Succeeded { gas_estimate: 150_000 }),
            receipts: Mutex::new(VecDeque::new()),
            default_receipt: ReceiptPlan::Success(Some(1_000_000)),
            confirmation_delay: Mutex::new(Duration::ZERO),
            fail_once: Mutex::new(None),
            counts: Mutex::new(CallCounts::default()),
            balance_calls_at: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            nonce: AtomicU64::new(1),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_router(&self, router: Address) {
        *self.router.lock().unwrap() = router;
    }

    pub fn set_simulation(&self, result: SimulationResult) {
        *self.simulation.lock().unwrap() = result;
    }

    /// Queue receipts for the next submissions, in order.
    pub fn script_receipts(&self, plans: &[ReceiptPlan]) {
        self.receipts.lock().unwrap().extend(plans.iter().copied());
    }

    pub fn set_confirmation_delay(&self, delay: Duration) {
        *self.confirmation_delay.lock().unwrap() = delay;
    }

    /// Make the given stage (`balance`, `simulate`, `send`, `wait`, `bounty`)
    /// fail on its next call.
    pub fn fail_next(&self, stage: &'static str, msg: &str) {
        *self.fail_once.lock().unwrap() = Some((stage, msg.to_string()));
    }

    pub fn counts(&self) -> CallCounts {
        *self.counts.lock().unwrap()
    }

    pub fn balance_calls_at(&self) -> Vec<Instant> {
        self.balance_calls_at.lock().unwrap().clone()
    }

    pub fn windows(&self) -> Vec<Window> {
        self.windows.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self, stage: &str) -> Option<anyhow::Error> {
        let mut slot = self.fail_once.lock().unwrap();
        let hit = matches!(slot.as_ref(), Some((s, _)) if *s == stage);
        if hit {
            slot.take().map(|(_, msg)| anyhow!(msg))
        } else {
            None
        }
    }

    fn next_receipt(&self) -> ReceiptPlan {
        self.receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_receipt)
    }
}

/// Closes a submission window even if the wait is cancelled by a timeout.
struct WindowGuard<'a> {
    engine: &'a MockEngine,
    sent_at: Instant,
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        self.engine.windows.lock().unwrap().push(Window {
            sent_at: self.sent_at,
            confirmed_at: Instant::now(),
        });
        self.engine.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HarvestTarget for MockEngine {
    fn engine_address(&self) -> Address {
        ENGINE
    }

    fn operator_address(&self) -> Address {
        OPERATOR
    }

    async fn operator_balance(&self) -> Result<U256> {
        self.counts.lock().unwrap().balance += 1;
        self.balance_calls_at.lock().unwrap().push(Instant::now());
        if let Some(e) = self.take_failure("balance") {
            return Err(e);
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn bounty_bps(&self) -> Result<U256> {
        if let Some(e) = self.take_failure("bounty") {
            return Err(e);
        }
        Ok(U256::from(100u64))
    }

    async fn stacking_router(&self) -> Result<Address> {
        Ok(*self.router.lock().unwrap())
    }

    async fn total_assets(&self) -> Result<U256> {
        Ok(U256::from(50u64) * U256::from(ONE))
    }

    async fn simulate_harvest(&self) -> Result<SimulationResult> {
        self.counts.lock().unwrap().simulate += 1;
        if let Some(e) = self.take_failure("simulate") {
            return Err(e);
        }
        Ok(self.simulation.lock().unwrap().clone())
    }

    async fn send_harvest(&self, gas_limit: u64) -> Result<TxHash> {
        assert_eq!(gas_limit, 500_000, "harvest must use the fixed gas limit");
        self.counts.lock().unwrap().send += 1;
        if let Some(e) = self.take_failure("send") {
            return Err(e);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let tx_hash = TxHash::left_padding_from(&nonce.to_be_bytes());
        self.pending.lock().unwrap().push((tx_hash, Instant::now()));
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<HarvestReceipt> {
        self.counts.lock().unwrap().wait += 1;
        let sent_at = {
            let mut pending = self.pending.lock().unwrap();
            let idx = pending
                .iter()
                .position(|(h, _)| *h == tx_hash)
                .ok_or_else(|| anyhow!("unknown transaction {tx_hash}"))?;
            pending.remove(idx).1
        };
        let _guard = WindowGuard { engine: self, sent_at };

        let delay = *self.confirmation_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.take_failure("wait") {
            return Err(e);
        }

        let receipt = match self.next_receipt() {
            ReceiptPlan::Success(amount) => HarvestReceipt {
                tx_hash,
                success: true,
                gas_used: 160_000,
                logs: amount.map(harvested_log).into_iter().collect(),
            },
            ReceiptPlan::Revert => HarvestReceipt {
                tx_hash,
                success: false,
                gas_used: 45_000,
                logs: Vec::new(),
            },
        };
        Ok(receipt)
    }
}

pub fn harvested_log(amount: u64) -> Log {
    Log {
        address: ENGINE,
        data: Harvested { amount: U256::from(amount) }.encode_log_data(),
    }
}
