//! Trigger and supervised harvest loop.
//!
//! One tick fires immediately, then one per interval. Each tick is awaited
//! inline, so at most one harvest attempt is ever in flight; interval
//! ticks that elapse during a slow attempt are collapsed, never queued.
//! Shutdown is observed between ticks.

use alloy::primitives::U256;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::chain::HarvestTarget;
use crate::engine::{preflight, EngineInfo, Pipeline, PipelineSettings};
use crate::types::{KeeperError, KeeperState, TickReport};

/// How many recent tick reports are kept for the status endpoint.
pub const ATTEMPT_HISTORY: usize = 50;

/// Read-only view of the scheduler, published after every tick.
#[derive(Debug, Clone)]
pub struct KeeperSnapshot {
    pub harvest_count: u64,
    pub total_bounty_earned: U256,
    pub ticks: u64,
    pub started_at: DateTime<Utc>,
    pub in_flight: bool,
    /// Oldest first.
    pub recent: Vec<TickReport>,
}

impl KeeperSnapshot {
    pub fn last(&self) -> Option<&TickReport> {
        self.recent.last()
    }
}

pub struct Scheduler {
    target: Arc<dyn HarvestTarget>,
    pipeline: Pipeline,
    interval: Duration,
    state: KeeperState,
    ticks: u64,
    history: VecDeque<TickReport>,
    snapshots: watch::Sender<KeeperSnapshot>,
}

impl Scheduler {
    pub fn new(
        target: Arc<dyn HarvestTarget>,
        settings: &PipelineSettings,
        interval: Duration,
    ) -> Self {
        let state = KeeperState::new();
        let (snapshots, _) = watch::channel(KeeperSnapshot {
            harvest_count: 0,
            total_bounty_earned: U256::ZERO,
            ticks: 0,
            started_at: state.started_at(),
            in_flight: false,
            recent: Vec::new(),
        });

        Self {
            target,
            pipeline: Pipeline::new(settings),
            interval,
            state,
            ticks: 0,
            history: VecDeque::with_capacity(ATTEMPT_HISTORY),
            snapshots,
        }
    }

    /// Run the startup checks, then spawn the loop.
    ///
    /// A preflight failure (including an unset router) returns before any
    /// tick is scheduled.
    pub async fn start(
        target: Arc<dyn HarvestTarget>,
        settings: &PipelineSettings,
        interval: Duration,
    ) -> Result<(EngineInfo, SchedulerHandle), KeeperError> {
        let info = preflight(target.as_ref()).await?;
        let handle = Self::new(target, settings, interval).spawn();
        Ok((info, handle))
    }

    pub fn state(&self) -> &KeeperState {
        &self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn subscribe(&self) -> watch::Receiver<KeeperSnapshot> {
        self.snapshots.subscribe()
    }

    /// Run exactly one tick and publish the result.
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        self.snapshots.send_modify(|snap| snap.in_flight = true);

        let report = self
            .pipeline
            .run_tick(self.target.as_ref(), &mut self.state, self.ticks)
            .await;

        if self.history.len() == ATTEMPT_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(report.clone());
        self.publish();

        info!(
            tick = report.attempt.tick,
            outcome = report.outcome.label(),
            harvest_count = self.state.harvest_count(),
            total_harvested = %self.state.total_bounty_earned(),
            "Tick complete"
        );
        report
    }

    /// Drive ticks until `shutdown` flips to `true` or its sender is dropped.
    /// Returns the final state.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> KeeperState {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.interval.as_secs(),
            "Keeper initialized. Starting harvest loop..."
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!(
            ticks = self.ticks,
            harvest_count = self.state.harvest_count(),
            total_harvested = %self.state.total_bounty_earned(),
            "Harvest loop stopped"
        );
        self.state
    }

    /// Move the scheduler onto its own task.
    ///
    /// Dropping the returned handle also stops the loop.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let snapshots = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));

        SchedulerHandle {
            shutdown: shutdown_tx,
            snapshots,
            task,
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(KeeperSnapshot {
            harvest_count: self.state.harvest_count(),
            total_bounty_earned: self.state.total_bounty_earned(),
            ticks: self.ticks,
            started_at: self.state.started_at(),
            in_flight: false,
            recent: self.history.iter().cloned().collect(),
        });
    }
}

/// Control surface for a spawned scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    snapshots: watch::Receiver<KeeperSnapshot>,
    task: JoinHandle<KeeperState>,
}

impl SchedulerHandle {
    /// Ask the loop to stop. An in-flight attempt finishes first.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn snapshots(&self) -> watch::Receiver<KeeperSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the loop to exit and return the final state.
    pub async fn join(self) -> Result<KeeperState> {
        self.task.await.context("Scheduler task failed")
    }

    /// `shutdown` followed by `join`.
    pub async fn stop(self) -> Result<KeeperState> {
        self.shutdown();
        self.join().await
    }
}
