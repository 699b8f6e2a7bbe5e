//! Status API route handlers.
//!
//! All endpoints return JSON built from the latest scheduler snapshot.
//! Amounts are rendered as decimal strings so 256-bit values survive.

use alloy::primitives::utils::format_ether;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tokio::sync::watch;

use crate::scheduler::{KeeperSnapshot, ATTEMPT_HISTORY};
use crate::types::{SimulationResult, TickOutcome, TickReport};

pub type AppState = watch::Receiver<KeeperSnapshot>;

/// Recent attempts returned by `/api/attempts`: everything the scheduler retains.
const MAX_ATTEMPTS: usize = ATTEMPT_HISTORY;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub harvest_count: u64,
    /// Raw integer amount.
    pub total_bounty_earned: String,
    /// Same amount at 18 decimals.
    pub total_bounty_earned_formatted: String,
    pub ticks: u64,
    pub in_flight: bool,
    pub last_outcome: Option<String>,
    /// Reverted or errored ticks among the retained history.
    pub recent_failures: usize,
    pub started_at: String,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptEntry {
    pub tick: u64,
    pub timestamp: String,
    pub outcome: String,
    pub detail: String,
    /// Stage that failed, for errored ticks.
    pub error_stage: Option<String>,
    pub gas_balance: Option<String>,
    pub dry_run_ok: Option<bool>,
    pub gas_estimate: Option<u64>,
    pub tx_hash: Option<String>,
    pub receipt_status: Option<bool>,
    pub gas_used: Option<u64>,
    pub reward: Option<String>,
}

impl From<&TickReport> for AttemptEntry {
    fn from(report: &TickReport) -> Self {
        let attempt = &report.attempt;
        let gas_estimate = match &attempt.simulation {
            Some(SimulationResult::Succeeded { gas_estimate }) => Some(*gas_estimate),
            _ => None,
        };

        Self {
            tick: attempt.tick,
            timestamp: attempt.timestamp.to_rfc3339(),
            outcome: report.outcome.label().to_string(),
            detail: report.outcome.to_string(),
            error_stage: match &report.outcome {
                TickOutcome::Errored { error } => error.stage().map(|s| s.to_string()),
                _ => None,
            },
            gas_balance: attempt.gas_balance.map(format_ether),
            dry_run_ok: attempt.simulation.as_ref().map(SimulationResult::succeeded),
            gas_estimate,
            tx_hash: attempt.tx_hash.map(|h| h.to_string()),
            receipt_status: attempt.receipt_status,
            gas_used: attempt.gas_used,
            reward: attempt.reward.map(|r| r.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(snapshots): State<AppState>) -> Json<StatusResponse> {
    let snap = snapshots.borrow().clone();
    let uptime = (chrono::Utc::now() - snap.started_at).num_seconds();

    Json(StatusResponse {
        harvest_count: snap.harvest_count,
        total_bounty_earned: snap.total_bounty_earned.to_string(),
        total_bounty_earned_formatted: format_ether(snap.total_bounty_earned),
        ticks: snap.ticks,
        in_flight: snap.in_flight,
        last_outcome: snap.last().map(|r| r.outcome.label().to_string()),
        recent_failures: snap.recent.iter().filter(|r| is_failure(&r.outcome)).count(),
        started_at: snap.started_at.to_rfc3339(),
        uptime_secs: uptime,
    })
}

/// GET /api/attempts (newest first)
pub async fn get_attempts(State(snapshots): State<AppState>) -> Json<Vec<AttemptEntry>> {
    let snap = snapshots.borrow().clone();
    Json(
        snap.recent
            .iter()
            .rev()
            .take(MAX_ATTEMPTS)
            .map(AttemptEntry::from)
            .collect(),
    )
}

/// GET /health
pub async fn health(State(snapshots): State<AppState>) -> StatusCode {
    // Closed channel means the scheduler task is gone.
    if snapshots.has_changed().is_err() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Whether the outcome should count as a failure on dashboards.
pub fn is_failure(outcome: &TickOutcome) -> bool {
    matches!(outcome, TickOutcome::Reverted { .. } | TickOutcome::Errored { .. })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
