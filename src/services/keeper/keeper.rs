// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use super::claim::ClaimCoordinator;
use super::pipeline::ExecutionPipeline;
use super::settlement::Settlement;
use super::{Clock, KeeperReport, KeeperStats, StrategyResult, TradeOutcome, system_clock};
use crate::data::store::SharedStore;
use crate::domain::model::Strategy;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Finds due strategies and drives each through claim, pipeline and settlement.
pub struct Keeper {
    store: SharedStore,
    claims: ClaimCoordinator,
    pipeline: ExecutionPipeline,
    settlement: Settlement,
    stats: Arc<KeeperStats>,
    gate: Semaphore,
    clock: Clock,
}

impl Keeper {
    pub fn new(
        store: SharedStore,
        pipeline: ExecutionPipeline,
        stale_after: Option<ChronoDuration>,
    ) -> Self {
        Self {
            claims: ClaimCoordinator::new(store.clone(), stale_after),
            settlement: Settlement::new(store.clone()),
            store,
            pipeline,
            stats: Arc::new(KeeperStats::default()),
            gate: Semaphore::new(1),
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> Arc<KeeperStats> {
        self.stats.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// One keeper pass. The due query uses the pass start time; each claim and
    /// settlement reads the clock again, so `claimed_at` and the next due time
    /// reflect when that strategy was actually handled.
    ///
    /// Overlapping local passes return at once; cross-process overlap is
    /// resolved by the store claim.
    pub async fn run_due(&self) -> KeeperReport {
        let now = self.now();
        let mut report = KeeperReport::empty(now);
        let Ok(_permit) = self.gate.try_acquire() else {
            tracing::debug!(target: "keeper", "Previous pass still running; skipping");
            report.overlapped = true;
            return report;
        };
        self.stats.passes.fetch_add(1, Ordering::Relaxed);

        let stale_before = self.claims.stale_before(now);
        let candidates = match self.store.find_due_strategies(now, stale_before).await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(target: "keeper", error = %e, "Due strategy query failed");
                report.error = Some(e.to_string());
                return report;
            }
        };
        if !candidates.is_empty() {
            tracing::info!(target: "keeper", due = candidates.len(), "Due strategies found");
        }

        for strategy in candidates {
            if let Some(reason) = skip_reason(&strategy) {
                tracing::warn!(target: "keeper", strategy_id = %strategy.id, reason, "Skipping malformed strategy");
                continue;
            }
            if let Some(result) = self.process(&strategy.id).await {
                self.stats.record(result.outcome);
                report.results.push(result);
            }
        }

        report.processed = report.results.len();
        tracing::info!(
            target: "keeper",
            processed = report.processed,
            success = report.count(TradeOutcome::Success),
            partial = report.count(TradeOutcome::Partial),
            failed = report.count(TradeOutcome::Error) + report.count(TradeOutcome::ErrorStranded),
            "Keeper pass finished"
        );
        report
    }

    /// `None` when the claim was lost; every other path yields a result.
    async fn process(&self, strategy_id: &str) -> Option<StrategyResult> {
        let claim = match self.claims.claim(strategy_id, self.now()).await {
            Ok(Some(claim)) => claim,
            Ok(None) => {
                self.stats.claim_skipped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                tracing::error!(target: "keeper", strategy_id, error = %e, "Claim failed");
                return Some(StrategyResult::error(strategy_id, None, e.to_string()));
            }
        };
        self.stats.claimed.fetch_add(1, Ordering::Relaxed);

        let outcome = self.pipeline.run(&claim.strategy).await;
        match self.settlement.settle(&claim, outcome, self.now()).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!(
                    target: "keeper",
                    strategy_id,
                    trade_number = claim.trade_number,
                    error = %e,
                    "Settlement failed; strategy left executing for stale reclaim"
                );
                Some(StrategyResult::error(
                    strategy_id,
                    Some(claim.trade_number),
                    format!("settlement: {e}"),
                ))
            }
        }
    }

    /// Run a pass every `every` until `shutdown` fires. Missed ticks are skipped.
    pub async fn run_interval(self: Arc<Self>, every: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(target: "keeper", interval_secs = every.as_secs(), "Interval scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "keeper", "Shutdown requested; stopping scheduler");
                    return;
                }
                _ = ticker.tick() => {
                    let report = self.run_due().await;
                    if report.overlapped {
                        tracing::debug!(target: "keeper", "Tick overlapped a running pass");
                    }
                }
            }
        }
    }
}

fn skip_reason(strategy: &Strategy) -> Option<&'static str> {
    if strategy.is_exhausted() {
        Some("no trades left")
    } else if !strategy.has_credential() {
        Some("missing session credential")
    } else {
        None
    }
}
