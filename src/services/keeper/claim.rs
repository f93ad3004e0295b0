// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use super::settlement::advance;
use crate::data::store::SharedStore;
use crate::domain::error::AppError;
use crate::domain::model::{Strategy, StrategyStatus, StrategyUpdate};
use chrono::{DateTime, Duration, Utc};

/// A strategy this pass holds exclusively, with its pending execution row.
#[derive(Debug, Clone)]
pub struct Claim {
    pub strategy: Strategy,
    pub trade_number: u32,
    pub execution_id: i64,
}

pub struct ClaimCoordinator {
    store: SharedStore,
    stale_after: Option<Duration>,
}

impl ClaimCoordinator {
    /// `stale_after` of `None` never reclaims an `executing` strategy.
    pub fn new(store: SharedStore, stale_after: Option<Duration>) -> Self {
        Self { store, stale_after }
    }

    /// Claims taken at or before this instant are abandoned. `None` when reclaim
    /// is disabled or the threshold reaches past the representable range.
    pub fn stale_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.stale_after.and_then(|age| now.checked_sub_signed(age))
    }

    /// Claim `strategy_id` and open the execution row for its next trade.
    ///
    /// `Ok(None)` means another pass owns it or it is no longer due. The trade
    /// number comes from the row as claimed, not from the caller's snapshot.
    pub async fn claim(
        &self,
        strategy_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Claim>, AppError> {
        let stale_before = self.stale_before(now);
        let Some(strategy) = self.store.try_claim(strategy_id, now, stale_before).await? else {
            tracing::debug!(target: "claim", strategy_id, "Claim lost; skipping");
            return Ok(None);
        };

        if strategy.is_exhausted() {
            tracing::warn!(
                target: "claim",
                strategy_id,
                completed = strategy.completed_trades,
                total = strategy.total_trades,
                "Claimed strategy has no trades left; marking completed"
            );
            let update = StrategyUpdate {
                status: Some(StrategyStatus::Completed),
                next_due_at: Some(None),
                clear_claim: true,
                ..StrategyUpdate::default()
            };
            self.store.update_strategy(strategy_id, &update, now).await?;
            return Ok(None);
        }

        let trade_number = strategy.next_trade_number();
        let execution_id = match self
            .store
            .create_execution(strategy_id, trade_number, &strategy.amount_per_trade, now)
            .await
        {
            Ok(Some(id)) => id,
            Ok(None) => {
                // The trade landed but the strategy write was lost; count it, never re-run it.
                tracing::warn!(
                    target: "claim",
                    strategy_id,
                    trade_number,
                    "Trade already settled; advancing strategy without trading"
                );
                let update = advance(&strategy, now);
                if let Err(e) = self.store.update_strategy(strategy_id, &update, now).await {
                    self.release(strategy_id, now).await;
                    return Err(e);
                }
                return Ok(None);
            }
            Err(e) => {
                self.release(strategy_id, now).await;
                return Err(e);
            }
        };

        tracing::info!(target: "claim", strategy_id, trade_number, execution_id, "Strategy claimed");
        Ok(Some(Claim {
            strategy,
            trade_number,
            execution_id,
        }))
    }

    /// Hand a claimed strategy back untouched so the next pass can retry it.
    pub async fn release(&self, strategy_id: &str, now: DateTime<Utc>) {
        let update = StrategyUpdate {
            status: Some(StrategyStatus::Active),
            clear_claim: true,
            ..StrategyUpdate::default()
        };
        if let Err(e) = self.store.update_strategy(strategy_id, &update, now).await {
            tracing::error!(
                target: "claim",
                strategy_id,
                error = %e,
                "Failed to release claim; strategy stays executing until reclaimed"
            );
        }
    }
}
