// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use super::claim::Claim;
use super::pipeline::PipelineOutcome;
use super::{StrategyResult, TradeOutcome};
use crate::data::store::SharedStore;
use crate::domain::constants::PARTIAL_RESHIELD_NOTE;
use crate::domain::error::AppError;
use crate::domain::model::{
    ExecutionStatus, ExecutionUpdate, StrandedFunds, Strategy, StrategyStatus, StrategyUpdate,
};
use chrono::{DateTime, Duration, Utc};

/// Strategy write for one more completed trade: done at the total, otherwise
/// due again `frequency_hours` after `now`.
pub(super) fn advance(strategy: &Strategy, now: DateTime<Utc>) -> StrategyUpdate {
    let completed = strategy
        .completed_trades
        .saturating_add(1)
        .min(strategy.total_trades);
    if completed >= strategy.total_trades {
        StrategyUpdate {
            status: Some(StrategyStatus::Completed),
            completed_trades: Some(completed),
            next_due_at: Some(None),
            clear_claim: true,
        }
    } else {
        StrategyUpdate {
            status: Some(StrategyStatus::Active),
            completed_trades: Some(completed),
            next_due_at: Some(Some(
                now + Duration::hours(i64::from(strategy.frequency_hours)),
            )),
            clear_claim: true,
        }
    }
}

/// Writes the terminal state of one claimed trade.
pub struct Settlement {
    store: SharedStore,
}

impl Settlement {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn settle(
        &self,
        claim: &Claim,
        outcome: PipelineOutcome,
        now: DateTime<Utc>,
    ) -> Result<StrategyResult, AppError> {
        let strategy = &claim.strategy;
        let mut result = StrategyResult {
            strategy_id: strategy.id.clone(),
            outcome: TradeOutcome::Error,
            trade_number: Some(claim.trade_number),
            input_amount: Some(strategy.amount_per_trade.clone()),
            output_amount: None,
            tx_signature: None,
            error: None,
            stranded: None,
        };

        match outcome {
            PipelineOutcome::Success {
                output_amount,
                swap_signature,
                deposit_signature,
            } => {
                tracing::debug!(target: "settlement", strategy_id = %strategy.id, deposit = %deposit_signature, "Recording success");
                self.record_success(claim, &output_amount, &swap_signature.to_string(), None, now)
                    .await?;
                result.outcome = TradeOutcome::Success;
                result.output_amount = Some(output_amount);
                result.tx_signature = Some(swap_signature.to_string());
            }
            PipelineOutcome::Partial {
                output_amount,
                swap_signature,
                reshield_error,
                stranded,
            } => {
                let note = format!("{PARTIAL_RESHIELD_NOTE}: {reshield_error}");
                self.record_success(
                    claim,
                    &output_amount,
                    &swap_signature.to_string(),
                    Some(note.clone()),
                    now,
                )
                .await?;
                self.record_stranded(claim, &stranded).await;
                result.outcome = TradeOutcome::Partial;
                result.output_amount = Some(output_amount);
                result.tx_signature = Some(swap_signature.to_string());
                result.error = Some(note);
                result.stranded = Some(stranded);
            }
            PipelineOutcome::Failed {
                stage,
                error,
                stranded,
            } => {
                let detail = format!("{stage}: {error}");
                tracing::warn!(
                    target: "settlement",
                    strategy_id = %strategy.id,
                    trade_number = claim.trade_number,
                    stage = %stage,
                    kind = error.kind(),
                    error = %error,
                    "Trade failed; strategy stays active for retry"
                );
                self.store
                    .update_execution(
                        claim.execution_id,
                        &ExecutionUpdate {
                            status: ExecutionStatus::Failed,
                            output_amount: None,
                            tx_signature: None,
                            error: Some(detail.clone()),
                        },
                    )
                    .await?;
                if let Some(funds) = &stranded {
                    self.record_stranded(claim, funds).await;
                }
                let update = StrategyUpdate {
                    status: Some(StrategyStatus::Active),
                    clear_claim: true,
                    ..StrategyUpdate::default()
                };
                self.store.update_strategy(&strategy.id, &update, now).await?;
                result.outcome = if stranded.is_some() {
                    TradeOutcome::ErrorStranded
                } else {
                    TradeOutcome::Error
                };
                result.error = Some(detail);
                result.stranded = stranded;
            }
        }

        Ok(result)
    }

    async fn record_success(
        &self,
        claim: &Claim,
        output_amount: &str,
        signature: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let strategy = &claim.strategy;
        self.store
            .update_execution(
                claim.execution_id,
                &ExecutionUpdate {
                    status: ExecutionStatus::Success,
                    output_amount: Some(output_amount.to_string()),
                    tx_signature: Some(signature.to_string()),
                    error: note,
                },
            )
            .await?;

        let update = advance(strategy, now);
        self.store.update_strategy(&strategy.id, &update, now).await?;

        tracing::info!(
            target: "settlement",
            strategy_id = %strategy.id,
            trade_number = claim.trade_number,
            completed = ?update.completed_trades,
            total = strategy.total_trades,
            status = ?update.status,
            "Trade settled"
        );
        Ok(())
    }

    /// Losing the reconciliation row must not undo an already written trade.
    async fn record_stranded(&self, claim: &Claim, funds: &StrandedFunds) {
        match self
            .store
            .record_stranded(&claim.strategy.id, claim.execution_id, funds)
            .await
        {
            Ok(id) => tracing::warn!(
                target: "settlement",
                strategy_id = %claim.strategy.id,
                stranded_id = id,
                mint = %funds.mint,
                amount = funds.amount,
                "Funds left in session wallet; queued for sweep"
            ),
            Err(e) => tracing::error!(
                target: "settlement",
                strategy_id = %claim.strategy.id,
                mint = %funds.mint,
                amount = funds.amount,
                error = %e,
                "Failed to queue stranded funds"
            ),
        }
    }
}
