// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use crate::domain::model::{ExecutionUpdate, StrandedFunds, Strategy, StrategyUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Persistence operations the keeper relies on.
///
/// The keeper keeps no state between passes; every decision is re-derived from
/// these calls, and `try_claim` is the only concurrency primitive.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Active strategies due at `now`, plus executing ones claimed before
    /// `stale_before` when stale reclaim is enabled.
    async fn find_due_strategies(
        &self,
        now: DateTime<Utc>,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Strategy>, AppError>;

    /// Atomically move a due strategy to `executing`.
    ///
    /// Returns the row as claimed, or `None` when another pass got there first
    /// or the strategy is no longer eligible.
    async fn try_claim(
        &self,
        strategy_id: &str,
        now: DateTime<Utc>,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Strategy>, AppError>;

    /// Create (or reset) the pending execution row for a trade number.
    ///
    /// `None` when that trade already settled as `success`; the row is left as is.
    async fn create_execution(
        &self,
        strategy_id: &str,
        trade_number: u32,
        input_amount: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, AppError>;

    async fn update_execution(
        &self,
        execution_id: i64,
        update: &ExecutionUpdate,
    ) -> Result<(), AppError>;

    async fn update_strategy(
        &self,
        strategy_id: &str,
        update: &StrategyUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn record_stranded(
        &self,
        strategy_id: &str,
        execution_id: i64,
        funds: &StrandedFunds,
    ) -> Result<i64, AppError>;
}

pub type SharedStore = Arc<dyn StrategyStore>;
