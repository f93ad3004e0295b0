// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::data::schema::{ExecutionRecord, StrandedRecord, StrategyRecord, to_epoch};
use crate::data::store::StrategyStore;
use crate::domain::error::AppError;
use crate::domain::model::{
    Execution, ExecutionStatus, ExecutionUpdate, StrandedFunds, Strategy, StrategyStatus,
    StrategyUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Pool, Row, Sqlite,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

const STRATEGY_COLUMNS: &str = "id, user_id, input_mint, output_mint, amount_per_trade, \
     frequency_hours, total_trades, completed_trades, next_due_at, session_key, status, claimed_at";

/// Input for [`Database::insert_strategy`]; normally written by the dashboard.
#[derive(Debug, Clone)]
pub struct NewStrategy {
    pub id: String,
    pub user_id: String,
    pub input_mint: String,
    pub output_mint: String,
    pub amount_per_trade: String,
    pub frequency_hours: u32,
    pub total_trades: u32,
    pub completed_trades: u32,
    pub next_due_at: Option<DateTime<Utc>>,
    pub session_key: Option<String>,
    pub status: StrategyStatus,
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Initialization(format!("DB Connect failed: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection is a separate database; keep exactly one, forever.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::Initialization(format!("DB Connect failed: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Initialization(format!("DB Migration failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn insert_strategy(&self, strategy: &NewStrategy) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO strategies (
                id, user_id, input_mint, output_mint, amount_per_trade, frequency_hours,
                total_trades, completed_trades, next_due_at, session_key, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&strategy.id)
        .bind(&strategy.user_id)
        .bind(&strategy.input_mint)
        .bind(&strategy.output_mint)
        .bind(&strategy.amount_per_trade)
        .bind(strategy.frequency_hours as i64)
        .bind(strategy.total_trades as i64)
        .bind(strategy.completed_trades as i64)
        .bind(strategy.next_due_at.map(to_epoch))
        .bind(&strategy.session_key)
        .bind(strategy.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_strategy(&self, strategy_id: &str) -> Result<Option<Strategy>, AppError> {
        let sql = format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = ?");
        let row = sqlx::query_as::<_, StrategyRecord>(&sql)
            .bind(strategy_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Strategy::try_from).transpose()
    }

    pub async fn executions_for(&self, strategy_id: &str) -> Result<Vec<Execution>, AppError> {
        let rows = sqlx::query_as::<_, ExecutionRecord>(
            r#"
            SELECT id, strategy_id, trade_number, input_amount, output_amount, tx_signature,
                   status, error, created_at
            FROM executions
            WHERE strategy_id = ?
            ORDER BY trade_number ASC
            "#,
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Execution::try_from).collect()
    }

    pub async fn unswept_stranded(&self) -> Result<Vec<StrandedRecord>, AppError> {
        let rows = sqlx::query_as::<_, StrandedRecord>(
            r#"
            SELECT id, strategy_id, execution_id, mint, amount, reason, swept, created_at
            FROM stranded_funds
            WHERE swept = 0
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl StrategyStore for Database {
    async fn find_due_strategies(
        &self,
        now: DateTime<Utc>,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Strategy>, AppError> {
        let sql = format!(
            r#"
            SELECT {STRATEGY_COLUMNS}
            FROM strategies
            WHERE (status = 'active' AND next_due_at IS NOT NULL AND next_due_at <= ?)
               OR (? IS NOT NULL AND status = 'executing' AND claimed_at <= ?)
            ORDER BY next_due_at ASC, id ASC
            "#
        );
        let stale = stale_before.map(to_epoch);
        let rows = sqlx::query_as::<_, StrategyRecord>(&sql)
            .bind(to_epoch(now))
            .bind(stale)
            .bind(stale)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match Strategy::try_from(row) {
                Ok(strategy) => out.push(strategy),
                Err(e) => {
                    tracing::warn!(target: "db", strategy_id = %id, error = %e, "Skipping unreadable strategy row");
                }
            }
        }
        Ok(out)
    }

    async fn try_claim(
        &self,
        strategy_id: &str,
        now: DateTime<Utc>,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Option<Strategy>, AppError> {
        let sql = format!(
            r#"
            UPDATE strategies
            SET status = 'executing', claimed_at = ?, updated_at = ?
            WHERE id = ?
              AND (
                    (status = 'active' AND next_due_at IS NOT NULL AND next_due_at <= ?)
                 OR (? IS NOT NULL AND status = 'executing' AND claimed_at <= ?)
              )
            RETURNING {STRATEGY_COLUMNS}
            "#
        );
        let now_epoch = to_epoch(now);
        let stale = stale_before.map(to_epoch);
        let row = sqlx::query_as::<_, StrategyRecord>(&sql)
            .bind(now_epoch)
            .bind(now_epoch)
            .bind(strategy_id)
            .bind(now_epoch)
            .bind(stale)
            .bind(stale)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Strategy::try_from).transpose()
    }

    async fn create_execution(
        &self,
        strategy_id: &str,
        trade_number: u32,
        input_amount: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO executions (strategy_id, trade_number, input_amount, status, created_at)
            VALUES (?, ?, ?, 'pending', ?)
            ON CONFLICT(strategy_id, trade_number) DO UPDATE SET
                input_amount = excluded.input_amount,
                output_amount = NULL,
                tx_signature = NULL,
                status = 'pending',
                error = NULL,
                created_at = excluded.created_at
            WHERE executions.status <> 'success'
            RETURNING id
            "#,
        )
        .bind(strategy_id)
        .bind(trade_number as i64)
        .bind(input_amount)
        .bind(to_epoch(now))
        .fetch_optional(&self.pool)
        .await?;
        let id = row.map(|r| r.get::<i64, _>("id"));
        if id.is_none() {
            tracing::warn!(target: "db", strategy_id, trade_number, "Trade already settled; execution row kept");
        }
        Ok(id)
    }

    async fn update_execution(
        &self,
        execution_id: i64,
        update: &ExecutionUpdate,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = ?, output_amount = ?, tx_signature = ?, error = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(&update.output_amount)
        .bind(&update.tx_signature)
        .bind(&update.error)
        .bind(execution_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Database(format!(
                "execution {execution_id} not found"
            )));
        }
        if update.status == ExecutionStatus::Pending {
            tracing::debug!(target: "db", execution_id, "Execution reset to pending");
        }
        Ok(())
    }

    async fn update_strategy(
        &self,
        strategy_id: &str,
        update: &StrategyUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let (set_due, due) = match update.next_due_at {
            Some(due) => (true, due.map(to_epoch)),
            None => (false, None),
        };
        // A cancellation that raced the pipeline wins over the keeper's status.
        let result = sqlx::query(
            r#"
            UPDATE strategies
            SET status = CASE
                    WHEN status = 'cancelled' THEN status
                    ELSE COALESCE(?, status)
                END,
                completed_trades = COALESCE(?, completed_trades),
                next_due_at = CASE WHEN ? THEN ? ELSE next_due_at END,
                claimed_at = CASE WHEN ? THEN NULL ELSE claimed_at END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.completed_trades.map(|c| c as i64))
        .bind(set_due)
        .bind(due)
        .bind(update.clear_claim)
        .bind(to_epoch(now))
        .bind(strategy_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Database(format!(
                "strategy {strategy_id} not found"
            )));
        }
        Ok(())
    }

    async fn record_stranded(
        &self,
        strategy_id: &str,
        execution_id: i64,
        funds: &StrandedFunds,
    ) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO stranded_funds (strategy_id, execution_id, mint, amount, reason)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(strategy_id)
        .bind(execution_id)
        .bind(&funds.mint)
        .bind(funds.amount.to_string())
        .bind(&funds.reason)
        .fetch_one(&self.pool)
        .await?;
        let id: i64 = row.get("id");
        Ok(id)
    }
}
