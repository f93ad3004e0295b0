// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::AppError;
use crate::domain::model::{Execution, ExecutionStatus, Strategy, StrategyStatus};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct StrategyRecord {
    pub id: String,
    pub user_id: String,
    pub input_mint: String,
    pub output_mint: String,
    pub amount_per_trade: String,
    pub frequency_hours: i64,
    pub total_trades: i64,
    pub completed_trades: i64,
    pub next_due_at: Option<i64>,
    pub session_key: Option<String>,
    pub status: String,
    pub claimed_at: Option<i64>,
}

#[derive(Debug, FromRow)]
pub struct ExecutionRecord {
    pub id: i64,
    pub strategy_id: String,
    pub trade_number: i64,
    pub input_amount: String,
    pub output_amount: Option<String>,
    pub tx_signature: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, FromRow)]
pub struct StrandedRecord {
    pub id: i64,
    pub strategy_id: String,
    pub execution_id: i64,
    pub mint: String,
    pub amount: String,
    pub reason: String,
    pub swept: bool,
    pub created_at: i64,
}

pub fn to_epoch(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

pub fn from_epoch(field: &str, secs: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| AppError::Validation {
        field: field.to_string(),
        message: format!("timestamp {secs} out of range"),
    })
}

fn to_u32(field: &str, value: i64) -> Result<u32, AppError> {
    u32::try_from(value).map_err(|_| AppError::Validation {
        field: field.to_string(),
        message: format!("value {value} out of range"),
    })
}

impl TryFrom<StrategyRecord> for Strategy {
    type Error = AppError;

    fn try_from(row: StrategyRecord) -> Result<Self, Self::Error> {
        let status = row.status.parse::<StrategyStatus>().map_err(|message| {
            AppError::Validation {
                field: "strategies.status".into(),
                message,
            }
        })?;
        Ok(Strategy {
            frequency_hours: to_u32("strategies.frequency_hours", row.frequency_hours)?,
            total_trades: to_u32("strategies.total_trades", row.total_trades)?,
            completed_trades: to_u32("strategies.completed_trades", row.completed_trades)?,
            next_due_at: row
                .next_due_at
                .map(|s| from_epoch("strategies.next_due_at", s))
                .transpose()?,
            claimed_at: row
                .claimed_at
                .map(|s| from_epoch("strategies.claimed_at", s))
                .transpose()?,
            id: row.id,
            user_id: row.user_id,
            input_mint: row.input_mint,
            output_mint: row.output_mint,
            amount_per_trade: row.amount_per_trade,
            session_key: row.session_key,
            status,
        })
    }
}

impl TryFrom<ExecutionRecord> for Execution {
    type Error = AppError;

    fn try_from(row: ExecutionRecord) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ExecutionStatus>().map_err(|message| {
            AppError::Validation {
                field: "executions.status".into(),
                message,
            }
        })?;
        Ok(Execution {
            id: row.id,
            trade_number: to_u32("executions.trade_number", row.trade_number)?,
            created_at: from_epoch("executions.created_at", row.created_at)?,
            strategy_id: row.strategy_id,
            input_amount: row.input_amount,
            output_amount: row.output_amount,
            tx_signature: row.tx_signature,
            status,
            error: row.error,
        })
    }
}
