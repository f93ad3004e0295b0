// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Active,
    Paused,
    Executing,
    Completed,
    Cancelled,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Active => "active",
            StrategyStatus::Paused => "paused",
            StrategyStatus::Executing => "executing",
            StrategyStatus::Completed => "completed",
            StrategyStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(StrategyStatus::Active),
            "paused" => Ok(StrategyStatus::Paused),
            "executing" => Ok(StrategyStatus::Executing),
            "completed" => Ok(StrategyStatus::Completed),
            "cancelled" => Ok(StrategyStatus::Cancelled),
            other => Err(format!("unknown strategy status '{other}'")),
        }
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status '{other}'")),
        }
    }
}

/// A user's recurring trade plan as persisted by the store.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub id: String,
    pub user_id: String,
    pub input_mint: String,
    pub output_mint: String,
    /// Human decimal amount in units of the input asset, e.g. "10" or "0.25".
    pub amount_per_trade: String,
    pub frequency_hours: u32,
    pub total_trades: u32,
    pub completed_trades: u32,
    pub next_due_at: Option<DateTime<Utc>>,
    pub session_key: Option<String>,
    pub status: StrategyStatus,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Strategy {
    /// Sequence number of the trade the next claim would attempt.
    pub fn next_trade_number(&self) -> u32 {
        self.completed_trades.saturating_add(1)
    }

    pub fn is_exhausted(&self) -> bool {
        self.completed_trades >= self.total_trades
    }

    pub fn has_credential(&self) -> bool {
        self.session_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

/// One attempted trade belonging to a strategy.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: i64,
    pub strategy_id: String,
    pub trade_number: u32,
    /// Human decimal amounts, in input and output asset units respectively.
    pub input_amount: String,
    pub output_amount: Option<String>,
    pub tx_signature: Option<String>,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Column changes applied to a strategy row by settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyUpdate {
    pub status: Option<StrategyStatus>,
    pub completed_trades: Option<u32>,
    /// `Some(None)` clears the due timestamp.
    pub next_due_at: Option<Option<DateTime<Utc>>>,
    pub clear_claim: bool,
}

/// Final column values for an execution row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub output_amount: Option<String>,
    pub tx_signature: Option<String>,
    pub error: Option<String>,
}

/// Funds left outside the pool in a session wallet, queued for a later sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrandedFunds {
    pub mint: String,
    pub amount: u64,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitive() {
        assert_eq!(
            "Executing".parse::<StrategyStatus>(),
            Ok(StrategyStatus::Executing)
        );
        assert_eq!(" failed ".parse::<ExecutionStatus>(), Ok(ExecutionStatus::Failed));
        assert!("running".parse::<StrategyStatus>().is_err());
    }

    #[test]
    fn blank_session_key_counts_as_missing() {
        let strategy = Strategy {
            id: "s1".into(),
            user_id: "u1".into(),
            input_mint: "a".into(),
            output_mint: "b".into(),
            amount_per_trade: "1".into(),
            frequency_hours: 24,
            total_trades: 3,
            completed_trades: 3,
            next_due_at: None,
            session_key: Some("   ".into()),
            status: StrategyStatus::Active,
            claimed_at: None,
        };
        assert!(!strategy.has_credential());
        assert!(strategy.is_exhausted());
        assert_eq!(strategy.next_trade_number(), 4);
    }
}
