// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

pub mod claim;
pub mod keeper;
pub mod pipeline;
pub mod settlement;

pub use keeper::Keeper;
pub use pipeline::{ExecutionPipeline, PipelineConfig, PipelineOutcome, Stage};

use crate::domain::model::StrandedFunds;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of wall-clock time for claims, settlement and due queries.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Success,
    Partial,
    Error,
    /// Hard failure that left withdrawn funds in the session wallet.
    ErrorStranded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub strategy_id: String,
    pub outcome: TradeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stranded: Option<StrandedFunds>,
}

impl StrategyResult {
    pub fn error(strategy_id: &str, trade_number: Option<u32>, error: String) -> Self {
        Self {
            strategy_id: strategy_id.to_string(),
            outcome: TradeOutcome::Error,
            trade_number,
            input_amount: None,
            output_amount: None,
            tx_signature: None,
            error: Some(error),
            stranded: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeeperReport {
    pub processed: usize,
    pub results: Vec<StrategyResult>,
    /// Another local pass was still running; nothing was attempted.
    pub overlapped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl KeeperReport {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            processed: 0,
            results: Vec::new(),
            overlapped: false,
            error: None,
            timestamp,
        }
    }

    pub fn count(&self, outcome: TradeOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }
}

#[derive(Debug, Default)]
pub struct KeeperStats {
    pub passes: AtomicU64,
    pub claimed: AtomicU64,
    pub success: AtomicU64,
    pub partial: AtomicU64,
    pub failed: AtomicU64,
    pub claim_skipped: AtomicU64,
}

impl KeeperStats {
    pub(crate) fn record(&self, outcome: TradeOutcome) {
        let counter = match outcome {
            TradeOutcome::Success => &self.success,
            TradeOutcome::Partial => &self.partial,
            TradeOutcome::Error | TradeOutcome::ErrorStranded => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
