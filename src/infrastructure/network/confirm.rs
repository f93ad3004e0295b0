// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::ExecutionError;
use crate::network::provider::{ChainClient, TxStatus};
use solana_sdk::signature::Signature;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl ConfirmPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Upper bound on time spent polling.
    pub fn budget(&self) -> Duration {
        self.interval
            .saturating_mul(self.attempts.saturating_sub(1))
    }
}

/// Poll the chain until `signature` is confirmed or finalized.
///
/// An on-chain error stops polling immediately. RPC lookup failures count as an
/// attempt and polling continues.
pub async fn await_confirmation(
    chain: &dyn ChainClient,
    signature: &Signature,
    policy: ConfirmPolicy,
) -> Result<TxStatus, ExecutionError> {
    for attempt in 1..=policy.attempts {
        match chain.transaction_status(signature).await {
            Ok(status) if status.is_settled() => {
                tracing::debug!(target: "confirm", %signature, attempt, ?status, "Transaction settled");
                return Ok(status);
            }
            Ok(TxStatus::Errored(reason)) => {
                return Err(ExecutionError::OnChainRejected {
                    signature: signature.to_string(),
                    reason,
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    target: "confirm",
                    %signature,
                    attempt,
                    error = %e,
                    "Status lookup error; retrying"
                );
            }
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(ExecutionError::ConfirmationTimeout {
        signature: signature.to_string(),
        attempts: policy.attempts,
    })
}
