// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::{AppError, ExecutionError};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Chain-reported state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Finalized,
    /// Included in a block but failed; carries the chain's error payload.
    Errored(String),
    /// Not seen yet, or only processed.
    Unknown,
}

impl TxStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Finalized)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn transaction_status(&self, signature: &Signature) -> Result<TxStatus, ExecutionError>;

    async fn balance(&self, address: &Pubkey) -> Result<u64, ExecutionError>;

    async fn submit_transaction(
        &self,
        tx: &VersionedTransaction,
        opts: SendOptions,
    ) -> Result<Signature, ExecutionError>;
}

pub type SharedChain = Arc<dyn ChainClient>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn rpc(rpc_url: &str) -> Result<SolanaChain, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        let client = RpcClient::new_with_timeout_and_commitment(
            url.to_string(),
            Duration::from_secs(30),
            CommitmentConfig::confirmed(),
        );
        Ok(SolanaChain {
            rpc: Arc::new(client),
        })
    }
}

/// JSON-RPC backed chain client.
#[derive(Clone)]
pub struct SolanaChain {
    rpc: Arc<RpcClient>,
}

#[async_trait]
impl ChainClient for SolanaChain {
    async fn transaction_status(&self, signature: &Signature) -> Result<TxStatus, ExecutionError> {
        let response = self
            .rpc
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| ExecutionError::Chain(format!("getSignatureStatuses: {e}")))?;

        let Some(status) = response.value.into_iter().next().flatten() else {
            return Ok(TxStatus::Unknown);
        };
        if let Some(err) = status.err {
            return Ok(TxStatus::Errored(format!("{err:?}")));
        }
        let mapped = match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => TxStatus::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => TxStatus::Confirmed,
            Some(TransactionConfirmationStatus::Processed) => TxStatus::Unknown,
            // Old nodes omit the field; rooted slots report no confirmation count.
            None if status.confirmations.is_none() => TxStatus::Finalized,
            None => TxStatus::Unknown,
        };
        Ok(mapped)
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, ExecutionError> {
        self.rpc
            .get_balance(address)
            .await
            .map_err(|e| ExecutionError::Chain(format!("getBalance {address}: {e}")))
    }

    async fn submit_transaction(
        &self,
        tx: &VersionedTransaction,
        opts: SendOptions,
    ) -> Result<Signature, ExecutionError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: opts.skip_preflight,
            max_retries: opts.max_retries,
            ..RpcSendTransactionConfig::default()
        };
        self.rpc
            .send_transaction_with_config(tx, config)
            .await
            .map_err(|e| ExecutionError::Chain(format!("sendTransaction: {e}")))
    }
}
