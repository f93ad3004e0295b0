// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::asset::Asset;
use crate::domain::constants::HTTP_TIMEOUT_SECS;
use crate::domain::error::{AppError, ExecutionError};
use crate::network::provider::{SendOptions, SharedChain};
use crate::network::session::SessionKey;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "pool relayer";

/// Shield/unshield operations for one session wallet.
#[async_trait]
pub trait ShieldedPool: Send + Sync {
    /// Unshield `amount` base units of `asset` to `recipient`.
    async fn withdraw(
        &self,
        asset: &Asset,
        amount: u64,
        recipient: &Pubkey,
    ) -> Result<Signature, ExecutionError>;

    /// Shield `amount` base units of `asset` from the session wallet.
    async fn deposit(&self, asset: &Asset, amount: u64) -> Result<Signature, ExecutionError>;
}

/// Builds a pool client bound to a session credential.
pub trait PoolConnector: Send + Sync {
    fn connect(&self, session: &SessionKey) -> Result<Arc<dyn ShieldedPool>, ExecutionError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PoolRequest {
    owner: String,
    mint: String,
    amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<String>,
    timestamp: i64,
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawResponse {
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrepareDepositResponse {
    transaction: String,
}

/// Message the relayer verifies against `owner` before acting.
fn request_message(op: &str, mint: &Pubkey, amount: u64, recipient: Option<&Pubkey>, ts: i64) -> String {
    match recipient {
        Some(to) => format!("{op}:{mint}:{amount}:{to}:{ts}"),
        None => format!("{op}:{mint}:{amount}:{ts}"),
    }
}

/// Talks to the pool relayer/prover sidecar; proofs are generated there.
pub struct RelayerPool {
    client: Client,
    base_url: String,
    session: SessionKey,
    chain: SharedChain,
}

impl RelayerPool {
    fn signed_request(
        &self,
        op: &str,
        asset: &Asset,
        amount: u64,
        recipient: Option<&Pubkey>,
    ) -> PoolRequest {
        let timestamp = chrono::Utc::now().timestamp();
        let message = request_message(op, &asset.mint, amount, recipient, timestamp);
        PoolRequest {
            owner: self.session.pubkey().to_string(),
            mint: asset.mint.to_string(),
            amount: amount.to_string(),
            recipient: recipient.map(|r| r.to_string()),
            timestamp,
            signature: self.session.sign_message(message.as_bytes()).to_string(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &PoolRequest,
    ) -> Result<T, ExecutionError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ExecutionError::Pool(format!("{path}: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ExecutionError::Pool(format!(
                "{path} responded {status}: {text}"
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ExecutionError::Pool(format!("{path} JSON: {e}")))
    }
}

#[async_trait]
impl ShieldedPool for RelayerPool {
    async fn withdraw(
        &self,
        asset: &Asset,
        amount: u64,
        recipient: &Pubkey,
    ) -> Result<Signature, ExecutionError> {
        let body = self.signed_request("withdraw", asset, amount, Some(recipient));
        let resp: WithdrawResponse = self.post(asset.kind.withdraw_path(), &body).await?;
        Signature::from_str(resp.signature.trim())
            .map_err(|e| ExecutionError::Pool(format!("relayer returned bad signature: {e}")))
    }

    async fn deposit(&self, asset: &Asset, amount: u64) -> Result<Signature, ExecutionError> {
        let body = self.signed_request("deposit", asset, amount, None);
        let resp: PrepareDepositResponse = self.post(asset.kind.deposit_path(), &body).await?;
        let bytes = BASE64_STANDARD
            .decode(resp.transaction.trim())
            .map_err(|e| ExecutionError::upstream(SERVICE, format!("base64 decode error: {e}")))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| ExecutionError::upstream(SERVICE, format!("transaction decode error: {e}")))?;
        let signed = self.session.sign_transaction(unsigned)?;
        self.chain.submit_transaction(&signed, SendOptions::default()).await
    }
}

/// Creates [`RelayerPool`] clients sharing one HTTP client.
#[derive(Clone)]
pub struct RelayerConnector {
    client: Client,
    base_url: String,
    chain: SharedChain,
}

impl RelayerConnector {
    pub fn new(base_url: &str, chain: SharedChain) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS * 3))
            .build()
            .map_err(|e| AppError::Initialization(format!("pool HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain,
        })
    }
}

impl PoolConnector for RelayerConnector {
    fn connect(&self, session: &SessionKey) -> Result<Arc<dyn ShieldedPool>, ExecutionError> {
        Ok(Arc::new(RelayerPool {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session: session.clone(),
            chain: self.chain.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetKind;
    use crate::network::provider::ConnectionFactory;
    use solana_sdk::signature::Keypair;

    #[test]
    fn request_signature_verifies_against_owner() {
        let chain: SharedChain = Arc::new(ConnectionFactory::rpc("http://127.0.0.1:8899").unwrap());
        let connector = RelayerConnector::new("http://127.0.0.1:9000/", chain.clone()).unwrap();
        let session = SessionKey::from_keypair(Keypair::new());
        let pool = RelayerPool {
            client: connector.client.clone(),
            base_url: connector.base_url.clone(),
            session: session.clone(),
            chain,
        };
        let asset = Asset::new(Pubkey::new_unique(), "USDC", 6, AssetKind::Token);
        let recipient = Pubkey::new_unique();

        let req = pool.signed_request("withdraw", &asset, 10_000_000, Some(&recipient));
        let message = request_message("withdraw", &asset.mint, 10_000_000, Some(&recipient), req.timestamp);
        let sig = Signature::from_str(&req.signature).unwrap();
        assert!(sig.verify(session.pubkey().as_ref(), message.as_bytes()));
        assert_eq!(req.owner, session.pubkey().to_string());
        assert_eq!(connector.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn deposit_request_omits_recipient() {
        let message = request_message("deposit", &Pubkey::default(), 5, None, 7);
        assert_eq!(message, format!("deposit:{}:5:7", Pubkey::default()));
    }
}
