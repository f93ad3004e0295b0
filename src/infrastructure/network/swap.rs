// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::constants::HTTP_TIMEOUT_SECS;
use crate::domain::error::{AppError, ExecutionError};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "swap aggregator";

/// Aggregator price quote. `raw` is echoed back verbatim when building the swap.
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    pub slippage_bps: u16,
    pub raw: Value,
}

#[async_trait]
pub trait SwapService: Send + Sync {
    async fn quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote, ExecutionError>;

    /// Unsigned transaction executing `quote`, with `signer` as fee payer.
    async fn swap_transaction(
        &self,
        quote: &Quote,
        signer: &Pubkey,
    ) -> Result<VersionedTransaction, ExecutionError>;
}

pub type SharedSwap = Arc<dyn SwapService>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    input_mint: String,
    in_amount: String,
    output_mint: String,
    out_amount: String,
    #[serde(default)]
    slippage_bps: Option<u16>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

/// Jupiter v6 HTTP client.
#[derive(Clone)]
pub struct JupiterSwap {
    client: Client,
    base_url: String,
    priority_fee_max_lamports: u64,
}

impl JupiterSwap {
    pub fn new(base_url: &str, priority_fee_max_lamports: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Initialization(format!("swap HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            priority_fee_max_lamports,
        })
    }

    fn swap_body(&self, quote: &Quote, signer: &Pubkey) -> Value {
        json!({
            "quoteResponse": quote.raw,
            "userPublicKey": signer.to_string(),
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true,
            "prioritizationFeeLamports": {
                "priorityLevelWithMaxLamports": {
                    "maxLamports": self.priority_fee_max_lamports,
                    "priorityLevel": "veryHigh"
                }
            }
        })
    }
}

fn parse_quote(raw: Value, fallback_slippage: u16) -> Result<Quote, ExecutionError> {
    let parsed: QuoteResponse = serde_json::from_value(raw.clone())
        .map_err(|e| ExecutionError::upstream(SERVICE, format!("quote JSON: {e}")))?;
    let key = |s: &str| {
        Pubkey::from_str(s).map_err(|e| ExecutionError::upstream(SERVICE, format!("mint {s}: {e}")))
    };
    let amount = |s: &str| {
        s.parse::<u64>()
            .map_err(|e| ExecutionError::upstream(SERVICE, format!("amount {s}: {e}")))
    };
    let out_amount = amount(&parsed.out_amount)?;
    if out_amount == 0 {
        return Err(ExecutionError::upstream(SERVICE, "quote has zero output"));
    }
    Ok(Quote {
        input_mint: key(&parsed.input_mint)?,
        output_mint: key(&parsed.output_mint)?,
        in_amount: amount(&parsed.in_amount)?,
        out_amount,
        slippage_bps: parsed.slippage_bps.unwrap_or(fallback_slippage),
        raw,
    })
}

fn decode_transaction(encoded: &str) -> Result<VersionedTransaction, ExecutionError> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| ExecutionError::upstream(SERVICE, format!("base64 decode error: {e}")))?;
    bincode::deserialize::<VersionedTransaction>(&bytes)
        .map_err(|e| ExecutionError::upstream(SERVICE, format!("transaction decode error: {e}")))
}

#[async_trait]
impl SwapService for JupiterSwap {
    async fn quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote, ExecutionError> {
        let url = format!("{}/quote", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ExecutionError::upstream(SERVICE, e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecutionError::upstream(
                SERVICE,
                format!("quote responded {status}: {body}"),
            ));
        }
        let raw: Value = resp
            .json()
            .await
            .map_err(|e| ExecutionError::upstream(SERVICE, e))?;
        parse_quote(raw, slippage_bps)
    }

    async fn swap_transaction(
        &self,
        quote: &Quote,
        signer: &Pubkey,
    ) -> Result<VersionedTransaction, ExecutionError> {
        let url = format!("{}/swap", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&self.swap_body(quote, signer))
            .send()
            .await
            .map_err(|e| ExecutionError::upstream(SERVICE, e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecutionError::upstream(
                SERVICE,
                format!("swap build responded {status}: {body}"),
            ));
        }
        let parsed: SwapResponse = resp
            .json()
            .await
            .map_err(|e| ExecutionError::upstream(SERVICE, e))?;
        decode_transaction(&parsed.swap_transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::signature::Signature;
    use solana_sdk::system_instruction;

    #[test]
    fn parses_string_amounts_and_keeps_raw() {
        let input = Pubkey::new_unique();
        let output = Pubkey::new_unique();
        let raw = json!({
            "inputMint": input.to_string(),
            "inAmount": "10000000",
            "outputMint": output.to_string(),
            "outAmount": "65432100",
            "otherAmountThreshold": "65105000",
            "slippageBps": 50,
            "routePlan": []
        });
        let quote = parse_quote(raw.clone(), 75).expect("quote");
        assert_eq!(quote.in_amount, 10_000_000);
        assert_eq!(quote.out_amount, 65_432_100);
        assert_eq!(quote.slippage_bps, 50);
        assert_eq!(quote.raw, raw);
    }

    #[test]
    fn zero_output_quote_is_rejected() {
        let raw = json!({
            "inputMint": Pubkey::new_unique().to_string(),
            "inAmount": "1",
            "outputMint": Pubkey::new_unique().to_string(),
            "outAmount": "0"
        });
        assert!(matches!(
            parse_quote(raw, 50),
            Err(ExecutionError::Upstream { .. })
        ));
    }

    #[test]
    fn decodes_base64_bincode_transaction() {
        let payer = Pubkey::new_unique();
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 5);
        let tx = VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(Message::new_with_blockhash(
                &[ix],
                Some(&payer),
                &Hash::default(),
            )),
        };
        let encoded = BASE64_STANDARD.encode(bincode::serialize(&tx).unwrap());
        let decoded = decode_transaction(&encoded).expect("decode");
        assert_eq!(decoded.message.static_account_keys()[0], payer);
        assert!(decode_transaction("%%%").is_err());
    }

    #[test]
    fn swap_body_requests_priority_fee() {
        let client = JupiterSwap::new("https://quote-api.jup.ag/v6/", 1_000).unwrap();
        let quote = Quote {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            in_amount: 1,
            out_amount: 2,
            slippage_bps: 50,
            raw: json!({"outAmount": "2"}),
        };
        let body = client.swap_body(&quote, &Pubkey::new_unique());
        assert_eq!(
            body["prioritizationFeeLamports"]["priorityLevelWithMaxLamports"]["maxLamports"],
            1_000
        );
        assert_eq!(body["quoteResponse"]["outAmount"], "2");
        assert_eq!(client.base_url, "https://quote-api.jup.ag/v6");
    }
}
